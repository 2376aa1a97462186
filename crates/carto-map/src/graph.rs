//! File-level reference graph.
//!
//! Nodes are repo-relative file paths. For every identifier that is both
//! defined somewhere and referenced somewhere, each referencing file gets
//! a directed edge to each defining file. Duplicate references from one
//! file collapse to a single edge, so a file that calls `helper()` fifty
//! times depends on its definer no more than one that calls it once.

use std::collections::{BTreeMap, BTreeSet};

use carto_core::{CartoError, Result};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::tags::{Tag, TagKind};

/// Hard ceiling on edges. Degenerate repos (generated code with a handful
/// of idents shared by thousands of files) can otherwise produce a graph
/// quadratic in file count.
pub const MAX_GRAPH_EDGES: usize = 5_000_000;

/// The dependency graph a map build ranks over.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use carto_map::graph::ReferenceGraph;
///
/// let tags: BTreeMap<String, Vec<carto_map::tags::Tag>> =
///     [("a.rs".to_string(), Vec::new())].into();
/// let graph = ReferenceGraph::build(&tags).unwrap();
/// assert_eq!(graph.node_count(), 1);
/// assert_eq!(graph.edge_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReferenceGraph {
    graph: DiGraph<String, String>,
    nodes: BTreeMap<String, NodeIndex>,
}

impl ReferenceGraph {
    /// Build the graph from per-file tags. Every key becomes a node, tags
    /// or not, so unreferenced files still earn the base rank.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::GraphTooLarge`] when the edge count passes
    /// [`MAX_GRAPH_EDGES`].
    pub fn build(tags_by_file: &BTreeMap<String, Vec<Tag>>) -> Result<Self> {
        Self::build_inner(tags_by_file, MAX_GRAPH_EDGES)
    }

    fn build_inner(
        tags_by_file: &BTreeMap<String, Vec<Tag>>,
        max_edges: usize,
    ) -> Result<Self> {
        let mut defines: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut references: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for (rel, tags) in tags_by_file {
            for tag in tags {
                match tag.kind {
                    TagKind::Def => {
                        defines.entry(&tag.name).or_default().insert(rel);
                    }
                    TagKind::Ref => {
                        references.entry(&tag.name).or_default().insert(rel);
                    }
                }
            }
        }

        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        for rel in tags_by_file.keys() {
            let idx = graph.add_node(rel.clone());
            nodes.insert(rel.clone(), idx);
        }

        let mut edges = 0usize;
        for (ident, definers) in &defines {
            let Some(referencers) = references.get(ident) else {
                continue;
            };
            for referencer in referencers {
                for definer in definers {
                    if referencer == definer {
                        continue;
                    }
                    edges += 1;
                    if edges > max_edges {
                        return Err(CartoError::GraphTooLarge(edges));
                    }
                    graph.add_edge(
                        nodes[*referencer],
                        nodes[*definer],
                        (*ident).to_string(),
                    );
                }
            }
        }

        Ok(Self { graph, nodes })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node index for a relative path, if the file is in the graph.
    pub fn node_index(&self, rel: &str) -> Option<NodeIndex> {
        self.nodes.get(rel).copied()
    }

    pub fn nodes(&self) -> &BTreeMap<String, NodeIndex> {
        &self.nodes
    }

    pub fn graph(&self) -> &DiGraph<String, String> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tag(rel: &str, name: &str, kind: TagKind) -> Tag {
        Tag {
            path: PathBuf::from("/repo").join(rel),
            rel_path: PathBuf::from(rel),
            line: 1,
            name: name.to_string(),
            kind,
        }
    }

    fn tags_map(entries: Vec<(&str, Vec<Tag>)>) -> BTreeMap<String, Vec<Tag>> {
        entries
            .into_iter()
            .map(|(rel, tags)| (rel.to_string(), tags))
            .collect()
    }

    #[test]
    fn every_file_becomes_a_node() {
        let tags = tags_map(vec![
            ("a.py", vec![tag("a.py", "foo", TagKind::Def)]),
            ("README.md", Vec::new()),
        ]);
        let graph = ReferenceGraph::build(&tags).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.node_index("README.md").is_some());
    }

    #[test]
    fn reference_points_at_definer() {
        let tags = tags_map(vec![
            ("a.py", vec![tag("a.py", "helper", TagKind::Ref)]),
            ("b.py", vec![tag("b.py", "helper", TagKind::Def)]),
        ]);
        let graph = ReferenceGraph::build(&tags).unwrap();
        assert_eq!(graph.edge_count(), 1);

        let a = graph.node_index("a.py").unwrap();
        let b = graph.node_index("b.py").unwrap();
        let edge = graph.graph().edges(a).next().unwrap();
        assert_eq!(petgraph::visit::EdgeRef::target(&edge), b);
        assert_eq!(edge.weight(), "helper");
    }

    #[test]
    fn self_reference_creates_no_edge() {
        let tags = tags_map(vec![(
            "a.py",
            vec![
                tag("a.py", "local", TagKind::Def),
                tag("a.py", "local", TagKind::Ref),
            ],
        )]);
        let graph = ReferenceGraph::build(&tags).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn unresolved_reference_creates_no_edge() {
        let tags = tags_map(vec![
            ("a.py", vec![tag("a.py", "print", TagKind::Ref)]),
            ("b.py", vec![tag("b.py", "helper", TagKind::Def)]),
        ]);
        let graph = ReferenceGraph::build(&tags).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn repeated_references_collapse_to_one_edge() {
        let tags = tags_map(vec![
            (
                "a.py",
                vec![
                    tag("a.py", "helper", TagKind::Ref),
                    tag("a.py", "helper", TagKind::Ref),
                    tag("a.py", "helper", TagKind::Ref),
                ],
            ),
            ("b.py", vec![tag("b.py", "helper", TagKind::Def)]),
        ]);
        let graph = ReferenceGraph::build(&tags).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn distinct_idents_keep_parallel_edges() {
        let tags = tags_map(vec![
            (
                "a.py",
                vec![
                    tag("a.py", "helper", TagKind::Ref),
                    tag("a.py", "Config", TagKind::Ref),
                ],
            ),
            (
                "b.py",
                vec![
                    tag("b.py", "helper", TagKind::Def),
                    tag("b.py", "Config", TagKind::Def),
                ],
            ),
        ]);
        let graph = ReferenceGraph::build(&tags).unwrap();
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn edge_ceiling_is_enforced() {
        let tags = tags_map(vec![
            (
                "a.py",
                vec![
                    tag("a.py", "x", TagKind::Ref),
                    tag("a.py", "y", TagKind::Ref),
                ],
            ),
            (
                "b.py",
                vec![tag("b.py", "x", TagKind::Def), tag("b.py", "y", TagKind::Def)],
            ),
        ]);
        let err = ReferenceGraph::build_inner(&tags, 1).unwrap_err();
        assert!(matches!(err, CartoError::GraphTooLarge(_)));
    }
}
