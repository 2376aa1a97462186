//! PageRank over the reference graph.
//!
//! Chat and priority files seed a personalization vector so rank flows
//! out from what the user is already working on. When the personalized
//! run cannot produce scores (no seed overlaps the graph, or the
//! iteration fails to settle), ranking retries without personalization,
//! and as a last resort pins every file to the same fixed score.

use std::collections::BTreeMap;

use petgraph::visit::EdgeRef;

use crate::graph::ReferenceGraph;

/// Damping factor for the power iteration.
pub const DAMPING: f64 = 0.85;

/// Personalization weight given to priority files.
pub const PRIORITY_SEED: f64 = 100.0;

const TOLERANCE: f64 = 1e-6;
const MAX_ITERATIONS: usize = 100;

/// How the scores in a [`Ranking`] were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMode {
    /// Personalized power iteration seeded by priority files.
    Personalized,
    /// Plain power iteration with a uniform teleport vector.
    Uniform,
    /// Every file pinned to 1.0 after both iterations failed.
    Fixed,
}

/// Per-file rank scores.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub mode: RankMode,
    pub scores: BTreeMap<String, f64>,
}

impl Ranking {
    /// Score for a relative path, zero for files outside the graph.
    pub fn score(&self, rel: &str) -> f64 {
        self.scores.get(rel).copied().unwrap_or(0.0)
    }
}

/// Rank every file in the graph.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use carto_map::graph::ReferenceGraph;
/// use carto_map::rank::{rank, RankMode};
///
/// let tags: BTreeMap<String, Vec<carto_map::tags::Tag>> =
///     [("a.rs".to_string(), Vec::new())].into();
/// let graph = ReferenceGraph::build(&tags).unwrap();
/// let ranking = rank(&graph, &BTreeMap::new());
/// assert_eq!(ranking.mode, RankMode::Uniform);
/// assert!((ranking.score("a.rs") - 1.0).abs() < 1e-9);
/// ```
pub fn rank(graph: &ReferenceGraph, personalization: &BTreeMap<String, f64>) -> Ranking {
    if graph.node_count() == 0 {
        return Ranking {
            mode: RankMode::Fixed,
            scores: BTreeMap::new(),
        };
    }

    if !personalization.is_empty() {
        if let Some(scores) = power_iteration(graph, Some(personalization)) {
            return Ranking {
                mode: RankMode::Personalized,
                scores,
            };
        }
    }

    if let Some(scores) = power_iteration(graph, None) {
        return Ranking {
            mode: RankMode::Uniform,
            scores,
        };
    }

    Ranking {
        mode: RankMode::Fixed,
        scores: graph.nodes().keys().map(|k| (k.clone(), 1.0)).collect(),
    }
}

/// One pagerank run. `None` when the teleport vector cannot be formed or
/// the iteration does not converge.
///
/// Mass leaving a node splits evenly over its outgoing edges, parallel
/// edges included, so a file referencing two idents from the same definer
/// sends it twice the share. Dangling nodes redistribute their mass via
/// the teleport vector.
fn power_iteration(
    graph: &ReferenceGraph,
    personalization: Option<&BTreeMap<String, f64>>,
) -> Option<BTreeMap<String, f64>> {
    let g = graph.graph();
    let n = g.node_count();

    let teleport = match personalization {
        Some(pers) => {
            let mut weights = vec![0.0; n];
            let mut total = 0.0;
            for (rel, idx) in graph.nodes() {
                let w = pers.get(rel).copied().unwrap_or(0.0);
                weights[idx.index()] = w;
                total += w;
            }
            if total <= 0.0 || !total.is_finite() {
                return None;
            }
            for w in &mut weights {
                *w /= total;
            }
            weights
        }
        None => vec![1.0 / n as f64; n],
    };

    let out_degree: Vec<usize> = g
        .node_indices()
        .map(|idx| g.edges(idx).count())
        .collect();

    let mut x = vec![1.0 / n as f64; n];
    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![0.0; n];
        let mut dangling_mass = 0.0;

        for idx in g.node_indices() {
            let i = idx.index();
            if out_degree[i] == 0 {
                dangling_mass += x[i];
                continue;
            }
            let share = x[i] / out_degree[i] as f64;
            for edge in g.edges(idx) {
                next[edge.target().index()] += share;
            }
        }

        for i in 0..n {
            next[i] =
                DAMPING * (next[i] + dangling_mass * teleport[i]) + (1.0 - DAMPING) * teleport[i];
            if !next[i].is_finite() {
                return None;
            }
        }

        let err: f64 = x.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if err < n as f64 * TOLERANCE {
            return Some(
                graph
                    .nodes()
                    .iter()
                    .map(|(rel, idx)| (rel.clone(), x[idx.index()]))
                    .collect(),
            );
        }
    }

    None
}
