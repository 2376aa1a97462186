//! Tree-sitter tag extraction.
//!
//! Definitions and references are recognized by node kind across all
//! supported grammars, so one walk serves every language. References are
//! call sites and type usages rather than every identifier, which keeps
//! the reference graph focused on symbols that files actually depend on.

use std::path::Path;

use carto_core::{CartoError, Result};
use tree_sitter::{Node, Parser};

use crate::tags::{Tag, TagKind};
use crate::walker::Language;

/// Extra condition a node must meet before it counts as a definition.
#[derive(Clone, Copy)]
enum Gate {
    /// The kind alone is enough.
    Always,
    /// C-family `declaration` nodes count only for function prototypes.
    FunctionDeclarator,
    /// C-family specifiers count only with a body. A bare
    /// `struct Point p;` is a usage, not a definition.
    Body,
    /// JS/TS `variable_declarator` counts only when the value is a
    /// function, as in `const f = () => {}`.
    FunctionValue,
}

/// Node kinds that introduce a named definition, across all grammars.
const DEF_KINDS: &[(&str, Gate)] = &[
    // Rust
    ("function_item", Gate::Always),
    ("function_signature_item", Gate::Always),
    ("struct_item", Gate::Always),
    ("enum_item", Gate::Always),
    ("union_item", Gate::Always),
    ("type_item", Gate::Always),
    ("trait_item", Gate::Always),
    ("mod_item", Gate::Always),
    ("macro_definition", Gate::Always),
    // Python, C, C++, PHP
    ("function_definition", Gate::Always),
    ("class_definition", Gate::Always),
    // TypeScript / JavaScript
    ("function_declaration", Gate::Always),
    ("generator_function_declaration", Gate::Always),
    ("class_declaration", Gate::Always),
    ("abstract_class_declaration", Gate::Always),
    ("method_definition", Gate::Always),
    ("interface_declaration", Gate::Always),
    ("enum_declaration", Gate::Always),
    ("type_alias_declaration", Gate::Always),
    ("variable_declarator", Gate::FunctionValue),
    // Go
    ("method_declaration", Gate::Always),
    ("type_spec", Gate::Always),
    // Java
    ("constructor_declaration", Gate::Always),
    ("record_declaration", Gate::Always),
    // C / C++
    ("declaration", Gate::FunctionDeclarator),
    ("struct_specifier", Gate::Body),
    ("class_specifier", Gate::Body),
    ("enum_specifier", Gate::Body),
    ("union_specifier", Gate::Body),
    ("type_definition", Gate::Always),
    // Ruby
    ("method", Gate::Always),
    ("singleton_method", Gate::Always),
    ("class", Gate::Always),
    ("module", Gate::Always),
    // PHP
    ("trait_declaration", Gate::Always),
    // Kotlin
    ("object_declaration", Gate::Always),
    // Swift
    ("protocol_declaration", Gate::Always),
];

/// Node kinds that represent a call whose callee becomes a reference.
const CALL_KINDS: &[&str] = &[
    "call_expression",
    "call",
    "method_invocation",
    "function_call_expression",
    "member_call_expression",
    "scoped_call_expression",
    "object_creation_expression",
    "new_expression",
    "macro_invocation",
];

/// Field names that hold the callee of a call node, tried in order.
const CALLEE_FIELDS: &[&str] = &["function", "name", "constructor", "type", "method", "macro"];

/// Leaf kinds whose text is an identifier.
const IDENT_KINDS: &[&str] = &[
    "identifier",
    "simple_identifier",
    "field_identifier",
    "property_identifier",
    "type_identifier",
    "name",
    "constant",
];

/// Extract definition and reference tags from a source file.
///
/// Files without a recognized grammar produce no tags. Tree-sitter is
/// error-tolerant, so files with syntax errors still yield partial
/// results.
///
/// # Errors
///
/// Returns [`CartoError::Io`] if the file cannot be read, or
/// [`CartoError::Parse`] if the grammar cannot be loaded.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use carto_map::extract::file_tags;
/// use carto_map::tags::TagKind;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("demo.rs");
/// std::fs::write(&path, "fn hello() {}").unwrap();
///
/// let tags = file_tags(&path, Path::new("demo.rs")).unwrap();
/// assert_eq!(tags.len(), 1);
/// assert_eq!(tags[0].name, "hello");
/// assert_eq!(tags[0].kind, TagKind::Def);
/// ```
pub fn file_tags(path: &Path, rel_path: &Path) -> Result<Vec<Tag>> {
    let Some(ts_language) = Language::from_path(path).tree_sitter_language() else {
        return Ok(Vec::new());
    };

    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let source = text.as_bytes();

    let mut parser = Parser::new();
    parser
        .set_language(&ts_language)
        .map_err(|e| CartoError::Parse(format!("failed to set language: {e}")))?;

    let Some(tree) = parser.parse(source, None) else {
        return Ok(Vec::new());
    };

    let mut tags = Vec::new();
    collect_tags(tree.root_node(), source, path, rel_path, &mut tags);
    Ok(tags)
}

fn collect_tags(node: Node, source: &[u8], path: &Path, rel_path: &Path, tags: &mut Vec<Tag>) {
    let kind_str = node.kind();

    if let Some(gate) = def_gate(kind_str) {
        if gate_passes(&node, gate) {
            if let Some(name) = declaration_name(&node, source) {
                tags.push(make_tag(&node, path, rel_path, name, TagKind::Def));
            }
        }
    }

    if CALL_KINDS.contains(&kind_str) {
        if let Some(name) = callee_name(&node, source) {
            tags.push(make_tag(&node, path, rel_path, name, TagKind::Ref));
        }
    } else if kind_str == "type_identifier" || kind_str == "constant" {
        let counts = node.parent().map_or(true, |parent| {
            !is_definition_site(&parent) && !is_callee_child(&parent, &node)
        });
        if counts {
            let name = node_text(&node, source);
            if !name.is_empty() {
                tags.push(make_tag(&node, path, rel_path, name, TagKind::Ref));
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_tags(child, source, path, rel_path, tags);
    }
}

fn make_tag(node: &Node, path: &Path, rel_path: &Path, name: String, kind: TagKind) -> Tag {
    Tag {
        path: path.to_path_buf(),
        rel_path: rel_path.to_path_buf(),
        line: node.start_position().row as u32 + 1,
        name,
        kind,
    }
}

fn def_gate(kind: &str) -> Option<Gate> {
    DEF_KINDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, gate)| *gate)
}

fn gate_passes(node: &Node, gate: Gate) -> bool {
    match gate {
        Gate::Always => true,
        Gate::FunctionDeclarator => has_child_kind(node, "function_declarator"),
        Gate::Body => node.child_by_field_name("body").is_some(),
        Gate::FunctionValue => node.child_by_field_name("value").is_some_and(|v| {
            matches!(v.kind(), "arrow_function" | "function_expression" | "function")
        }),
    }
}

fn is_definition_site(node: &Node) -> bool {
    def_gate(node.kind()).is_some_and(|gate| gate_passes(node, gate))
}

/// Whether `node` is the callee that [`callee_name`] would pick out of
/// `parent`, to avoid counting the same reference twice.
fn is_callee_child(parent: &Node, node: &Node) -> bool {
    if !CALL_KINDS.contains(&parent.kind()) {
        return false;
    }
    CALLEE_FIELDS
        .iter()
        .any(|f| parent.child_by_field_name(f).as_ref() == Some(node))
}

/// The defined name of a declaration node.
///
/// Most grammars expose a `name` field. C-family declarators nest, so
/// those are chased down to the innermost declarator. Kotlin and Swift
/// keep the name as a plain child, hence the final scan.
fn declaration_name(node: &Node, source: &[u8]) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return rightmost_identifier(&name, source);
    }

    let mut current = *node;
    let mut descended = false;
    while let Some(declarator) = current.child_by_field_name("declarator") {
        current = declarator;
        descended = true;
    }
    if descended {
        return rightmost_identifier(&current, source);
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if IDENT_KINDS.contains(&child.kind()) {
            let text = node_text(&child, source);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// The name a call resolves to, as written at the call site.
///
/// `foo.bar()` yields `bar`, `Config::new()` yields `new`, `new Foo()`
/// yields `Foo`.
fn callee_name(node: &Node, source: &[u8]) -> Option<String> {
    for field in CALLEE_FIELDS {
        if let Some(callee) = node.child_by_field_name(field) {
            return rightmost_identifier(&callee, source);
        }
    }
    // Kotlin and Swift call_expression put the callee first, unlabeled
    node.named_child(0)
        .and_then(|callee| rightmost_identifier(&callee, source))
}

/// The identifier a dotted or scoped expression ultimately names.
fn rightmost_identifier(node: &Node, source: &[u8]) -> Option<String> {
    if IDENT_KINDS.contains(&node.kind()) {
        let text = node_text(node, source);
        return (!text.is_empty()).then_some(text);
    }

    for field in ["name", "field", "property", "attribute", "method", "function"] {
        if let Some(child) = node.child_by_field_name(field) {
            return rightmost_identifier(&child, source);
        }
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children.iter().rev() {
        if IDENT_KINDS.contains(&child.kind()) {
            let text = node_text(child, source);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    for child in children.iter().rev() {
        if let Some(name) = rightmost_identifier(child, source) {
            return Some(name);
        }
    }
    None
}

fn node_text(node: &Node, source: &[u8]) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    if start >= source.len() || end > source.len() {
        return String::new();
    }
    String::from_utf8_lossy(&source[start..end]).to_string()
}

fn has_child_kind(node: &Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            return true;
        }
    }
    false
}
