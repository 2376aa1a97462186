//! Map rendering.
//!
//! Turns a budget-selected slice of ranked tags into the final map text.
//! Files appear in descending order of their best tag's rank, each as a
//! header line, a rank annotation, and the tagged lines of the file.
//! Important extras without tags render as bare header lines up front.

use std::collections::BTreeMap;

use crate::snippet::render_snippet;
use crate::tags::ScoredTag;

/// Render the map for the given special files and selected tags.
///
/// Returns an empty string when there is nothing to show. Files whose
/// content cannot be read are dropped from the output rather than
/// failing the whole map.
///
/// # Examples
///
/// ```
/// use carto_map::render::to_map;
///
/// let map = to_map(&["README.md".to_string()], &[]);
/// assert_eq!(map, "README.md:");
/// ```
pub fn to_map(special_files: &[String], selected: &[ScoredTag]) -> String {
    let mut parts: Vec<String> = Vec::new();

    for rel in special_files {
        parts.push(format!("{rel}:"));
    }

    // Group by file, keeping the order tags first appear in.
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<&ScoredTag>> = BTreeMap::new();
    for scored in selected {
        let rel = scored.tag.rel_str();
        if !groups.contains_key(&rel) {
            order.push(rel.clone());
        }
        groups.entry(rel).or_default().push(scored);
    }

    let max_rank: BTreeMap<&str, f64> = groups
        .iter()
        .map(|(rel, tags)| {
            let max = tags
                .iter()
                .map(|t| t.score)
                .fold(f64::NEG_INFINITY, f64::max);
            (rel.as_str(), max)
        })
        .collect();

    // Stable, so equal-ranked files keep selection order
    order.sort_by(|a, b| max_rank[b.as_str()].total_cmp(&max_rank[a.as_str()]));

    for rel in &order {
        let tags = &groups[rel];
        let lois: Vec<u32> = tags.iter().map(|t| t.tag.line).collect();

        let Ok(bytes) = std::fs::read(&tags[0].tag.path) else {
            continue;
        };
        let code = String::from_utf8_lossy(&bytes);
        let rendered = render_snippet(rel, &code, &lois, 0);
        if rendered.is_empty() {
            continue;
        }

        let (header, body) = rendered.split_once('\n').unwrap_or((rendered.as_str(), ""));
        parts.push(format!(
            "{header}\n(Rank value: {:.4})\n\n{body}",
            max_rank[rel.as_str()]
        ));
    }

    parts.join("\n\n")
}
