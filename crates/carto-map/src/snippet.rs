//! Line-window excerpt rendering for map blocks and search context.

use std::collections::BTreeSet;

/// Render the body of an excerpt: each selected line as `{line:4}│{text}`,
/// with `   ⋮` marking gaps between non-adjacent ranges.
///
/// Lines of interest are 1-indexed, expanded by `context` lines on both
/// sides; overlapping windows merge. Out-of-range line numbers are ignored.
/// Returns the empty string when nothing is selectable.
pub fn render_lines(code: &str, lines_of_interest: &[u32], context: usize) -> String {
    if code.is_empty() || lines_of_interest.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = code.lines().collect();
    let total = lines.len();

    let mut wanted = BTreeSet::new();
    for &loi in lines_of_interest {
        let loi = loi as usize;
        if loi == 0 || loi > total {
            continue;
        }
        let start = loi.saturating_sub(context).max(1);
        let end = (loi + context).min(total);
        for n in start..=end {
            wanted.insert(n);
        }
    }
    if wanted.is_empty() {
        return String::new();
    }

    let mut rendered = Vec::new();
    let mut prev: Option<usize> = None;
    for n in wanted {
        if let Some(p) = prev {
            if n > p + 1 {
                rendered.push("   ⋮".to_string());
            }
        }
        rendered.push(format!("{n:4}│{}", lines[n - 1]));
        prev = Some(n);
    }
    rendered.join("\n")
}

/// Render a full excerpt of `code` covering `lines_of_interest`, headed by
/// `{rel_path}:`.
///
/// Returns the empty string when there is nothing to show, so callers can
/// skip unrenderable files without special-casing.
///
/// # Examples
///
/// ```
/// use carto_map::snippet::render_snippet;
///
/// let code = "fn a() {}\nfn b() {}\nfn c() {}\n";
/// let out = render_snippet("src/lib.rs", code, &[1, 3], 0);
/// assert!(out.starts_with("src/lib.rs:\n"));
/// assert!(out.contains("   1│fn a() {}"));
/// assert!(out.contains("   ⋮"));
/// ```
pub fn render_snippet(rel_path: &str, code: &str, lines_of_interest: &[u32], context: usize) -> String {
    let body = render_lines(code, lines_of_interest, context);
    if body.is_empty() {
        return String::new();
    }
    format!("{rel_path}:\n{body}")
}
