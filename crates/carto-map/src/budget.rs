//! Token budget fitting.
//!
//! The ranked tag list is cut to the longest prefix whose rendered map
//! stays inside the token budget. Rendering a prefix is expensive, so a
//! binary search over prefix lengths probes O(log n) renders instead of
//! growing one tag at a time.

use std::collections::BTreeSet;

/// One rendered prefix, as measured by the probe callback.
pub struct Probe {
    pub rendered: String,
    pub tokens: usize,
    pub files: BTreeSet<String>,
}

/// The best prefix found within budget.
#[derive(Debug)]
pub struct Selection {
    pub rendered: String,
    /// How many entries of the ranked sequence made it in.
    pub tag_count: usize,
    /// Relative paths of files present in the rendered map.
    pub files: BTreeSet<String>,
}

/// Binary search for the largest prefix of `total` entries that renders
/// within `budget` tokens.
///
/// The probe receives a prefix length (always at least 1) and returns
/// `None` when that prefix renders to nothing. `None` means no prefix
/// fits, including when `total` is zero or the budget is too small for
/// even a single entry.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use carto_map::budget::{select, Probe};
///
/// // Each entry costs ten tokens.
/// let best = select(5, 35, |n| {
///     Some(Probe {
///         rendered: "entry\n".repeat(n),
///         tokens: 10 * n,
///         files: BTreeSet::new(),
///     })
/// });
/// assert_eq!(best.unwrap().tag_count, 3);
/// ```
pub fn select<F>(total: usize, budget: usize, mut probe: F) -> Option<Selection>
where
    F: FnMut(usize) -> Option<Probe>,
{
    let mut left = 1;
    let mut right = total;
    let mut best: Option<Selection> = None;

    while left <= right {
        let mid = (left + right) / 2;
        match probe(mid) {
            Some(p) if p.tokens <= budget => {
                best = Some(Selection {
                    rendered: p.rendered,
                    tag_count: mid,
                    files: p.files,
                });
                left = mid + 1;
            }
            _ => right = mid - 1,
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_probe(n: usize) -> Option<Probe> {
        Some(Probe {
            rendered: "line\n".repeat(n),
            tokens: 10 * n,
            files: (0..n).map(|i| format!("f{i}.py")).collect(),
        })
    }

    #[test]
    fn everything_fits_under_a_large_budget() {
        let best = select(4, 1000, linear_probe).unwrap();
        assert_eq!(best.tag_count, 4);
        assert_eq!(best.files.len(), 4);
        assert_eq!(best.rendered, "line\n".repeat(4));
    }

    #[test]
    fn budget_cuts_the_prefix() {
        let best = select(10, 35, linear_probe).unwrap();
        assert_eq!(best.tag_count, 3);
    }

    #[test]
    fn single_entry_is_selected_when_it_fits() {
        let best = select(1, 100, linear_probe).unwrap();
        assert_eq!(best.tag_count, 1);
    }

    #[test]
    fn exact_budget_boundary_is_included() {
        let best = select(10, 30, linear_probe).unwrap();
        assert_eq!(best.tag_count, 3, "tokens equal to budget still fit");
    }

    #[test]
    fn zero_budget_selects_nothing() {
        assert!(select(10, 0, linear_probe).is_none());
    }

    #[test]
    fn empty_sequence_selects_nothing() {
        let mut calls = 0;
        let best = select(0, 100, |_| {
            calls += 1;
            linear_probe(1)
        });
        assert!(best.is_none());
        assert_eq!(calls, 0, "nothing to probe");
    }

    #[test]
    fn probe_never_sees_zero() {
        let mut smallest = usize::MAX;
        select(7, 35, |n| {
            smallest = smallest.min(n);
            linear_probe(n)
        });
        assert!(smallest >= 1);
    }

    #[test]
    fn all_empty_renders_select_nothing() {
        assert!(select(10, 1000, |_| None).is_none());
    }

    #[test]
    fn larger_budgets_never_select_less() {
        let mut last = 0;
        for budget in (10..=120).step_by(10) {
            let count = select(12, budget, linear_probe)
                .map(|s| s.tag_count)
                .unwrap_or(0);
            assert!(
                count >= last,
                "budget {budget} selected {count}, below {last}"
            );
            last = count;
        }
    }
}
