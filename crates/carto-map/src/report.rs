use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status prefix for files recorded with a concrete exclusion reason.
pub const EXCLUDED_PREFIX: &str = "[EXCLUDED] ";

/// Status prefix for input files that reached neither the included nor the
/// excluded set.
pub const NOT_PROCESSED_PREFIX: &str = "[NOT PROCESSED] ";

/// Observability data accumulated while ranking one file set.
///
/// Returned alongside the map so callers can see which input files made it
/// into ranking and which did not. Never influences ranking or selection,
/// and is not persisted. Files dropped by the budget search are not report
/// exclusions; they show up in the verbose overview instead.
///
/// # Examples
///
/// ```
/// use carto_map::report::FileReport;
///
/// let mut report = FileReport::default();
/// report.exclude("/repo/gone.py", "File not found");
/// assert_eq!(report.excluded["/repo/gone.py"], "[EXCLUDED] File not found");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// Input files that did not make it into ranking, keyed by path, with a
    /// status-prefixed human-readable reason.
    pub excluded: BTreeMap<String, String>,
    /// Total definition tags seen across included files.
    pub definition_matches: usize,
    /// Total reference tags seen across included files.
    pub reference_matches: usize,
    /// Number of unique input files.
    pub total_files_considered: usize,
}

impl FileReport {
    /// Record a file excluded for a concrete reason.
    pub fn exclude(&mut self, path: impl Into<String>, reason: &str) {
        self.excluded
            .insert(path.into(), format!("{EXCLUDED_PREFIX}{reason}"));
    }

    /// Record an input file that was neither included nor excluded. Keeps an
    /// existing exclusion reason if one was already recorded.
    pub fn mark_not_processed(&mut self, path: impl Into<String>) {
        self.excluded
            .entry(path.into())
            .or_insert_with(|| format!("{NOT_PROCESSED_PREFIX}File not included in final processing"));
    }

    /// Strip the status prefix from a recorded reason, for display.
    pub fn strip_status(reason: &str) -> &str {
        reason
            .strip_prefix(EXCLUDED_PREFIX)
            .or_else(|| reason.strip_prefix(NOT_PROCESSED_PREFIX))
            .unwrap_or(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_adds_status_prefix() {
        let mut report = FileReport::default();
        report.exclude("/repo/a.py", "File not found");
        assert_eq!(report.excluded["/repo/a.py"], "[EXCLUDED] File not found");
    }

    #[test]
    fn mark_not_processed_keeps_existing_reason() {
        let mut report = FileReport::default();
        report.exclude("/repo/a.py", "File not found");
        report.mark_not_processed("/repo/a.py");
        report.mark_not_processed("/repo/b.py");

        assert_eq!(report.excluded["/repo/a.py"], "[EXCLUDED] File not found");
        assert_eq!(
            report.excluded["/repo/b.py"],
            "[NOT PROCESSED] File not included in final processing"
        );
    }

    #[test]
    fn strip_status_removes_either_prefix() {
        assert_eq!(
            FileReport::strip_status("[EXCLUDED] File not found"),
            "File not found"
        );
        assert_eq!(
            FileReport::strip_status("[NOT PROCESSED] File not included in final processing"),
            "File not included in final processing"
        );
        assert_eq!(FileReport::strip_status("bare reason"), "bare reason");
    }

    #[test]
    fn report_serializes_camel_case() {
        let mut report = FileReport::default();
        report.total_files_considered = 3;
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"totalFilesConsidered\":3"));
        assert!(json.contains("\"definitionMatches\":0"));
        assert!(json.contains("\"referenceMatches\":0"));
    }
}
