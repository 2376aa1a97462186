//! Definition scoring.
//!
//! Each definition inherits its file's rank, then mention and priority
//! boosts multiply on top. Boosts compose: a mentioned identifier inside
//! a priority file gets both factors.

use std::collections::{BTreeMap, BTreeSet};

use carto_core::BoostConfig;

use crate::rank::Ranking;
use crate::tags::{ScoredTag, Tag, TagKind};

/// Score every definition tag, highest first.
///
/// With `exclude_unranked` set, files whose rank is at or below the
/// near-zero epsilon are dropped wholesale. The check runs before boosts,
/// so no mention can resurrect a file the graph considers disconnected.
/// Ties keep file order, so equal-ranked files list alphabetically.
pub fn score_tags(
    ranking: &Ranking,
    tags_by_file: &BTreeMap<String, Vec<Tag>>,
    mentioned_idents: &BTreeSet<String>,
    mentioned_files: &BTreeSet<String>,
    priority_files: &BTreeSet<String>,
    boosts: &BoostConfig,
    exclude_unranked: bool,
) -> Vec<ScoredTag> {
    let mut scored = Vec::new();

    for (rel, tags) in tags_by_file {
        let file_rank = ranking.score(rel);
        if exclude_unranked && file_rank <= boosts.near_zero_epsilon {
            continue;
        }

        for tag in tags {
            if tag.kind != TagKind::Def {
                continue;
            }
            let mut boost = 1.0;
            if mentioned_idents.contains(&tag.name) {
                boost *= boosts.mentioned_ident;
            }
            if mentioned_files.contains(rel) {
                boost *= boosts.mentioned_file;
            }
            if priority_files.contains(rel) {
                boost *= boosts.priority_file;
            }
            scored.push(ScoredTag {
                score: file_rank * boost,
                tag: tag.clone(),
            });
        }
    }

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::RankMode;
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

    fn ranking(scores: &[(&str, f64)]) -> Ranking {
        Ranking {
            mode: RankMode::Uniform,
            scores: scores
                .iter()
                .map(|(rel, score)| (rel.to_string(), *score))
                .collect(),
        }
    }

    fn tags_map(entries: Vec<(&str, Vec<Tag>)>) -> BTreeMap<String, Vec<Tag>> {
        entries
            .into_iter()
            .map(|(rel, tags)| (rel.to_string(), tags))
            .collect()
    }

    fn no_mentions() -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn set_of(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_definitions_are_scored() {
        let tags = tags_map(vec![(
            "a.py",
            vec![
                tag("a.py", "foo", TagKind::Def),
                tag("a.py", "bar", TagKind::Ref),
            ],
        )]);
        let scored = score_tags(
            &ranking(&[("a.py", 1.0)]),
            &tags,
            &no_mentions(),
            &no_mentions(),
            &no_mentions(),
            &BoostConfig::default(),
            false,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].tag.name, "foo");
    }

    #[test]
    fn higher_ranked_files_come_first() {
        let tags = tags_map(vec![
            ("low.py", vec![tag("low.py", "a", TagKind::Def)]),
            ("high.py", vec![tag("high.py", "b", TagKind::Def)]),
        ]);
        let scored = score_tags(
            &ranking(&[("low.py", 0.1), ("high.py", 0.9)]),
            &tags,
            &no_mentions(),
            &no_mentions(),
            &no_mentions(),
            &BoostConfig::default(),
            false,
        );
        assert_eq!(scored[0].tag.rel_str(), "high.py");
        assert_eq!(scored[1].tag.rel_str(), "low.py");
    }

    #[test]
    fn mentioned_identifier_multiplies_by_ten() {
        let tags = tags_map(vec![(
            "a.py",
            vec![
                tag("a.py", "plain", TagKind::Def),
                tag("a.py", "special", TagKind::Def),
            ],
        )]);
        let scored = score_tags(
            &ranking(&[("a.py", 0.5)]),
            &tags,
            &set_of(&["special"]),
            &no_mentions(),
            &no_mentions(),
            &BoostConfig::default(),
            false,
        );
        let special = scored.iter().find(|s| s.tag.name == "special").unwrap();
        let plain = scored.iter().find(|s| s.tag.name == "plain").unwrap();
        assert!((special.score - 5.0).abs() < 1e-9);
        assert!((plain.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn mentioned_file_multiplies_by_five() {
        let tags = tags_map(vec![("a.py", vec![tag("a.py", "foo", TagKind::Def)])]);
        let scored = score_tags(
            &ranking(&[("a.py", 0.2)]),
            &tags,
            &no_mentions(),
            &set_of(&["a.py"]),
            &no_mentions(),
            &BoostConfig::default(),
            false,
        );
        assert!((scored[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn priority_file_multiplies_by_twenty() {
        let tags = tags_map(vec![("a.py", vec![tag("a.py", "foo", TagKind::Def)])]);
        let scored = score_tags(
            &ranking(&[("a.py", 0.2)]),
            &tags,
            &no_mentions(),
            &no_mentions(),
            &set_of(&["a.py"]),
            &BoostConfig::default(),
            false,
        );
        assert!((scored[0].score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn boosts_compose_multiplicatively() {
        let tags = tags_map(vec![("a.py", vec![tag("a.py", "special", TagKind::Def)])]);
        let scored = score_tags(
            &ranking(&[("a.py", 0.5)]),
            &tags,
            &set_of(&["special"]),
            &no_mentions(),
            &set_of(&["a.py"]),
            &BoostConfig::default(),
            false,
        );
        // 0.5 * 10 * 20
        assert!((scored[0].score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn exclude_unranked_drops_files_at_epsilon() {
        let boosts = BoostConfig::default();
        let tags = tags_map(vec![(
            "faint.py",
            vec![tag("faint.py", "special", TagKind::Def)],
        )]);
        let rankings = ranking(&[("faint.py", boosts.near_zero_epsilon)]);

        let excluded = score_tags(
            &rankings,
            &tags,
            &set_of(&["special"]),
            &no_mentions(),
            &no_mentions(),
            &boosts,
            true,
        );
        assert!(
            excluded.is_empty(),
            "boosts must not resurrect a near-zero file"
        );

        let kept = score_tags(
            &rankings,
            &tags,
            &set_of(&["special"]),
            &no_mentions(),
            &no_mentions(),
            &boosts,
            false,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn ties_keep_file_order() {
        let tags = tags_map(vec![
            ("b.py", vec![tag("b.py", "two", TagKind::Def)]),
            ("a.py", vec![tag("a.py", "one", TagKind::Def)]),
        ]);
        let scored = score_tags(
            &ranking(&[("a.py", 0.5), ("b.py", 0.5)]),
            &tags,
            &no_mentions(),
            &no_mentions(),
            &no_mentions(),
            &BoostConfig::default(),
            false,
        );
        assert_eq!(scored[0].tag.rel_str(), "a.py");
        assert_eq!(scored[1].tag.rel_str(), "b.py");
    }
}
