use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use carto_core::{CartoConfig, CartoError, OutputSink, Result, Severity};

use crate::budget::{self, Probe};
use crate::cache::TagCache;
use crate::extract;
use crate::graph::ReferenceGraph;
use crate::important::filter_important_files;
use crate::rank::{self, PRIORITY_SEED};
use crate::render;
use crate::report::FileReport;
use crate::score::score_tags;
use crate::search::{search_tags, SearchOptions, SearchResult};
use crate::tags::{ScoredTag, Tag, TagKind};
use crate::tokens::{sampled_count, TokenCounter};
use crate::walker::{self, SourceFile};

/// Breathing room subtracted from the context window before the budget is
/// allowed to grow on mapper-only requests.
const CONTEXT_WINDOW_PADDING: usize = 1024;

/// Cache key for rendered maps: sorted priority paths, sorted other paths,
/// effective token budget, sorted mentioned files, sorted mentioned
/// identifiers.
type MapKey = (Vec<String>, Vec<String>, usize, Vec<String>, Vec<String>);

/// Intermediate output of the ranking stage, before budget selection.
struct RankedTags {
    /// Important files with no scored tags, listed before ranked content.
    specials: Vec<String>,
    /// Definition tags, highest score first.
    scored: Vec<ScoredTag>,
    /// Accounting for the caller.
    report: FileReport,
    /// Unique input files as `(absolute, relative)` strings, sorted.
    inputs: Vec<(String, String)>,
}

/// Repository map generator.
///
/// Walks from a repository root, resolves tags through the persistent cache,
/// ranks files by cross-file references, and renders the highest-ranked
/// definitions into a map string that fits a token budget. One instance per
/// repository root; rendered maps are memoized per input set for the life of
/// the instance.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use std::sync::Arc;
///
/// use carto_core::{CartoConfig, SilentSink};
/// use carto_map::engine::RepoMapper;
/// use carto_map::tokens::CharCounter;
///
/// let dir = tempfile::tempdir()?;
/// let mut mapper = RepoMapper::new(
///     dir.path(),
///     CartoConfig::default(),
///     Box::new(CharCounter),
///     Arc::new(SilentSink),
/// );
///
/// // No files to map yet.
/// let (map, report) = mapper.generate_map(&[], &[], &BTreeSet::new(), &BTreeSet::new());
/// assert!(map.is_none());
/// assert_eq!(report.total_files_considered, 0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RepoMapper {
    root: PathBuf,
    config: CartoConfig,
    /// Effective base budget. Forced to zero for the life of the mapper if
    /// ranking hits a structural limit.
    max_map_tokens: usize,
    counter: Box<dyn TokenCounter>,
    sink: Arc<dyn OutputSink>,
    cache: TagCache,
    map_cache: HashMap<MapKey, (Option<String>, FileReport)>,
    verbose: bool,
    force_refresh: bool,
}

impl RepoMapper {
    /// Create a mapper for the repository at `root`.
    ///
    /// Opens the tags cache under the root (falling back to an in-memory
    /// cache when the on-disk store cannot be used).
    pub fn new(
        root: &Path,
        config: CartoConfig,
        counter: Box<dyn TokenCounter>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        let cache = TagCache::open(root, config.cache.persistent, Arc::clone(&sink));
        let max_map_tokens = config.map.map_tokens;
        Self {
            root: root.to_path_buf(),
            config,
            max_map_tokens,
            counter,
            sink,
            cache,
            map_cache: HashMap::new(),
            verbose: false,
            force_refresh: false,
        }
    }

    /// Emit progress info and append the file overview to generated maps.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Re-extract tags even when the cache holds a fresh entry, and skip the
    /// rendered-map memo.
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// Repository root this mapper serves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current base token budget. Zero when mapping is disabled.
    pub fn max_map_tokens(&self) -> usize {
        self.max_map_tokens
    }

    /// The tags cache backing this mapper.
    pub fn tag_cache(&self) -> &TagCache {
        &self.cache
    }

    /// Generate a repository map for the given files.
    ///
    /// `chat_files` are priority files: they seed the ranking and boost
    /// their own definitions. `other_files` are the candidate pool; with no
    /// candidates there is nothing to map. `mentioned_fnames` are
    /// repo-relative paths and `mentioned_idents` identifier names, both
    /// boosting matching definitions.
    ///
    /// Returns the rendered map (`None` when nothing fits the budget or the
    /// inputs are empty) and a [`FileReport`] describing what happened to
    /// each input file. Failures never propagate: they are reported through
    /// the sink and produce an empty map.
    pub fn generate_map(
        &mut self,
        chat_files: &[PathBuf],
        other_files: &[PathBuf],
        mentioned_fnames: &BTreeSet<String>,
        mentioned_idents: &BTreeSet<String>,
    ) -> (Option<String>, FileReport) {
        if self.max_map_tokens == 0 || other_files.is_empty() {
            return (None, self.empty_report(chat_files, other_files));
        }

        // A map with no priority files is the only context the caller has,
        // so it may take a larger share of the context window.
        let mut budget = self.max_map_tokens;
        if chat_files.is_empty() {
            if let Some(window) = self.config.map.max_context_window {
                let available = window.saturating_sub(CONTEXT_WINDOW_PADDING);
                budget = (budget * self.config.map.map_mul_no_files).min(available);
            }
        }

        let (map, report) = match self.ranked_tags_map(
            chat_files,
            other_files,
            budget,
            mentioned_fnames,
            mentioned_idents,
        ) {
            Ok(result) => result,
            Err(CartoError::GraphTooLarge(_)) => {
                self.sink
                    .emit(Severity::Error, "Disabling repo map, git repo too large?");
                self.max_map_tokens = 0;
                return (None, self.empty_report(chat_files, other_files));
            }
            Err(err) => {
                self.sink
                    .emit(Severity::Error, &format!("Repo map generation failed: {err}"));
                return (None, self.empty_report(chat_files, other_files));
            }
        };

        let Some(map) = map else {
            return (None, report);
        };

        if self.verbose {
            let tokens = sampled_count(self.counter.as_ref(), &map);
            self.sink.emit(
                Severity::Info,
                &format!("Repo-map: {:.1} k-tokens", tokens as f64 / 1024.0),
            );
        }

        let other = if chat_files.is_empty() { "" } else { "other " };
        let rendered = match &self.config.map.content_prefix {
            Some(prefix) => format!("{}{map}", prefix.replace("{other}", other)),
            None => map,
        };

        (Some(rendered), report)
    }

    /// Search tags across the repository by identifier substring.
    ///
    /// Walks the repository, resolves tags through the cache, and matches
    /// case-insensitively against tag names.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::FileNotFound`] when the repository root does
    /// not exist.
    pub fn search(&mut self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let files = walker::walk_repo(&self.root)?;
        let mut tags = Vec::new();
        for file in &files {
            tags.extend(self.tags_for_file(&file.path, &file.rel_path));
        }
        Ok(search_tags(&tags, query, options))
    }

    /// Walk the repository root for mappable source files.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::FileNotFound`] when the repository root does
    /// not exist.
    pub fn find_source_files(&self) -> Result<Vec<SourceFile>> {
        walker::walk_repo(&self.root)
    }

    /// Memoized map generation keyed by the full input set.
    fn ranked_tags_map(
        &mut self,
        chat_files: &[PathBuf],
        other_files: &[PathBuf],
        budget: usize,
        mentioned_fnames: &BTreeSet<String>,
        mentioned_idents: &BTreeSet<String>,
    ) -> Result<(Option<String>, FileReport)> {
        let key = map_cache_key(chat_files, other_files, budget, mentioned_fnames, mentioned_idents);
        if !self.force_refresh {
            if let Some(hit) = self.map_cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let result = self.ranked_tags_map_uncached(
            chat_files,
            other_files,
            budget,
            mentioned_fnames,
            mentioned_idents,
        )?;
        self.map_cache.insert(key, result.clone());
        Ok(result)
    }

    fn ranked_tags_map_uncached(
        &mut self,
        chat_files: &[PathBuf],
        other_files: &[PathBuf],
        budget: usize,
        mentioned_fnames: &BTreeSet<String>,
        mentioned_idents: &BTreeSet<String>,
    ) -> Result<(Option<String>, FileReport)> {
        let RankedTags {
            specials,
            scored,
            report,
            inputs,
        } = self.ranked_tags(chat_files, other_files, mentioned_fnames, mentioned_idents)?;

        let total = specials.len() + scored.len();
        if total == 0 {
            return Ok((None, report));
        }

        // Special files spend budget before any ranked tag does.
        let selection = budget::select(total, budget, |n| {
            let n_specials = n.min(specials.len());
            let n_tags = n - n_specials;
            let rendered = render::to_map(&specials[..n_specials], &scored[..n_tags]);
            if rendered.is_empty() {
                return None;
            }
            let tokens = sampled_count(self.counter.as_ref(), &rendered);
            let mut files: BTreeSet<String> = specials[..n_specials].iter().cloned().collect();
            files.extend(scored[..n_tags].iter().map(|t| t.tag.rel_str()));
            Some(Probe {
                rendered,
                tokens,
                files,
            })
        });

        let Some(selection) = selection else {
            return Ok((None, report));
        };

        let mut map = selection.rendered;
        if self.verbose {
            let overview = self.file_overview(&inputs, &selection.files, &report);
            if !overview.is_empty() {
                map.push_str("\n\n");
                map.push_str(&overview);
            }
        }

        Ok((Some(map), report))
    }

    /// Resolve, rank, and score every input file.
    fn ranked_tags(
        &mut self,
        chat_files: &[PathBuf],
        other_files: &[PathBuf],
        mentioned_fnames: &BTreeSet<String>,
        mentioned_idents: &BTreeSet<String>,
    ) -> Result<RankedTags> {
        let chat_set: BTreeSet<PathBuf> = chat_files.iter().map(|p| self.normalize(p)).collect();
        let other_set: BTreeSet<PathBuf> = other_files.iter().map(|p| self.normalize(p)).collect();
        let all: BTreeSet<PathBuf> = chat_set.union(&other_set).cloned().collect();

        let mut report = FileReport {
            total_files_considered: all.len(),
            ..FileReport::default()
        };

        let mut tags_by_file: BTreeMap<String, Vec<Tag>> = BTreeMap::new();
        let mut personalization: BTreeMap<String, f64> = BTreeMap::new();
        let mut chat_rels: BTreeSet<String> = BTreeSet::new();
        let mut inputs: Vec<(String, String)> = Vec::new();
        let mut included: BTreeSet<String> = BTreeSet::new();

        for path in &all {
            let abs = path.to_string_lossy().into_owned();
            let rel = self.rel_fname(path);
            let rel_str = rel.to_string_lossy().into_owned();
            inputs.push((abs.clone(), rel_str.clone()));

            if !path.exists() {
                self.sink.emit(
                    Severity::Warning,
                    &format!("Repo-map can't include {}: File not found", path.display()),
                );
                report.exclude(abs, "File not found");
                continue;
            }

            let tags = self.tags_for_file(path, &rel);
            for tag in &tags {
                match tag.kind {
                    TagKind::Def => report.definition_matches += 1,
                    TagKind::Ref => report.reference_matches += 1,
                }
            }

            if chat_set.contains(path) {
                personalization.insert(rel_str.clone(), PRIORITY_SEED);
                chat_rels.insert(rel_str.clone());
            }

            tags_by_file.insert(rel_str, tags);
            included.insert(abs);
        }

        for (abs, _) in &inputs {
            if !included.contains(abs) {
                report.mark_not_processed(abs.clone());
            }
        }

        let graph = ReferenceGraph::build(&tags_by_file)?;
        let ranking = rank::rank(&graph, &personalization);
        let scored = score_tags(
            &ranking,
            &tags_by_file,
            mentioned_idents,
            mentioned_fnames,
            &chat_rels,
            &self.config.boosts,
            self.config.map.exclude_unranked,
        );

        // README and friends earn a bare mention even when nothing
        // references them.
        let ranked_files: BTreeSet<String> = scored.iter().map(|t| t.tag.rel_str()).collect();
        let other_rels: Vec<String> = other_set
            .iter()
            .filter(|p| included.contains(p.to_string_lossy().as_ref()))
            .map(|p| self.rel_fname(p).to_string_lossy().into_owned())
            .collect();
        let specials: Vec<String> = filter_important_files(&other_rels)
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|rel| !ranked_files.contains(rel))
            .collect();

        Ok(RankedTags {
            specials,
            scored,
            report,
            inputs,
        })
    }

    /// Summarize input files that did not make it into the rendered map.
    fn file_overview(
        &self,
        inputs: &[(String, String)],
        files_in_map: &BTreeSet<String>,
        report: &FileReport,
    ) -> String {
        let mut cutoff = Vec::new();
        let mut excluded = Vec::new();
        for (abs, rel) in inputs {
            if files_in_map.contains(rel) {
                continue;
            }
            match report.excluded.get(abs) {
                Some(reason) => excluded.push((rel.as_str(), FileReport::strip_status(reason))),
                None => cutoff.push(rel.as_str()),
            }
        }

        let mut lines = Vec::new();
        if !cutoff.is_empty() {
            lines.push(format!("Files not shown (token limit): {}", cutoff.len()));
            for rel in &cutoff {
                lines.push(format!("  [-] {rel}"));
            }
            lines.push(String::new());
        }
        if !excluded.is_empty() {
            lines.push(format!("Files excluded: {}", excluded.len()));
            for (rel, reason) in &excluded {
                lines.push(format!("  [x] {rel} ({reason})"));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// Tags for one file, through the cache, with parse errors reported to
    /// the sink rather than propagated.
    fn tags_for_file(&mut self, path: &Path, rel: &Path) -> Vec<Tag> {
        let sink = Arc::clone(&self.sink);
        self.cache
            .get_tags(path, rel, self.force_refresh, |p, r| {
                match extract::file_tags(p, r) {
                    Ok(tags) => tags,
                    Err(err) => {
                        sink.emit(Severity::Error, &format!("Error parsing {}: {err}", p.display()));
                        Vec::new()
                    }
                }
            })
    }

    fn empty_report(&self, chat_files: &[PathBuf], other_files: &[PathBuf]) -> FileReport {
        let unique: BTreeSet<PathBuf> = chat_files
            .iter()
            .chain(other_files)
            .map(|p| self.normalize(p))
            .collect();
        FileReport {
            total_files_considered: unique.len(),
            ..FileReport::default()
        }
    }

    fn rel_fname(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn map_cache_key(
    chat_files: &[PathBuf],
    other_files: &[PathBuf],
    budget: usize,
    mentioned_fnames: &BTreeSet<String>,
    mentioned_idents: &BTreeSet<String>,
) -> MapKey {
    let mut chat: Vec<String> = chat_files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    chat.sort();
    let mut other: Vec<String> = other_files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    other.sort();
    (
        chat,
        other,
        budget,
        mentioned_fnames.iter().cloned().collect(),
        mentioned_idents.iter().cloned().collect(),
    )
}
