use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};

use carto_core::{CartoConfig, ConsoleSink, OutputFormat, SilentSink};
use carto_map::cache::{cache_dir_name, TagCache};
use carto_map::tags::TagKind;
use carto_map::tokens::{CharCounter, TiktokenCounter};
use carto_map::walker::{self, Language};
use carto_map::{RepoMapper, SearchOptions};

#[derive(Parser)]
#[command(
    name = "carto",
    version,
    about = "Token-budget repository maps for coding agents",
    long_about = "Carto distills a repository into a compact, importance-ranked map that fits\n\
                   a token budget — show an agent the code that matters first.\n\n\
                   Source files are parsed with tree-sitter, files are ranked by cross-file\n\
                   references with personalized PageRank, and the largest map that fits the\n\
                   budget is found by binary search.\n\n\
                   Examples:\n  \
                     carto map                          Map the current repository\n  \
                     carto map src/ --map-tokens 2048   Map src/ with a 2k token budget\n  \
                     carto map --chat-file src/app.py   Rank around a file being edited\n  \
                     carto search parse_config          Find an identifier across the repo\n  \
                     carto mcp                          Serve maps over MCP\n  \
                     carto doctor                       Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .carto.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a token-budgeted map of the repository
    #[command(long_about = "Generate a token-budgeted map of the repository.\n\n\
        Parses source files with tree-sitter, ranks them by cross-file references\n\
        using personalized PageRank, and binary-searches for the largest map that\n\
        fits the token budget. Priority files, mentioned files, and mentioned\n\
        identifiers all boost what they touch.\n\n\
        Examples:\n  carto map\n  carto map src/ --map-tokens 2048\n  \
        carto map --chat-file src/app.py --mentioned-ident parse_args\n  \
        carto map --format json | jq .report")]
    Map {
        /// Files or directories to include in the map
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Repository root directory
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Maximum tokens for the generated map (default: 8192)
        #[arg(long)]
        map_tokens: Option<usize>,

        /// File currently being edited; boosts it and what it references
        #[arg(
            long,
            long_help = "File currently being edited (repeatable).\n\nChat files seed the ranking with extra weight, and their own\ndefinitions are boosted to the front of the map."
        )]
        chat_file: Vec<PathBuf>,

        /// Candidate file for the map body; overrides positional paths
        #[arg(long)]
        other_file: Vec<PathBuf>,

        /// Repo-relative path mentioned in the conversation (repeatable)
        #[arg(long)]
        mentioned_file: Vec<String>,

        /// Identifier mentioned in the conversation (repeatable)
        #[arg(long)]
        mentioned_ident: Vec<String>,

        /// Consumer context window size
        #[arg(
            long,
            long_help = "Consumer context window size in tokens.\n\nWhen no chat files are given the budget grows to fill spare window\nspace, capped at the window minus a fixed padding."
        )]
        max_context_window: Option<usize>,

        /// Re-extract tags even when caches are fresh
        #[arg(long)]
        force_refresh: bool,

        /// Skip files with near-zero importance
        #[arg(long)]
        exclude_unranked: bool,

        /// Output format: text, or json with the map and the file report
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Search identifiers across the repository
    #[command(long_about = "Search identifiers across the repository.\n\n\
        Case-insensitive substring match over every definition and reference\n\
        extracted by tree-sitter. Definitions sort before references; each hit\n\
        comes with a few lines of file context.\n\n\
        Examples:\n  carto search parse_config\n  carto search Handler --defs-only\n  \
        carto search render --max-results 10 --format json")]
    Search {
        /// Identifier substring to look for
        query: String,

        /// Repository root directory
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Maximum results to return (default: 50)
        #[arg(long, default_value = "50")]
        max_results: usize,

        /// Context lines around each hit (default: 2)
        #[arg(long, default_value = "2")]
        context_lines: usize,

        /// Only show definitions
        #[arg(long, conflicts_with = "refs_only")]
        defs_only: bool,

        /// Only show references
        #[arg(long)]
        refs_only: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Start the MCP server for agent integration
    #[command(long_about = "Start the MCP (Model Context Protocol) server.\n\n\
        Exposes repo_map and search_identifiers over stdio transport for use by\n\
        AI coding agents and IDE extensions. All path parameters are confined to\n\
        the configured root.\n\n\
        Example:\n  carto mcp /my/project")]
    Mcp {
        /// Repository root the server is allowed to read
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Create a default .carto.toml configuration file
    #[command(long_about = "Create a default .carto.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .carto.toml already exists unless --force is given.")]
    Init {
        /// Overwrite an existing .carto.toml
        #[arg(long)]
        force: bool,
    },
    /// Check your carto setup and environment
    #[command(long_about = "Check your carto setup and environment.\n\n\
        Runs diagnostics for the repository root, config file, tag cache,\n\
        tokenizer, and tree-sitter grammars. Use --format json for\n\
        machine-readable output.")]
    Doctor {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        // Bold/bright header
        println!("\x1b[1m\x1b[33m◆\x1b[0m \x1b[1mcarto\x1b[0m v{version} — show an agent the code that matters first\n");

        println!("Quick start:");
        println!("  \x1b[36mcarto init\x1b[0m                    Create a .carto.toml config file");
        println!("  \x1b[36mcarto map\x1b[0m                     Map the current repository");
        println!("  \x1b[36mcarto search <query>\x1b[0m          Find identifiers across the repo\n");

        println!("All commands:");
        println!("  \x1b[32mmap\x1b[0m       Token-budgeted, importance-ranked repository map");
        println!("  \x1b[32msearch\x1b[0m    Identifier search with file context");
        println!("  \x1b[32mmcp\x1b[0m       Start MCP server for agent integration");
        println!("  \x1b[32mdoctor\x1b[0m    Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("carto v{version} — show an agent the code that matters first\n");

        println!("Quick start:");
        println!("  carto init                    Create a .carto.toml config file");
        println!("  carto map                     Map the current repository");
        println!("  carto search <query>          Find identifiers across the repo\n");

        println!("All commands:");
        println!("  map       Token-budgeted, importance-ranked repository map");
        println!("  search    Identifier search with file context");
        println!("  mcp       Start MCP server for agent integration");
        println!("  doctor    Check your setup and environment");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'carto <command> --help' for details.");
}

/// Make a path absolute relative to `cwd`, resolving symlinks when the
/// target exists.
fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    joined.canonicalize().unwrap_or(joined)
}

/// Expand one path argument into candidate files. Directories walk like a
/// repository checkout, plain files pass through, and missing paths drop
/// out silently.
fn expand_path_spec(cwd: &Path, spec: &Path) -> Vec<PathBuf> {
    let abs = absolutize(cwd, spec);
    if abs.is_dir() {
        walker::walk_repo(&abs)
            .map(|files| files.into_iter().map(|f| f.path).collect())
            .unwrap_or_default()
    } else if abs.is_file() {
        vec![abs]
    } else {
        Vec::new()
    }
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(config: &CartoConfig, format: OutputFormat, use_color: bool) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Repository root
    let cwd = std::env::current_dir().into_diagnostic()?;
    match walker::walk_repo(&cwd) {
        Ok(files) => checks.push(CheckResult::pass(
            "repository_root",
            format!("{} ({} mappable files)", cwd.display(), files.len()),
        )),
        Err(e) => checks.push(CheckResult::fail(
            "repository_root",
            format!("cannot scan {}: {e}", cwd.display()),
            "run carto from inside a readable repository",
        )),
    }

    // 2. Config file
    let config_path = Path::new(".carto.toml");
    if config_path.exists() {
        checks.push(CheckResult::pass(
            "config_file",
            format!(
                ".carto.toml found (map budget: {} tokens)",
                config.map.map_tokens
            ),
        ));
    } else {
        checks.push(CheckResult::info(
            "config_file",
            "not found, defaults in effect (run 'carto init' to create)",
        ));
    }

    // 3. Tag cache
    let cache = TagCache::open(&cwd, true, Arc::new(SilentSink));
    if cache.is_persistent() {
        checks.push(CheckResult::pass(
            "tag_cache",
            format!(
                "{} writable ({} entries)",
                cache_dir_name(),
                cache.entry_count()
            ),
        ));
    } else {
        checks.push(CheckResult::fail(
            "tag_cache",
            "cannot open the sqlite store, maps will re-parse every run",
            format!(
                "check permissions on {}",
                cwd.join(cache_dir_name()).display()
            ),
        ));
    }

    // 4. Tokenizer
    match TiktokenCounter::new() {
        Ok(_) => checks.push(CheckResult::pass("tokenizer", "cl100k_base loaded")),
        Err(e) => checks.push(CheckResult::fail(
            "tokenizer",
            format!("failed to load cl100k_base: {e}"),
            "reinstall carto; the tokenizer data ships inside the binary",
        )),
    }

    // 5. Languages
    let languages = [
        Language::Rust,
        Language::Python,
        Language::TypeScript,
        Language::JavaScript,
        Language::Go,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::Ruby,
        Language::Php,
        Language::Kotlin,
        Language::Swift,
    ];
    let registered = languages
        .iter()
        .filter(|l| l.tree_sitter_language().is_some())
        .count();
    checks.push(CheckResult::pass(
        "languages",
        format!("{registered} tree-sitter grammars registered"),
    ));

    // Output
    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Text => {
            let version = env!("CARGO_PKG_VERSION");
            println!("carto v{version} — environment check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                // Pad the name for alignment
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Carto Configuration
# See: https://github.com/Meru143/carto

[map]
# Token budget for the rendered map
# map_tokens = 8192
# Budget multiplier applied when no chat files are given and a
# context window is configured
# map_mul_no_files = 8
# max_context_window = 128000
# Skip files whose importance is near zero
# exclude_unranked = false
# Text prepended to the map; {other} expands to "other " when chat
# files are present
# content_prefix = "Here are summaries of some {other}files:\n"

[boosts]
# mentioned_ident = 10.0
# mentioned_file = 5.0
# priority_file = 20.0
# near_zero_epsilon = 1e-4

[cache]
# Keep extracted tags in a sqlite store under the repository root
# persistent = true
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CartoConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display()))?,
        None => {
            let default_path = Path::new(".carto.toml");
            if default_path.exists() {
                CartoConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err("reading .carto.toml")?
            } else {
                CartoConfig::default()
            }
        }
    };

    let use_color = std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err();

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Map {
            ref paths,
            ref root,
            map_tokens,
            ref chat_file,
            ref other_file,
            ref mentioned_file,
            ref mentioned_ident,
            max_context_window,
            force_refresh,
            exclude_unranked,
            format,
        }) => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            let root = absolutize(&cwd, root);
            if !root.is_dir() {
                miette::bail!(miette::miette!(
                    help = "pass --root <dir> pointing at the repository to map",
                    "Not a directory: {}",
                    root.display()
                ));
            }

            let mut config = config.clone();
            if let Some(tokens) = map_tokens {
                config.map.map_tokens = tokens;
            }
            if let Some(window) = max_context_window {
                config.map.max_context_window = Some(window);
            }
            if exclude_unranked {
                config.map.exclude_unranked = true;
            }

            let spinner = if cli.verbose && std::io::stderr().is_terminal() {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .unwrap(),
                );
                pb.set_message(format!("Scanning {}...", root.display()));
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            // Chat files are taken as given; only the candidate pool
            // expands directories.
            let chat: Vec<PathBuf> = chat_file.iter().map(|p| absolutize(&cwd, p)).collect();
            let specs = if other_file.is_empty() { paths } else { other_file };
            let mut other: Vec<PathBuf> = Vec::new();
            for spec in specs {
                other.extend(expand_path_spec(&cwd, spec));
            }

            if let Some(pb) = spinner {
                pb.finish_with_message(format!("Scanned {} files", other.len()));
            }

            let counter = TiktokenCounter::new().into_diagnostic()?;
            let mut mapper =
                RepoMapper::new(&root, config, Box::new(counter), Arc::new(ConsoleSink))
                    .with_verbose(cli.verbose)
                    .with_force_refresh(force_refresh);

            let mentioned_fnames: BTreeSet<String> = mentioned_file.iter().cloned().collect();
            let mentioned_idents: BTreeSet<String> = mentioned_ident.iter().cloned().collect();
            let (map, report) =
                mapper.generate_map(&chat, &other, &mentioned_fnames, &mentioned_idents);

            match format {
                OutputFormat::Json => {
                    let json = serde_json::json!({ "map": map, "report": report });
                    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
                }
                OutputFormat::Text => match map {
                    Some(map) => println!("{map}"),
                    None => {
                        println!("No repository map generated.");
                        if cli.verbose {
                            println!(
                                "File report: {} files considered, {} definitions, {} references",
                                report.total_files_considered,
                                report.definition_matches,
                                report.reference_matches,
                            );
                        }
                    }
                },
            }
        }
        Some(Command::Search {
            ref query,
            ref root,
            max_results,
            context_lines,
            defs_only,
            refs_only,
            format,
        }) => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            let root = absolutize(&cwd, root);

            let options = SearchOptions {
                max_results,
                context_lines,
                include_definitions: !refs_only,
                include_references: !defs_only,
            };

            // Search never counts tokens, so skip loading the tokenizer.
            let mut mapper =
                RepoMapper::new(&root, config, Box::new(CharCounter), Arc::new(ConsoleSink));
            let results = mapper.search(query, &options).into_diagnostic()?;

            match format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&results).into_diagnostic()?
                    );
                }
                OutputFormat::Text => {
                    if results.is_empty() {
                        println!("No results found.");
                    } else {
                        for (i, r) in results.iter().enumerate() {
                            let kind = match r.kind {
                                TagKind::Def => "def",
                                TagKind::Ref => "ref",
                            };
                            println!("{}. {}:{} {} ({kind})", i + 1, r.file, r.line, r.name);
                            for line in r.context.lines() {
                                println!("  {line}");
                            }
                            println!();
                        }
                    }
                }
            }
        }
        Some(Command::Mcp { ref path }) => {
            carto_mcp::server::run_server(path.clone())
                .await
                .into_diagnostic()?;
        }
        Some(Command::Init { force }) => {
            let path = Path::new(".carto.toml");
            if path.exists() && !force {
                miette::bail!(".carto.toml already exists (pass --force to overwrite)");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .carto.toml with default configuration");
        }
        Some(Command::Doctor { format }) => {
            run_doctor(&config, format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "carto", &mut std::io::stdout());
        }
    }

    Ok(())
}
