use std::io::Read;
use std::path::{Path, PathBuf};

use carto_core::Result;

use crate::important::is_important;

/// Maximum file size to process (1 MiB).
pub const MAX_FILE_SIZE: u64 = 1_048_576;

/// Number of bytes to inspect for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Directories never worth descending into even without a `.gitignore`.
const SKIP_DIRS: &[&str] = &["node_modules", "__pycache__", "target", "venv", "env"];

/// A file discovered during repository walking.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use carto_map::walker::{Language, SourceFile};
///
/// let file = SourceFile {
///     path: PathBuf::from("/repo/src/main.rs"),
///     rel_path: PathBuf::from("src/main.rs"),
///     language: Language::Rust,
/// };
/// assert_eq!(file.language, Language::Rust);
/// ```
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the walk root.
    pub rel_path: PathBuf,
    /// Detected language. [`Language::Unknown`] for important extras such
    /// as READMEs, which participate in maps as tagless files.
    pub language: Language,
}

/// Programming language detected from file extension.
///
/// # Examples
///
/// ```
/// use carto_map::walker::Language;
///
/// assert_eq!(Language::from_extension("rs"), Language::Rust);
/// assert_eq!(Language::from_extension("py"), Language::Python);
/// assert_eq!(Language::from_extension("kt"), Language::Kotlin);
/// assert_eq!(Language::from_extension("txt"), Language::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Php,
    Kotlin,
    Swift,
    Unknown,
}

impl Language {
    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "rs" => Language::Rust,
            "py" => Language::Python,
            "ts" | "tsx" => Language::TypeScript,
            "js" | "jsx" => Language::JavaScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Language::Cpp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            _ => Language::Unknown,
        }
    }

    /// Detect language from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Language::Unknown, Language::from_extension)
    }

    /// The tree-sitter grammar for this language, `None` for
    /// [`Language::Unknown`].
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::C => Some(tree_sitter_c::LANGUAGE.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
            Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }
}

/// Whether the first 8 KiB of the file contain a NUL byte.
fn looks_binary(path: &Path) -> bool {
    let Ok(mut file) = std::fs::File::open(path) else {
        return true;
    };
    let mut buf = [0u8; BINARY_CHECK_SIZE];
    let Ok(n) = file.read(&mut buf) else {
        return true;
    };
    buf[..n].contains(&0)
}

/// Walk a repository, respecting `.gitignore`, returning mappable files.
///
/// Keeps files with a recognized language plus important extras (READMEs,
/// manifests, CI configs) so they can participate in maps as tagless files.
/// Skips hidden entries, common dependency and build directories, binary
/// files, and files larger than 1 MiB. Results come back sorted by relative
/// path so walks are deterministic across runs.
///
/// # Errors
///
/// Returns [`carto_core::CartoError::FileNotFound`] if `root` does not
/// exist.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use carto_map::walker::walk_repo;
///
/// let files = walk_repo(Path::new(".")).unwrap();
/// for f in &files {
///     println!("{}: {:?}", f.rel_path.display(), f.language);
/// }
/// ```
pub fn walk_repo(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        return Err(carto_core::CartoError::FileNotFound(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|t| t.is_dir()) && SKIP_DIRS.contains(&name.as_ref()))
        })
        .build();
    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.len() > MAX_FILE_SIZE {
            continue;
        }

        let rel_path = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };

        let language = Language::from_path(path);
        if language == Language::Unknown && !is_important(&rel_path) {
            continue;
        }

        if looks_binary(path) {
            continue;
        }

        files.push(SourceFile {
            path: path.to_path_buf(),
            rel_path,
            language,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}
