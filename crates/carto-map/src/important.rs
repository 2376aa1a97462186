//! Detection of project files worth keeping in a map even though they
//! produce no symbol tags (READMEs, manifests, CI configs, licenses).

use std::path::{Path, PathBuf};

const IMPORTANT_FILENAMES: &[&str] = &[
    "README.md",
    "README.txt",
    "readme.md",
    "README.rst",
    "README",
    "requirements.txt",
    "Pipfile",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "package.json",
    "yarn.lock",
    "package-lock.json",
    "npm-shrinkwrap.json",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    ".gitignore",
    ".gitattributes",
    ".dockerignore",
    "Makefile",
    "makefile",
    "CMakeLists.txt",
    "LICENSE",
    "LICENSE.txt",
    "LICENSE.md",
    "COPYING",
    "CHANGELOG.md",
    "CHANGELOG.txt",
    "HISTORY.md",
    "CONTRIBUTING.md",
    "CODE_OF_CONDUCT.md",
    ".env",
    ".env.example",
    ".env.local",
    "tox.ini",
    "pytest.ini",
    ".pytest.ini",
    ".flake8",
    ".pylintrc",
    "mypy.ini",
    "go.mod",
    "go.sum",
    "Cargo.toml",
    "Cargo.lock",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "composer.json",
    "composer.lock",
    "Gemfile",
    "Gemfile.lock",
];

fn important_in_dir(dir: &str, file_name: &str) -> bool {
    match dir {
        ".github/workflows" => file_name.ends_with(".yml") || file_name.ends_with(".yaml"),
        ".github" => {
            file_name.ends_with(".md")
                || file_name.ends_with(".yml")
                || file_name.ends_with(".yaml")
        }
        "docs" => {
            file_name.ends_with(".md")
                || file_name.ends_with(".rst")
                || file_name.ends_with(".txt")
        }
        _ => false,
    }
}

/// Whether `rel_path` names a file that should survive filtering despite
/// having no extractable symbols.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use carto_map::important::is_important;
///
/// assert!(is_important(Path::new("README.md")));
/// assert!(is_important(Path::new(".github/workflows/ci.yml")));
/// assert!(!is_important(Path::new("src/main.rs")));
/// ```
pub fn is_important(rel_path: &Path) -> bool {
    let file_name = rel_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let dir = rel_path.parent().and_then(|p| p.to_str()).unwrap_or("");

    if important_in_dir(dir, file_name) {
        return true;
    }
    IMPORTANT_FILENAMES.contains(&file_name)
}

/// Keep only the important entries of `paths`, preserving order.
pub fn filter_important_files<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| is_important(p))
        .map(Path::to_path_buf)
        .collect()
}
