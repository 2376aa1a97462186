use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CartoError;

/// Top-level configuration loaded from `.carto.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use carto_core::CartoConfig;
///
/// let config = CartoConfig::default();
/// assert_eq!(config.map.map_tokens, 8192);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartoConfig {
    /// Map generation settings.
    #[serde(default)]
    pub map: MapConfig,
    /// Score boost weights and thresholds.
    #[serde(default)]
    pub boosts: BoostConfig,
    /// Tag cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl CartoConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::Io`] if the file cannot be read, or
    /// [`CartoError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use carto_core::CartoConfig;
    /// use std::path::Path;
    ///
    /// let config = CartoConfig::from_file(Path::new(".carto.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, CartoError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CartoError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use carto_core::CartoConfig;
    ///
    /// let toml = r#"
    /// [map]
    /// map_tokens = 2048
    /// "#;
    /// let config = CartoConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.map.map_tokens, 2048);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CartoError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Map generation configuration.
///
/// # Examples
///
/// ```
/// use carto_core::MapConfig;
///
/// let config = MapConfig::default();
/// assert_eq!(config.map_tokens, 8192);
/// assert_eq!(config.map_mul_no_files, 8);
/// assert!(!config.exclude_unranked);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Token budget for the rendered map (default: 8192).
    #[serde(default = "default_map_tokens")]
    pub map_tokens: usize,
    /// Budget multiplier applied when no priority files are given and a
    /// context window is configured (default: 8).
    #[serde(default = "default_map_mul_no_files")]
    pub map_mul_no_files: usize,
    /// Consumer context window size; caps the expanded budget.
    pub max_context_window: Option<usize>,
    /// Skip files with near-zero importance entirely (default: false).
    #[serde(default)]
    pub exclude_unranked: bool,
    /// Text prepended to the map. `{other}` expands to `"other "` when
    /// priority files are present.
    pub content_prefix: Option<String>,
}

fn default_map_tokens() -> usize {
    8192
}

fn default_map_mul_no_files() -> usize {
    8
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            map_tokens: default_map_tokens(),
            map_mul_no_files: default_map_mul_no_files(),
            max_context_window: None,
            exclude_unranked: false,
            content_prefix: None,
        }
    }
}

/// Multiplicative score boosts applied to definition tags, plus the
/// importance threshold used by `exclude_unranked`.
///
/// The weights are long-standing heuristics, kept configurable rather than
/// re-derived.
///
/// # Examples
///
/// ```
/// use carto_core::BoostConfig;
///
/// let boosts = BoostConfig::default();
/// assert_eq!(boosts.mentioned_ident, 10.0);
/// assert_eq!(boosts.mentioned_file, 5.0);
/// assert_eq!(boosts.priority_file, 20.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostConfig {
    /// Boost when the tag's identifier was explicitly mentioned (default: 10.0).
    #[serde(default = "default_mentioned_ident")]
    pub mentioned_ident: f64,
    /// Boost when the tag's file was explicitly mentioned (default: 5.0).
    #[serde(default = "default_mentioned_file")]
    pub mentioned_file: f64,
    /// Boost when the tag's file is in the priority set (default: 20.0).
    #[serde(default = "default_priority_file")]
    pub priority_file: f64,
    /// Importance at or below this is "near zero" for `exclude_unranked`
    /// (default: 1e-4).
    #[serde(default = "default_near_zero_epsilon")]
    pub near_zero_epsilon: f64,
}

fn default_mentioned_ident() -> f64 {
    10.0
}

fn default_mentioned_file() -> f64 {
    5.0
}

fn default_priority_file() -> f64 {
    20.0
}

fn default_near_zero_epsilon() -> f64 {
    1e-4
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            mentioned_ident: default_mentioned_ident(),
            mentioned_file: default_mentioned_file(),
            priority_file: default_priority_file(),
            near_zero_epsilon: default_near_zero_epsilon(),
        }
    }
}

/// Tag cache configuration.
///
/// # Examples
///
/// ```
/// use carto_core::CacheConfig;
///
/// let config = CacheConfig::default();
/// assert!(config.persistent);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist extracted tags under the repository root (default: true).
    /// When false the cache lives in memory only.
    #[serde(default = "default_persistent")]
    pub persistent: bool,
}

fn default_persistent() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistent: default_persistent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = CartoConfig::default();
        assert_eq!(config.map.map_tokens, 8192);
        assert_eq!(config.map.map_mul_no_files, 8);
        assert_eq!(config.map.max_context_window, None);
        assert!(!config.map.exclude_unranked);
        assert!(config.map.content_prefix.is_none());
        assert_eq!(config.boosts.mentioned_ident, 10.0);
        assert_eq!(config.boosts.mentioned_file, 5.0);
        assert_eq!(config.boosts.priority_file, 20.0);
        assert_eq!(config.boosts.near_zero_epsilon, 1e-4);
        assert!(config.cache.persistent);
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[map]
map_tokens = 2048
exclude_unranked = true
"#;
        let config = CartoConfig::from_toml(toml).unwrap();
        assert_eq!(config.map.map_tokens, 2048);
        assert!(config.map.exclude_unranked);
        assert_eq!(config.map.map_mul_no_files, 8);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[map]
map_tokens = 4096
map_mul_no_files = 4
max_context_window = 128000
content_prefix = "Here are summaries of some {other}files:\n"

[boosts]
mentioned_ident = 12.0
priority_file = 25.0

[cache]
persistent = false
"#;
        let config = CartoConfig::from_toml(toml).unwrap();
        assert_eq!(config.map.map_tokens, 4096);
        assert_eq!(config.map.map_mul_no_files, 4);
        assert_eq!(config.map.max_context_window, Some(128000));
        assert!(config.map.content_prefix.is_some());
        assert_eq!(config.boosts.mentioned_ident, 12.0);
        assert_eq!(config.boosts.mentioned_file, 5.0);
        assert_eq!(config.boosts.priority_file, 25.0);
        assert!(!config.cache.persistent);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = CartoConfig::from_toml("").unwrap();
        assert_eq!(config.map.map_tokens, 8192);
        assert!(config.cache.persistent);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = CartoConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }
}
