//! TOML-based configuration for the metrics resolver.
//!
//! Example configuration:
//! ```toml
//! [manifest]
//! path = "${MANTIS_HOME}/target/semantic_manifest.json"
//!
//! [pathfinder]
//! max_iterations = 100        # BFS hard cap
//! warn_on_exhaustion = true   # warn when the cap truncates a search
//!
//! [joins]
//! max_join_hops = 2
//!
//! [suggestions]
//! enabled = true
//! max_suggestions = 6
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub manifest: ManifestSettings,
    pub pathfinder: PathfinderSettings,
    pub joins: JoinSettings,
    pub suggestions: SuggestionSettings,
}

/// Where the CLI finds the manifest when `--manifest` is not given.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManifestSettings {
    /// Path to a JSON manifest (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl ManifestSettings {
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Bounds for graph searches.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathfinderSettings {
    /// Maximum BFS iterations before a search stops expanding.
    pub max_iterations: usize,

    /// Emit a warning when a search stops with nodes still in its frontier.
    pub warn_on_exhaustion: bool,
}

impl Default for PathfinderSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            warn_on_exhaustion: true,
        }
    }
}

/// Join path settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JoinSettings {
    /// Maximum number of joins in a path to a linkable element.
    pub max_join_hops: u32,
}

impl Default for JoinSettings {
    fn default() -> Self {
        Self { max_join_hops: 2 }
    }
}

/// "Did you mean" suggestions attached to issues.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SuggestionSettings {
    pub enabled: bool,
    pub max_suggestions: usize,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_suggestions: 6,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `MANTIS_METRICS_CONFIG`
    /// 2. `./mantis-metrics.toml`
    /// 3. `~/.config/mantis/metrics.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("MANTIS_METRICS_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("mantis-metrics.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("mantis").join("metrics.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.pathfinder.max_iterations == 0 {
            return Err(SettingsError::InvalidConfig(
                "pathfinder.max_iterations must be greater than 0".to_string(),
            ));
        }
        if self.joins.max_join_hops == 0 {
            return Err(SettingsError::InvalidConfig(
                "joins.max_join_hops must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("MANTIS_METRICS_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${MANTIS_METRICS_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${MANTIS_METRICS_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("MANTIS_METRICS_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("MANTIS_METRICS_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$MANTIS_METRICS_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("cost: $").unwrap(), "cost: $");
        env::remove_var("MANTIS_METRICS_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(name)) if name == "NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[pathfinder]
max_iterations = 250
warn_on_exhaustion = false

[joins]
max_join_hops = 3

[suggestions]
max_suggestions = 3
"#;

        let settings = Settings::from_toml(toml).unwrap();

        assert_eq!(settings.pathfinder.max_iterations, 250);
        assert!(!settings.pathfinder.warn_on_exhaustion);
        assert_eq!(settings.joins.max_join_hops, 3);
        assert!(settings.suggestions.enabled);
        assert_eq!(settings.suggestions.max_suggestions, 3);
        assert_eq!(settings.manifest.path, None);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.pathfinder.max_iterations, 100);
        assert!(settings.pathfinder.warn_on_exhaustion);
        assert_eq!(settings.joins.max_join_hops, 2);
        assert_eq!(settings.suggestions.max_suggestions, 6);
    }

    #[test]
    fn test_rejects_zero_bounds() {
        let err = Settings::from_toml("[pathfinder]\nmax_iterations = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(_)));

        let err = Settings::from_toml("[joins]\nmax_join_hops = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::from_file("/definitely/not/here/metrics.toml").unwrap_err();
        assert!(matches!(err, SettingsError::FileNotFound(_)));
    }
}
