//! Engine configuration.
//!
//! Settings are read once when an [`Engine`](crate::Engine) is built and are
//! immutable afterwards. A configuration file is optional; missing fields fall
//! back to their defaults.

use std::{env, fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use stencil_util::expand_tilde;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "STENCIL_CONFIG_PATH";
/// Environment variable overriding [`EngineConfig::unrestricted_async_values`].
pub const UNRESTRICTED_ASYNC_ENV: &str = "STENCIL_UNRESTRICTED_ASYNC";

/// Rendering and evaluation settings shared by every render of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Text emitted for expressions that resolve to the not-found sentinel.
    pub missing_value: String,
    /// When set, a not-found result fails the render instead of emitting `missing_value`.
    pub strict_rendering: bool,
    /// Whether futures handed over as foreign values are awaited.
    ///
    /// When disabled such values fail the render with
    /// [`ResolutionError::ForeignAsyncValue`](crate::ResolutionError::ForeignAsyncValue).
    pub unrestricted_async_values: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            missing_value: String::new(),
            strict_rendering: false,
            unrestricted_async_values: false,
        }
    }
}

impl EngineConfig {
    /// Defaults plus environment overrides; used when a builder is given no configuration.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads the configuration from [`default_config_path`].
    pub fn load() -> Result<Self> {
        Self::load_from_path(&default_config_path())
    }

    /// Loads the configuration from a JSON or YAML file.
    ///
    /// A missing file yields the defaults. Environment overrides are applied last.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::from_env());
        }
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read engine config: {}", path.display()))?;
        let is_json = path.extension().is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_str(&content).with_context(|| format!("Invalid engine config: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content).with_context(|| format!("Invalid engine config: {}", path.display()))?
        };
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = env::var(UNRESTRICTED_ASYNC_ENV) {
            let raw = raw.trim().to_ascii_lowercase();
            self.unrestricted_async_values = raw == "1" || raw == "true";
        }
        self
    }
}

/// Get the default path for the engine configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stencil")
        .join("engine.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        temp_env::with_var_unset(UNRESTRICTED_ASYNC_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let config = EngineConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
            assert_eq!(config, EngineConfig::default());
        });
    }

    #[test]
    fn loads_partial_json_file() {
        temp_env::with_var_unset(UNRESTRICTED_ASYNC_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("engine.json");
            fs::write(&path, r#"{"missingValue": "N/A", "strictRendering": true}"#).unwrap();
            let config = EngineConfig::load_from_path(&path).unwrap();
            assert_eq!(config.missing_value, "N/A");
            assert!(config.strict_rendering);
            assert!(!config.unrestricted_async_values);
        });
    }

    #[test]
    fn loads_yaml_file_and_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "missingValue: '?'\n").unwrap();
        assert_eq!(EngineConfig::load_from_path(&path).unwrap().missing_value, "?");

        fs::write(&path, "missingValues: '?'\n").unwrap();
        assert!(EngineConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn env_override_enables_unrestricted_async_values() {
        temp_env::with_var(UNRESTRICTED_ASYNC_ENV, Some("TRUE"), || {
            assert!(EngineConfig::from_env().unrestricted_async_values);
        });
        temp_env::with_var(UNRESTRICTED_ASYNC_ENV, Some("0"), || {
            assert!(!EngineConfig::from_env().unrestricted_async_values);
        });
    }

    #[test]
    fn config_path_env_wins() {
        temp_env::with_var(CONFIG_PATH_ENV, Some("/tmp/stencil-test/engine.yaml"), || {
            assert_eq!(default_config_path(), PathBuf::from("/tmp/stencil-test/engine.yaml"));
        });
    }
}
