use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::autosave::DEFAULT_QUIET_MS;
use crate::notify::DEFAULT_NOTIFICATION_CAPACITY;

pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Where documents live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    Sqlite {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Rest {
        url: String,
        api_key: String,
    },
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Sqlite { path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base for share links, e.g. `https://docs.example.com`
    pub origin: String,
    pub autosave_quiet_ms: u64,
    pub notification_capacity: usize,
    pub backend: Backend,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            autosave_quiet_ms: DEFAULT_QUIET_MS,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            backend: Backend::default(),
        }
    }
}

impl AppConfig {
    /// Config file if present, then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(origin) = var("INKPAD_ORIGIN") {
            self.origin = origin;
        }

        if let Some(value) = var("INKPAD_AUTOSAVE_MS") {
            self.autosave_quiet_ms = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "INKPAD_AUTOSAVE_MS",
                value,
            })?;
        }

        // Both are needed to switch to the hosted backend
        if let (Some(url), Some(api_key)) = (var("INKPAD_REST_URL"), var("INKPAD_REST_KEY")) {
            self.backend = Backend::Rest { url, api_key };
        }

        Ok(())
    }

    pub fn autosave_quiet(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_ms)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("inkpad").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.autosave_quiet(), Duration::from_millis(1000));
        assert_eq!(config.notification_capacity, 20);
        assert_eq!(config.backend, Backend::Sqlite { path: None });
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"origin": "https://docs.example.com"}"#).unwrap();
        assert_eq!(config.origin, "https://docs.example.com");
        assert_eq!(config.autosave_quiet_ms, 1000);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("INKPAD_AUTOSAVE_MS", "250"),
                ("INKPAD_REST_URL", "https://db.example.com"),
                ("INKPAD_REST_KEY", "anon"),
            ]))
            .unwrap();

        assert_eq!(config.autosave_quiet_ms, 250);
        assert_eq!(
            config.backend,
            Backend::Rest {
                url: "https://db.example.com".into(),
                api_key: "anon".into()
            }
        );

        let bad = AppConfig::default().apply_env(env(&[("INKPAD_AUTOSAVE_MS", "soon")]));
        assert!(matches!(bad, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_url_without_key_keeps_sqlite() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("INKPAD_REST_URL", "https://db.example.com")])).unwrap();
        assert_eq!(config.backend, Backend::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inkpad").join("config.json");

        let config = AppConfig {
            origin: "https://docs.example.com".into(),
            backend: Backend::Sqlite {
                path: Some(dir.path().join("docs.db")),
            },
            ..AppConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(AppConfig::from_file(&path).unwrap(), config);
    }
}
