// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for k8status
//!
//! All k8status data is stored under ~/.k8status/:
//! - ~/.k8status/config.json - user configuration
//! - ~/.k8status/log/ - rotated log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::status::{Expression, GroupKind};

/// Default time `wait` gives resources to settle
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Get the base k8status directory (~/.k8status/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".k8status"))
        .context("Could not determine home directory")
}

/// A status condition replacing the computed status of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusOverride {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub condition: String,
}

/// k8status configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Kubeconfig context used when `--context` is not given
    #[serde(default)]
    pub context: Option<String>,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_true")]
    pub use_cache: bool,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Extend the compiled-in REST mappings with API discovery
    #[serde(default)]
    pub discovery: bool,

    #[serde(default)]
    pub overrides: Vec<StatusOverride>,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            use_cache: true,
            timeout: DEFAULT_TIMEOUT,
            discovery: false,
            overrides: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.k8status/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Configured overrides, compiled
    pub fn override_expressions(&self) -> Result<HashMap<GroupKind, Expression>> {
        self.overrides
            .iter()
            .map(|o| {
                let expression = Expression::new(&o.condition);
                expression
                    .compile()
                    .with_context(|| format!("Invalid override for {}", o.kind))?;
                Ok((GroupKind::new(&o.group, &o.kind), expression))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.context.is_none());
        assert!(config.use_cache);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.use_cache);
        assert!(!config.discovery);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn test_config_deserialize_durations() {
        let json = r#"{"poll_interval": "500ms", "timeout": "2m", "use_cache": false}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(!config.use_cache);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = Config {
            context: Some("kind-airship".to_string()),
            overrides: vec![StatusOverride {
                group: "example.com".to_string(),
                kind: "Resource".to_string(),
                condition: r#"@.status.state=="stable""#.to_string(),
            }],
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.context.as_deref(), Some("kind-airship"));
        assert_eq!(loaded.overrides, config.overrides);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("absent.json")).unwrap();
        assert!(config.use_cache);
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_override_expressions() {
        let mut config = Config::default();
        config.overrides.push(StatusOverride {
            group: "example.com".to_string(),
            kind: "Resource".to_string(),
            condition: r#"@.status.state=="stable""#.to_string(),
        });
        let overrides = config.override_expressions().unwrap();
        assert!(overrides.contains_key(&GroupKind::new("example.com", "Resource")));

        config.overrides[0].condition = "@.status[".to_string();
        assert!(config.override_expressions().is_err());
    }
}
