//! Emperor configuration

use crate::error::{EmperorError, Result};
use crate::identity::KEYFILE_NAME;
use crate::publish::PublishOptions;
use crate::subscribe::PullOptions;
use nostr_client::{RelayConfig, TlsPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Relays used when nothing else is configured.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
];

/// Emperor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmperorConfig {
    /// Nostr relays to publish to and pull from
    pub relays: Vec<String>,
    /// Certificate policy for wss relays
    pub tls: TlsPolicy,
    pub connect_timeout_secs: u64,
    /// Wait between rejected writes
    pub retry_backoff_ms: u64,
    /// Wait after a publish is accepted
    pub publish_settle_secs: u64,
    /// Wait for relays to replay stored events when pulling
    pub subscribe_settle_secs: u64,
    /// Holds the key file; defaults to the platform data directory
    pub data_dir: Option<PathBuf>,
    /// Where pulled files land; defaults to the working directory
    pub download_dir: Option<PathBuf>,
}

impl Default for EmperorConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            tls: TlsPolicy::Verify,
            connect_timeout_secs: 10,
            retry_backoff_ms: 1000,
            publish_settle_secs: 1,
            subscribe_settle_secs: 10,
            data_dir: None,
            download_dir: None,
        }
    }
}

impl EmperorConfig {
    /// Load from `path`, or from the default location.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EmperorError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| EmperorError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EmperorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| EmperorError::Config("could not determine config directory".into()))?;
        Ok(config_dir.join("emperor").join("config.toml"))
    }

    /// Get data directory path
    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.data_dir {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| EmperorError::Config("could not determine data directory".into()))?;
        Ok(data_dir.join("emperor"))
    }

    pub fn keyfile_path(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(KEYFILE_NAME))
    }

    pub fn download_path(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            tls: self.tls,
        }
    }

    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            settle: Duration::from_secs(self.publish_settle_secs),
        }
    }

    pub fn pull_options(&self, output_dir: Option<PathBuf>) -> PullOptions {
        PullOptions {
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            settle: Duration::from_secs(self.subscribe_settle_secs),
            output_dir: output_dir.unwrap_or_else(|| self.download_path()),
        }
    }
}

/// Read a `relays.json` file: a JSON array of relay URLs.
pub fn load_relays_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EmperorError::Config(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| EmperorError::Config(format!("{}: expected a JSON array of URLs: {}", path.display(), e)))
}

/// Pick the relay list for this invocation.
///
/// Precedence: explicit `overrides`, then `relays_file`, then the config.
/// Entries are trimmed, blanks dropped and duplicates removed in order.
pub fn load_relay_endpoints(
    config: &EmperorConfig,
    relays_file: Option<&Path>,
    overrides: &[String],
) -> Result<Vec<String>> {
    let relays = if !overrides.is_empty() {
        overrides.to_vec()
    } else if let Some(path) = relays_file {
        load_relays_file(path)?
    } else {
        config.relays.clone()
    };

    let relays = normalize_relays(relays);
    if relays.is_empty() {
        return Err(EmperorError::Config("no relays configured".into()));
    }
    Ok(relays)
}

pub fn normalize_relays(relays: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    relays
        .into_iter()
        .map(|relay| relay.trim().to_string())
        .filter(|relay| !relay.is_empty())
        .filter(|relay| seen.insert(relay.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmperorConfig::default();
        assert_eq!(config.tls, TlsPolicy::Verify);
        assert_eq!(config.publish_options().settle, Duration::from_secs(1));
        assert_eq!(config.pull_options(None).settle, Duration::from_secs(10));
        assert_eq!(config.publish_options().retry_backoff, Duration::from_secs(1));
        assert!(!config.relays.is_empty());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EmperorConfig = toml::from_str(
            r#"
            relays = ["wss://relay.example.com"]
            tls = "insecure"
            subscribe_settle_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.relays, vec!["wss://relay.example.com".to_string()]);
        assert_eq!(config.tls, TlsPolicy::Insecure);
        assert_eq!(config.subscribe_settle_secs, 3);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.relay_config().tls, TlsPolicy::Insecure);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emperor").join("config.toml");
        let config = EmperorConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = EmperorConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.keyfile_path().unwrap(), dir.path().join(KEYFILE_NAME));
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EmperorConfig::load(Some(&dir.path().join("missing.toml"))),
            Err(EmperorError::Config(_))
        ));
    }

    #[test]
    fn test_relay_precedence_and_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let relays_file = dir.path().join("relays.json");
        std::fs::write(
            &relays_file,
            r#"["wss://a.example", " wss://b.example ", "", "wss://a.example"]"#,
        )
        .unwrap();
        let config = EmperorConfig::default();

        assert_eq!(
            load_relay_endpoints(&config, Some(&relays_file), &[]).unwrap(),
            vec!["wss://a.example".to_string(), "wss://b.example".to_string()]
        );
        assert_eq!(
            load_relay_endpoints(&config, Some(&relays_file), &["ws://c".to_string()]).unwrap(),
            vec!["ws://c".to_string()]
        );
        assert_eq!(
            load_relay_endpoints(&config, None, &[]).unwrap(),
            config.relays
        );
    }

    #[test]
    fn test_no_relays_is_error() {
        let config = EmperorConfig {
            relays: vec!["  ".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            load_relay_endpoints(&config, None, &[]),
            Err(EmperorError::Config(_))
        ));
    }

    #[test]
    fn test_bad_relays_file() {
        let dir = tempfile::tempdir().unwrap();
        let relays_file = dir.path().join("relays.json");
        std::fs::write(&relays_file, r#"{"relays": []}"#).unwrap();
        assert!(load_relays_file(&relays_file).is_err());
    }
}
