//! Runtime configuration loader for Cadence.
//!
//! Reads `config.toml` from the data directory (`~/.cadence/` in production)
//! and deserializes it into [`RuntimeConfig`]. A missing file yields the
//! defaults; a file that exists but cannot be read or parsed is an error,
//! since silently running with different eviction or scheduling settings
//! than the operator asked for is worse than refusing to start.

use std::path::{Path, PathBuf};

use cadence_types::config::RuntimeConfig;
use cadence_types::error::ConfigError;

/// File name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Path of the configuration file for `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load runtime configuration from `{data_dir}/config.toml`.
pub async fn load_runtime_config(data_dir: &Path) -> Result<RuntimeConfig, ConfigError> {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return Ok(RuntimeConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    parse_runtime_config(&content).map_err(|message| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    })
}

/// Parse configuration text.
pub fn parse_runtime_config(content: &str) -> Result<RuntimeConfig, String> {
    toml::from_str::<RuntimeConfig>(content).map_err(|err| err.to_string())
}

/// Render the defaults as TOML, for `cadence config` style bootstrapping.
pub fn default_config_toml() -> String {
    toml::to_string_pretty(&RuntimeConfig::default()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_runtime_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_runtime_config(tmp.path()).await.unwrap();
        assert_eq!(config.memory.max_entries, 10_000);
        assert!(config.schedules.is_empty());
    }

    #[tokio::test]
    async fn load_runtime_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            config_path(tmp.path()),
            r#"
[log]
format = "json"

[memory]
retention_days = 14
access_weight = 0.25

[scheduler]
tick_secs = 5

[skills.note]
enabled = false

[[schedules]]
skill = "ping"
interval_secs = 300
max_runs = 12
"#,
        )
        .await
        .unwrap();

        let config = load_runtime_config(tmp.path()).await.unwrap();
        assert_eq!(config.memory.retention_days, 14);
        assert_eq!(config.memory.access_weight, 0.25);
        assert_eq!(config.scheduler.tick_secs, 5);
        assert!(!config.skills["note"].enabled);
        assert_eq!(config.schedules[0].max_runs, Some(12));
    }

    #[tokio::test]
    async fn load_runtime_config_invalid_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(config_path(tmp.path()), "this is not { valid toml !!!")
            .await
            .unwrap();

        let err = load_runtime_config(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[tokio::test]
    async fn load_runtime_config_unknown_key_is_an_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(config_path(tmp.path()), "[manager]\nqueue_size = 3\n")
            .await
            .unwrap();

        assert!(load_runtime_config(tmp.path()).await.is_err());
    }

    #[test]
    fn default_config_round_trips() {
        let rendered = default_config_toml();
        let parsed = parse_runtime_config(&rendered).unwrap();
        assert_eq!(parsed.memory, RuntimeConfig::default().memory);
        assert_eq!(parsed.manager, RuntimeConfig::default().manager);
    }
}
