//! Configuration file commands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;

use cadence_infra::config::{config_path, default_config_toml};
use cadence_types::config::RuntimeConfig;

/// Print the effective configuration.
pub fn show(config: &RuntimeConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

/// Write the default configuration to `{data_dir}/config.toml`.
pub async fn init(data_dir: &Path, force: bool, json: bool) -> Result<()> {
    let path = config_path(data_dir);
    if !force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    tokio::fs::write(&path, default_config_toml())
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        println!("{}", serde_json::json!({ "path": path.display().to_string() }));
        return Ok(());
    }

    println!();
    println!("  {} Wrote {}", style("✓").green().bold(), style(path.display()).cyan());
    println!();
    Ok(())
}

/// Print where the configuration file lives.
pub fn path(data_dir: &Path, json: bool) -> Result<()> {
    let path = config_path(data_dir);
    if json {
        println!("{}", serde_json::json!({ "path": path.display().to_string() }));
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path(), false, true).await.unwrap();
        assert!(config_path(dir.path()).exists());

        assert!(init(dir.path(), false, true).await.is_err());
        init(dir.path(), true, true).await.unwrap();

        let written = std::fs::read_to_string(config_path(dir.path())).unwrap();
        assert!(cadence_infra::config::parse_runtime_config(&written).is_ok());
    }
}
