//! `lectern config` — Configuration management commands.

use std::path::{Path, PathBuf};

use lectern_config::EngineConfig;

/// Load the effective configuration: an explicit file or the default path,
/// with `LECTERN_*` overrides applied either way.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = EngineConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => EngineConfig::load()?,
    };
    Ok(config)
}

fn config_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| EngineConfig::config_dir().join("config.toml"))
}

pub async fn show(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(path.as_deref()).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(path);
    if write_default(&path, force)? {
        println!("Wrote default config to {}", path.display());
    } else {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

pub async fn path(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path(path).display());
    Ok(())
}

/// Write the default config to `path`. Returns false if a file was already there.
fn write_default(path: &Path, force: bool) -> Result<bool, Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, EngineConfig::default_toml())?;
    tracing::info!(path = %path.display(), "Wrote default config");
    Ok(true)
}
