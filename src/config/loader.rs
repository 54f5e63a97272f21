// Configuration loader
// Reads ~/.wren/config.toml when present, falls back to defaults otherwise.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::settings::Config;

/// Environment override for the registry file location. Primarily for tests
/// and for running several isolated meshes on one machine.
pub const REGISTRY_PATH_ENV: &str = "WREN_REGISTRY_PATH";

/// Load configuration from the config file or defaults, then apply
/// environment overrides and validate.
pub fn load_config() -> Result<Config> {
    let mut config = match config_path()? {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Ok(path) = std::env::var(REGISTRY_PATH_ENV) {
        if !path.is_empty() {
            config.registry.path = Some(PathBuf::from(path));
        }
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Path of the config file, or None when it does not exist.
fn config_path() -> Result<Option<PathBuf>> {
    let home = dirs::home_dir().context("Cannot determine home directory")?;
    let path = home.join(".wren").join("config.toml");
    Ok(path.exists().then_some(path))
}
