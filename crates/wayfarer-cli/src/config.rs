//! Engine config file management.
//!
//! TOML config at `~/.config/wayfarer/config.toml` with a resolution
//! chain: CLI flag > `WAYFARER_CONFIG` env var > default path > built-in
//! defaults. A missing file is not an error; a file that exists but does
//! not parse is.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use wayfarer_core::config::EngineConfig;

/// Return the wayfarer config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/wayfarer` or
/// `~/.config/wayfarer`, even on platforms where `dirs::config_dir()`
/// points elsewhere.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("wayfarer");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("wayfarer")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Resolve the engine config: explicit flag, then env var, then the
/// default path, then built-in defaults.
pub fn resolve(flag: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = flag {
        return load(path);
    }
    if let Ok(env_path) = std::env::var("WAYFARER_CONFIG") {
        return load(Path::new(&env_path));
    }
    let default = config_path();
    if default.exists() {
        return load(&default);
    }
    Ok(EngineConfig::default())
}

fn load(path: &Path) -> Result<EngineConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    EngineConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Write a default config file, refusing to clobber unless forced.
pub fn init(force: bool) -> Result<()> {
    let path = config_path();
    if path.exists() && !force {
        bail!(
            "config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = EngineConfig::default()
        .to_toml_string()
        .context("failed to serialize default config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    println!("wrote {}", path.display());
    Ok(())
}
