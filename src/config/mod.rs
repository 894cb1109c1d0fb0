mod settings;

pub use settings::{BusinessSettings, Config, RemoteSettings, StorageSettings};

use crate::error::{LedgerError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (XDG-style, falling back to ~/.routebook/)
pub fn config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "routebook") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    let home = dirs_home().ok_or_else(|| {
        LedgerError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".routebook"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand ~ in paths
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve the local data directory; relative paths are taken from the config dir
pub fn resolve_data_dir(data_dir: &str, cfg_dir: &Path) -> PathBuf {
    let path = expand_path(data_dir);
    if path.is_absolute() {
        path
    } else {
        cfg_dir.join(path)
    }
}

/// Load the main config.toml
pub fn load_config(cfg_dir: &Path) -> Result<Config> {
    if !cfg_dir.exists() {
        return Err(LedgerError::ConfigNotFound(cfg_dir.to_path_buf()));
    }
    let path = cfg_dir.join("config.toml");
    if !path.exists() {
        return Err(LedgerError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| LedgerError::ConfigParse { path, source: e })
}

/// Create the config directory with a template config.toml
pub fn init_config_dir(cfg_dir: &Path) -> Result<()> {
    if cfg_dir.exists() {
        return Err(LedgerError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }
    fs::create_dir_all(cfg_dir.join("data"))?;
    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;
    Ok(())
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[business]
name = "Your Dairy"
currency_symbol = "₹"

[storage]
# Local record store, used when no [remote] section is present.
# Relative paths are resolved against this config directory.
data_dir = "data"

# Uncomment to keep records in a hosted REST table service instead.
# [remote]
# url = "https://your-project.example.co"
# api_key = "service-role-key"
# timeout_secs = 10
"#;
