//! Centralized path resolution for restsync
//!
//! Makes it easy to keep device and resource declarations in a dotfiles or
//! infrastructure repository and point restsync at them.
//!
//! # Environment Variables
//!
//! - `RESTSYNC_CONFIG_DIR` - Override config directory (e.g., `~/infra/restsync`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `RESTSYNC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/restsync` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\restsync`
//!    - macOS/Linux: `~/.config/restsync`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "RESTSYNC_CONFIG_DIR";

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "restsync.toml";

/// Get the restsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("restsync");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("restsync");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("restsync");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Config file to load: the `--config` override, else the default location
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(config_dir()?.join(CONFIG_FILE)),
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// Uses env::set_var/remove_var; only call from tests that own the
    /// variable they touch.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: no other test reads this variable
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/restsync", || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/restsync"));
            assert_eq!(
                config_file(None).unwrap(),
                PathBuf::from("/custom/restsync/restsync.toml")
            );
        });
    }

    #[test]
    fn test_explicit_config_file_wins() {
        let path = config_file(Some(Path::new("/etc/restsync/fw.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/etc/restsync/fw.toml"));
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/infra/restsync.toml");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("infra").join("restsync.toml"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_RESTSYNC_VAR/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_RESTSYNC_VAR/file"));
    }
}
