//! Config file location.
//!
//! Resolution order: `--config`, `$ROOMDROP_CONFIG`, then
//! `~/.config/roomdrop/config.json`.

use std::path::PathBuf;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ROOMDROP_CONFIG";

/// Returns the config file path to load.
pub fn config_file_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve(explicit, std::env::var_os(CONFIG_ENV).map(PathBuf::from), config_base_dir())
}

fn resolve(explicit: Option<PathBuf>, from_env: Option<PathBuf>, base: PathBuf) -> PathBuf {
    explicit
        .or(from_env)
        .unwrap_or_else(|| base.join("roomdrop").join("config.json"))
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}
