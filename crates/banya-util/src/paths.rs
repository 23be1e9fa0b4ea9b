//! Default paths for banyad components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/banyad/banyad.sock` or `/tmp/banyad-$USER/banyad.sock`
//! - Data: `$XDG_DATA_HOME/banyad` or `~/.local/share/banyad`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const BANYA_SOCKET_ENV: &str = "BANYA_SOCKET";

/// Environment variable for overriding the data directory
pub const BANYA_DATA_DIR_ENV: &str = "BANYA_DATA_DIR";

const SOCKET_FILENAME: &str = "banyad.sock";

const APP_DIR: &str = "banyad";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$BANYA_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/banyad/banyad.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/banyad-$USER/banyad.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(BANYA_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking the BANYA_SOCKET env var.
/// Used for default values in configs where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$BANYA_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/banyad` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/banyad` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(BANYA_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the default config file path:
/// `$XDG_CONFIG_HOME/banyad/config.toml` or `~/.config/banyad/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}

/// Get the data directory without checking the BANYA_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}
