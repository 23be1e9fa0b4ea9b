//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Facility definition
    #[serde(default)]
    pub facility: RawFacilityConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: XDG runtime dir)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// How often the maintenance sweep (day rollover, expiry) runs
    pub sweep_interval_seconds: Option<u64>,
}

/// Facility definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFacilityConfig {
    /// Cabin numbers available for booking (default: [1, 2])
    pub cabins: Option<Vec<u8>>,

    /// How long an idle booking dialogue is kept before being dropped
    pub dialog_ttl_seconds: Option<u64>,
}
