//! Validated facility configuration ready for use by the core engine

use crate::schema::{RawConfig, RawServiceConfig};
use banya_api::CabinNumber;
use banya_util::{data_dir_without_env, socket_path_without_env};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CABINS: [u8; 2] = [1, 2];
const DEFAULT_DIALOG_TTL: Duration = Duration::from_secs(600);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Validated configuration
#[derive(Debug, Clone)]
pub struct FacilityConfig {
    /// Service paths and intervals
    pub service: ServiceConfig,

    /// Bookable cabin numbers, ascending. Assignment always takes the
    /// lowest-numbered free cabin first.
    pub cabins: Vec<CabinNumber>,

    /// TTL for idle booking dialogues
    pub dialog_ttl: Duration,

    /// How often day rollover and expiry are checked in the background
    pub sweep_interval: Duration,
}

impl FacilityConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let mut cabins: Vec<u8> = raw
            .facility
            .cabins
            .unwrap_or_else(|| DEFAULT_CABINS.to_vec());
        cabins.sort_unstable();

        let dialog_ttl = raw
            .facility
            .dialog_ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DIALOG_TTL);

        let sweep_interval = raw
            .service
            .sweep_interval_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);

        Self {
            service: ServiceConfig::from_raw(raw.service),
            cabins: cabins.into_iter().map(CabinNumber::new).collect(),
            dialog_ttl,
            sweep_interval,
        }
    }
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            cabins: DEFAULT_CABINS.iter().copied().map(CabinNumber::new).collect(),
            dialog_ttl: DEFAULT_DIALOG_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(socket_path_without_env),
            data_dir: raw.data_dir.unwrap_or_else(data_dir_without_env),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: socket_path_without_env(),
            data_dir: data_dir_without_env(),
        }
    }
}
