//! Configuration parsing and validation for banyad
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Facility definition (cabin set)
//! - Service paths and maintenance intervals
//! - Validation with clear error messages

mod facility;
mod schema;
mod validation;

pub use facility::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<FacilityConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<FacilityConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(FacilityConfig::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config = r#"
            config_version = 1
        "#;

        let facility = parse_config(config).unwrap();
        assert_eq!(
            facility.cabins.iter().map(|c| c.as_u8()).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [service]
            socket_path = "/tmp/banyad-test/banyad.sock"
            data_dir = "/tmp/banyad-test"
            sweep_interval_seconds = 15

            [facility]
            cabins = [1, 2]
            dialog_ttl_seconds = 300
        "#;

        let facility = parse_config(config).unwrap();
        assert_eq!(facility.cabins.len(), 2);
        assert_eq!(facility.dialog_ttl.as_secs(), 300);
        assert_eq!(facility.sweep_interval.as_secs(), 15);
        assert_eq!(
            facility.service.data_dir.to_string_lossy(),
            "/tmp/banyad-test"
        );
    }

    #[test]
    fn reject_wrong_version() {
        let config = r#"
            config_version = 99
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_duplicate_cabins() {
        let config = r#"
            config_version = 1

            [facility]
            cabins = [1, 1]
        "#;

        assert!(matches!(
            parse_config(config),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }
}
