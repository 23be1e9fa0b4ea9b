//! Configuration validation

use crate::schema::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Facility error: {0}")]
    FacilityError(String),

    #[error("Duplicate cabin number: {0}")]
    DuplicateCabin(u8),

    #[error("Service error: {0}")]
    ServiceError(String),
}

/// Maximum cabins a facility may declare. The availability rule is a
/// closed-form check over the whole slot occupancy, so the set stays small.
pub const MAX_CABINS: usize = 8;

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(cabins) = &config.facility.cabins {
        if cabins.is_empty() {
            errors.push(ValidationError::FacilityError(
                "cabin set cannot be empty".into(),
            ));
        }
        if cabins.len() > MAX_CABINS {
            errors.push(ValidationError::FacilityError(format!(
                "at most {} cabins supported, got {}",
                MAX_CABINS,
                cabins.len()
            )));
        }

        let mut seen = HashSet::new();
        for cabin in cabins {
            if *cabin == 0 {
                errors.push(ValidationError::FacilityError(
                    "cabin numbers start at 1".into(),
                ));
            }
            if !seen.insert(*cabin) {
                errors.push(ValidationError::DuplicateCabin(*cabin));
            }
        }
    }

    if config.facility.dialog_ttl_seconds == Some(0) {
        errors.push(ValidationError::FacilityError(
            "dialog_ttl_seconds must be positive".into(),
        ));
    }

    if config.service.sweep_interval_seconds == Some(0) {
        errors.push(ValidationError::ServiceError(
            "sweep_interval_seconds must be positive".into(),
        ));
    }

    errors
}
