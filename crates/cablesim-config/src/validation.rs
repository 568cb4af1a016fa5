// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every violation is collected so a bad file is reported in one pass.

use crate::{CablesimConfig, ConfigError, ConfigResult, CvPolicyKind};
use std::collections::HashSet;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotPositive { field: String, value: f64 },
    DuplicateIon { name: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} = {} must be positive", field, value)
            }
            Self::DuplicateIon { name } => {
                write!(f, "ion '{}' is configured more than once", name)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Positive capacitance, resistivity and temperature
/// - Policy parameters usable by the selected policy
/// - Unique, named ion species
/// - A non-zero label recursion limit
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &CablesimConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_cable(config, &mut errors);
    validate_discretization(config, &mut errors);
    validate_ions(config, &mut errors);

    if config.resolution.recursion_limit == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "resolution.recursion_limit".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

fn require_positive(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    // NaN fails this too
    if !(value > 0.0) {
        errors.push(ConfigValidationError::NotPositive {
            field: field.to_string(),
            value,
        });
    }
}

fn validate_cable(config: &CablesimConfig, errors: &mut Vec<ConfigValidationError>) {
    let cable = &config.cable;
    require_positive("cable.membrane_capacitance", cable.membrane_capacitance, errors);
    require_positive("cable.axial_resistivity", cable.axial_resistivity, errors);
    require_positive("cable.temperature_k", cable.temperature_k, errors);
    if !cable.init_membrane_potential.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "cable.init_membrane_potential".to_string(),
            reason: "must be finite".to_string(),
        });
    }
}

fn validate_discretization(config: &CablesimConfig, errors: &mut Vec<ConfigValidationError>) {
    let spec = &config.discretization;
    match spec.policy {
        CvPolicyKind::FixedPerBranch if spec.per_branch == 0 => {
            errors.push(ConfigValidationError::InvalidValue {
                field: "discretization.per_branch".to_string(),
                reason: "fixed-per-branch needs at least one CV per branch".to_string(),
            });
        }
        CvPolicyKind::MaxExtent => {
            require_positive("discretization.max_extent", spec.max_extent, errors);
        }
        _ => {}
    }
}

fn validate_ions(config: &CablesimConfig, errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();
    for ion in &config.ions {
        if ion.name.is_empty() {
            errors.push(ConfigValidationError::InvalidValue {
                field: "ions.name".to_string(),
                reason: "must not be empty".to_string(),
            });
        } else if !seen.insert(ion.name.as_str()) {
            errors.push(ConfigValidationError::DuplicateIon {
                name: ion.name.clone(),
            });
        }
        if ion.internal_concentration < 0.0 || ion.external_concentration < 0.0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("ions.{}", ion.name),
                reason: "concentrations must not be negative".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IonDefaults;

    #[test]
    fn test_default_config_is_valid() {
        let config = CablesimConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_non_positive_cable_values() {
        let mut config = CablesimConfig::default();
        config.cable.membrane_capacitance = 0.0;
        config.cable.axial_resistivity = -1.0;

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("cable.membrane_capacitance"));
                assert!(msg.contains("cable.axial_resistivity"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_policy_parameters() {
        let mut config = CablesimConfig::default();
        config.discretization.per_branch = 0;
        assert!(validate_config(&config).is_err());

        // per_branch is irrelevant for other policies
        config.discretization.policy = CvPolicyKind::Single;
        assert!(validate_config(&config).is_ok());

        config.discretization.policy = CvPolicyKind::MaxExtent;
        config.discretization.max_extent = f64::NAN;
        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("max_extent")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ions() {
        let mut config = CablesimConfig::default();
        config.ions.push(IonDefaults::new("na", 1, 1.0, 1.0, 0.0));

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("'na' is configured more than once"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_recursion_limit() {
        let mut config = CablesimConfig::default();
        config.resolution.recursion_limit = 0;
        assert!(validate_config(&config).is_err());
    }
}
