// src/error.rs
use thiserror::Error;

/// Error types for the fast-qmc pricing kernel
///
/// Every variant is fatal for the run that produced it: the kernel either
/// returns a complete price vector or one of these.
#[derive(Debug, Clone, Error)]
pub enum SdeError {
    /// Invalid parameter values
    #[error("Invalid parameter '{parameter}' = {value}: {constraint}")]
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Shape, parity or range violation in the kernel inputs
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Contract identifier outside the supported set
    #[error("Unknown contract identifier {id} (supported: 1, 2, 3)")]
    UnknownContract { id: i32 },

    /// Numerical overflow or non-finite result
    #[error("Numerical instability in {method}: {reason}")]
    NumericalInstability { method: String, reason: String },

    /// Worker pool or chunk scheduling invariant violated
    #[error("Scheduling error: {reason}")]
    SchedulingError { reason: String },
}

/// Result type alias for fast-qmc operations
pub type SdeResult<T> = Result<T, SdeError>;

/// Validation utilities
pub mod validation {
    use super::{SdeError, SdeResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> SdeResult<()> {
        if value <= 0.0 {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> SdeResult<()> {
        if !value.is_finite() {
            Err(SdeError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that every entry of a slice is finite
    pub fn validate_all_finite(name: &str, values: &[f64]) -> SdeResult<()> {
        match values.iter().position(|v| !v.is_finite()) {
            Some(i) => validate_finite(&format!("{}[{}]", name, i), values[i]),
            None => Ok(()),
        }
    }

    /// Validate a count that must be at least one
    pub fn validate_count(field: &str, count: usize) -> SdeResult<()> {
        if count == 0 {
            Err(SdeError::InvalidConfiguration {
                field: field.to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else {
            Ok(())
        }
    }

    pub fn validate_power_of_two(field: &str, value: usize) -> SdeResult<()> {
        if !value.is_power_of_two() {
            Err(SdeError::InvalidConfiguration {
                field: field.to_string(),
                reason: format!("{} is not a power of two", value),
            })
        } else {
            Ok(())
        }
    }

    /// Validate the length of a flattened array against its expected shape
    pub fn validate_len(field: &str, actual: usize, expected: usize) -> SdeResult<()> {
        if actual != expected {
            Err(SdeError::InvalidConfiguration {
                field: field.to_string(),
                reason: format!("expected {} elements, found {}", expected, actual),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a shape dimension matches what a contract requires
    pub fn validate_dim(field: &str, actual: usize, expected: usize) -> SdeResult<()> {
        if actual != expected {
            Err(SdeError::InvalidConfiguration {
                field: field.to_string(),
                reason: format!("must be {}, found {}", expected, actual),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a shape dimension is at least `min`
    pub fn validate_min(field: &str, actual: usize, min: usize) -> SdeResult<()> {
        if actual < min {
            Err(SdeError::InvalidConfiguration {
                field: field.to_string(),
                reason: format!("must be at least {}, found {}", min, actual),
            })
        } else {
            Ok(())
        }
    }
}
