//! Configuration validation errors.

use std::fmt;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when validating a sync configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A tunable is NaN or infinite.
    NonFinite { name: &'static str },

    /// A threshold, limit or time is negative.
    Negative { name: &'static str, value: f32 },

    /// A lerp speed lies outside `[0, 1]`.
    LerpSpeedOutOfRange { name: &'static str, value: f32 },

    /// Send rate must be strictly positive.
    InvalidSendRate { value: f32 },

    /// Fixed physics step must be strictly positive.
    InvalidFixedStep { value: f32 },

    /// Clock correction step must be non-zero.
    InvalidCorrectionStep,

    /// `send_rate * interpolation_back_time` needs more history than allowed.
    HistoryTooLarge { capacity: usize, max: usize },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { name } => write!(f, "{name} must be finite"),
            Self::Negative { name, value } => {
                write!(f, "{name} must be non-negative, got {value}")
            }
            Self::LerpSpeedOutOfRange { name, value } => {
                write!(f, "{name} must lie in [0, 1], got {value}")
            }
            Self::InvalidSendRate { value } => {
                write!(f, "send rate must be positive, got {value}")
            }
            Self::InvalidFixedStep { value } => {
                write!(f, "fixed step must be positive, got {value}")
            }
            Self::InvalidCorrectionStep => write!(f, "clock correction step must be non-zero"),
            Self::HistoryTooLarge { capacity, max } => {
                write!(f, "history capacity {capacity} exceeds maximum {max}")
            }
        }
    }
}

impl std::error::Error for SchemaError {}
