//! Tollgate error types

use crate::types::PlanTier;

/// Tollgate error types.
///
/// Quota exhaustion is deliberately absent: it is a normal outcome reported
/// through [`Decision::Denied`](crate::Decision::Denied), not a fault.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Caller errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("this feature requires the {required} plan or higher (current: {current})")]
    PlanRequired {
        required: PlanTier,
        current: PlanTier,
    },
}

impl GateError {
    /// Whether retrying the same call could succeed.
    ///
    /// Always `false`: every variant describes a problem with the call or the
    /// gate's configuration, and retry policy belongs to the caller anyway.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for Tollgate operations
pub type Result<T> = std::result::Result<T, GateError>;
