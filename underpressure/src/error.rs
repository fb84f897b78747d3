//! Error types for the simulation core.

use thiserror::Error;

/// Errors raised while setting up a simulation.
///
/// Everything after construction is total: positions clamp, unknown keys
/// fall back, so there is nothing to fail on a per-frame basis.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A geometric or material parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A fluid was built with a non-positive or non-finite density.
    #[error("invalid fluid: {0}")]
    InvalidFluid(String),
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
