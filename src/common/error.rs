//! Error types for highway_planner

use thiserror::Error;

/// Main error type for the planning pipeline
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Malformed or missing telemetry field
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),
    /// Invalid configuration parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Numerical computation failed (linear system solve, etc.)
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// Track map could not be built
    #[error("Invalid track: {0}")]
    InvalidTrack(String),
    /// Behavior layer produced no candidate. Keep-lane is always generated,
    /// so this is a logic bug rather than a runtime condition.
    #[error("No viable candidate was generated")]
    NoViableCandidate,
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

impl PlannerError {
    /// Whether the caller may hold its previous trajectory and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlannerError::InvalidObservation(_) | PlannerError::NumericalError(_)
        )
    }
}

/// Result type alias for planning operations
pub type PlannerResult<T> = Result<T, PlannerError>;
