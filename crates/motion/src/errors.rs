//! Error types for the motion planning crate.

use thiserror::Error;

/// Represents errors that can occur during ramp generation or planning.
///
/// All variants map to the "invalid parameters" class: the command cannot be
/// turned into a pulse plan and the run must abort.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlannerError {
    #[error("target velocity must be positive, got {0} mm/min")]
    NonPositiveVelocity(f64),

    #[error("acceleration must be positive, got {0} mm/s^2")]
    NonPositiveAcceleration(f64),

    #[error("sigmoidal ramp parameters exceed numeric range")]
    RampOutOfRange,

    #[error("unknown ramp type '{0}'")]
    UnknownRampType(String),

    #[error("feed rate must be positive, got {0} mm/min")]
    InvalidFeedRate(f64),

    #[error("arc radius must cover at least one step, got {0}")]
    DegenerateArc(i64),
}
