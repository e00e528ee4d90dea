//! # Motion Core
//!
//! Deterministic motion planning for a 3-axis CNC router.
//!
//! Provides the core motion primitives:
//! - Unit and kinematic conversions (mm ↔ steps, mm/min ↔ pulses/s)
//! - Acceleration ramp generation (trapezoidal, sigmoidal, polynomial)
//! - Pulse-sequence planning for rapid, linear-interpolated and
//!   circular-interpolated moves
//!
//! Everything in this crate is pure: given identical inputs, the generated
//! sequences are bit-identical across runs. Timing realisation and hardware
//! I/O live in the `step-drivers` and `cnc-host` crates.

pub mod errors;
pub mod kinematics;
pub mod planner;
pub mod ramp;

// Re-export core types for easier access
pub use errors::PlannerError;
pub use planner::{ArcArgs, AxisParams, MotionPlanner, Plane};
pub use ramp::{RampCache, RampKind};

/// One tick of one axis's pulse plan.
///
/// `direction` is −1, 0 or +1; 0 means "no step this tick, but honor the
/// delay" and is only meaningful inside synchronized multi-axis moves.
/// `delay` is the full pulse period in seconds and is always positive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PulseStep {
    pub direction: i8,
    pub delay: f64,
}

/// The ordered pulse plan for one axis, consumed once by its stepper.
pub type PulseSequence = Vec<PulseStep>;
