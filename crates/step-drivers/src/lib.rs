//! Stepper driver control for the CNC router.
//!
//! [`descriptor`] models the supported driver families (microstep mode tables
//! and mode-select bit widths); [`stepper`] owns one axis's control lines and
//! turns a planned [`motion::PulseSequence`] into timed STEP/DIR edges.
//!
//! All hardware access goes through `embedded-hal` 1.0 [`OutputPin`]s, so the
//! same code drives real GPIO lines, no-op debug pins and test mocks.
//!
//! [`OutputPin`]: embedded_hal::digital::OutputPin

pub mod descriptor;
pub mod stepper;

pub use descriptor::DriverKind;
pub use stepper::{Direction, DriverError, Stepper, StepperPins};
