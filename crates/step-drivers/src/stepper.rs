//! One axis's stepper controller.
//!
//! A [`Stepper`] owns the STEP, DIR, nENABLE and mode-select lines of a
//! single driver and consumes planned pulse sequences. Pulse periods are
//! realised with a [`SpinSleeper`]: the OS sleeps away everything beyond its
//! native accuracy window and the remainder is busy-spun, which keeps
//! sub-millisecond periods honest without burning a core on long ones.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use embedded_hal::digital::{OutputPin, PinState};
use motion::PulseStep;
use spin_sleep::SpinSleeper;
use thiserror::Error;
use tracing::debug;

use crate::descriptor::DriverKind;

/// Spin window for pulse timing: anything shorter than this is pure
/// busy-wait, anything longer sleeps first.
const SPIN_ACCURACY_NS: u32 = 2_000_000;

/// Driver wake-up / mode-latch settle time.
const SETTLE_LONG: Duration = Duration::from_millis(100);
/// DIR setup time before the next STEP edge.
const SETTLE_DIR: Duration = Duration::from_millis(1);

/// Errors surfaced by an axis controller. Hardware write failures are fatal
/// to the run; cancellation terminates the current command cleanly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("microstep mode 1/{mode} not available on {driver}")]
    InvalidMode { driver: DriverKind, mode: u32 },

    #[error("{driver} has {expected} mode-select lines, {actual} pins configured")]
    ModePinCount {
        driver: DriverKind,
        expected: usize,
        actual: usize,
    },

    #[error("unknown stepper driver '{0}'")]
    UnknownDriver(String),

    #[error("hardware write to {line} failed: {details}")]
    Gpio { line: String, details: String },

    #[error("stopped by user")]
    Cancelled,
}

/// Logical motion direction of an axis, before polarity inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Direction of a nonzero pulse-step sign.
    pub fn from_sign(sign: i8) -> Self {
        if sign >= 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
}

/// The control lines of one driver, mode-select pins ordered M0 upward.
pub struct StepperPins<P> {
    pub step: P,
    pub dir: P,
    pub enable: P,
    pub mode: Vec<P>,
}

/// One axis's driver configuration and mutable state. Owned exclusively by
/// the worker thread emitting the axis's pulses during a command.
pub struct Stepper<P: OutputPin> {
    name: String,
    driver: DriverKind,
    pins: StepperPins<P>,
    mode: u32,
    direction: Direction,
    polarity: bool,
    enabled: bool,
    sleeper: SpinSleeper,
}

fn drive<P: OutputPin>(pin: &mut P, line: &str, high: bool) -> Result<(), DriverError> {
    let state = if high { PinState::High } else { PinState::Low };
    pin.set_state(state).map_err(|e| DriverError::Gpio {
        line: line.to_string(),
        details: format!("{e:?}"),
    })
}

impl<P: OutputPin> Stepper<P> {
    /// Create the controller and latch the initial microstep mode and a
    /// forward direction. The driver stays disabled until [`enable`] is
    /// called.
    ///
    /// [`enable`]: Stepper::enable
    pub fn new(
        name: impl Into<String>,
        driver: DriverKind,
        mut pins: StepperPins<P>,
        mode: u32,
        polarity: bool,
    ) -> Result<Self, DriverError> {
        let expected = driver.mode_bits();
        if pins.mode.len() != expected {
            return Err(DriverError::ModePinCount {
                driver,
                expected,
                actual: pins.mode.len(),
            });
        }
        let name = name.into();
        let bits = driver
            .select_bits(mode)
            .ok_or(DriverError::InvalidMode { driver, mode })?;
        let mode_line = format!("{name} mode");
        for (pin, bit) in pins.mode.iter_mut().zip(bits) {
            drive(pin, &mode_line, *bit != 0)?;
        }
        let mut stepper = Self {
            name,
            driver,
            pins,
            mode,
            direction: Direction::Forward,
            polarity,
            enabled: false,
            sleeper: SpinSleeper::new(SPIN_ACCURACY_NS),
        };
        stepper.write_direction(Direction::Forward)?;
        Ok(stepper)
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Wake the driver (nENABLE low) and wait out its power-up time.
    pub fn enable(&mut self) -> Result<(), DriverError> {
        debug!("{}: enabling driver", self.name);
        drive(&mut self.pins.enable, &format!("{} enable", self.name), false)?;
        thread::sleep(SETTLE_LONG);
        self.enabled = true;
        Ok(())
    }

    /// Put the driver to sleep (nENABLE high) and wait out its shutdown time.
    pub fn disable(&mut self) -> Result<(), DriverError> {
        debug!("{}: disabling driver", self.name);
        drive(&mut self.pins.enable, &format!("{} enable", self.name), true)?;
        thread::sleep(SETTLE_LONG);
        self.enabled = false;
        Ok(())
    }

    /// Select a microstep mode from the driver's table. No-op if unchanged.
    pub fn set_mode(&mut self, mode: u32) -> Result<(), DriverError> {
        if mode == self.mode {
            return Ok(());
        }
        let bits = self.driver.select_bits(mode).ok_or(DriverError::InvalidMode {
            driver: self.driver,
            mode,
        })?;
        debug!("{}: setting microstep mode 1/{} {:?}", self.name, mode, bits);
        for (pin, bit) in self.pins.mode.iter_mut().zip(bits) {
            drive(pin, &format!("{} mode", self.name), *bit != 0)?;
        }
        thread::sleep(SETTLE_LONG);
        self.mode = mode;
        Ok(())
    }

    /// Set the logical direction. No-op if unchanged; otherwise writes the
    /// DIR line (inverted by polarity) and waits the setup time.
    pub fn set_direction(&mut self, direction: Direction) -> Result<(), DriverError> {
        if direction == self.direction {
            return Ok(());
        }
        debug!("{}: setting direction {:?}", self.name, direction);
        self.write_direction(direction)?;
        thread::sleep(SETTLE_DIR);
        Ok(())
    }

    fn write_direction(&mut self, direction: Direction) -> Result<(), DriverError> {
        let level = (direction == Direction::Reverse) ^ self.polarity;
        drive(&mut self.pins.dir, &format!("{} dir", self.name), level)?;
        self.direction = direction;
        Ok(())
    }

    /// Consume a pulse sequence: one STEP edge pair per entry, half the
    /// period high and half low. Zero-direction entries hold the axis for
    /// the period without stepping. `stop` is polled before every pulse.
    pub fn step_sequence(
        &mut self,
        pulses: &[PulseStep],
        stop: &AtomicBool,
    ) -> Result<(), DriverError> {
        debug!("{}: emitting {} pulses", self.name, pulses.len());
        let step_line = format!("{} step", self.name);
        for pulse in pulses {
            if stop.load(Ordering::Relaxed) {
                return Err(DriverError::Cancelled);
            }
            if pulse.direction == 0 {
                self.sleeper.sleep(Duration::from_secs_f64(pulse.delay));
                continue;
            }
            let direction = Direction::from_sign(pulse.direction);
            if direction != self.direction {
                self.set_direction(direction)?;
            }
            let half = Duration::from_secs_f64(pulse.delay / 2.0);
            drive(&mut self.pins.step, &step_line, true)?;
            self.sleeper.sleep(half);
            drive(&mut self.pins.step, &step_line, false)?;
            self.sleeper.sleep(half);
        }
        Ok(())
    }

    /// Drop all control lines to their inactive levels and disable the
    /// driver. Used on shutdown and on fatal errors.
    pub fn release(&mut self) -> Result<(), DriverError> {
        drive(&mut self.pins.step, &format!("{} step", self.name), false)?;
        for pin in self.pins.mode.iter_mut() {
            drive(pin, &format!("{} mode", self.name), false)?;
        }
        self.disable()
    }
}
