//! Output line construction.
//!
//! Both variants implement `embedded-hal`'s [`OutputPin`], which is the only
//! interface the stepper controllers see: [`SoftPin`] swallows writes for
//! `--debug` runs, and the `rasp` module (behind the `rasp` feature) wraps
//! real Raspberry Pi GPIO lines.

use std::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use tracing::trace;

/// A no-op output line: accepts every write and records it in the trace log.
/// Used when running with `--debug`, where everything but the hardware is
/// exercised.
#[derive(Debug, Clone)]
pub struct SoftPin {
    number: u8,
}

impl SoftPin {
    pub fn new(number: u8) -> Self {
        Self { number }
    }
}

impl ErrorType for SoftPin {
    type Error = Infallible;
}

impl OutputPin for SoftPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        trace!("gpio {} <- low", self.number);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        trace!("gpio {} <- high", self.number);
        Ok(())
    }
}

#[cfg(feature = "rasp")]
pub mod rasp {
    //! Raspberry Pi GPIO lines via rppal.

    use std::convert::Infallible;

    use anyhow::{Context, Result};
    use embedded_hal::digital::{ErrorType, OutputPin};

    /// An rppal output pin adapted to the `embedded-hal` interface.
    pub struct BoardPin(rppal::gpio::OutputPin);

    impl ErrorType for BoardPin {
        type Error = Infallible;
    }

    impl OutputPin for BoardPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.set_low();
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.set_high();
            Ok(())
        }
    }

    /// Claim a BCM pin as an output, initially low.
    pub fn output_pin(number: u8) -> Result<BoardPin> {
        let pin = rppal::gpio::Gpio::new()
            .context("failed to open the GPIO peripheral")?
            .get(number)
            .with_context(|| format!("failed to claim GPIO pin {number}"))?
            .into_output_low();
        Ok(BoardPin(pin))
    }
}
