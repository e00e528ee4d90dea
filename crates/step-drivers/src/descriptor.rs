//! Driver family descriptors.
//!
//! Each supported driver carries its own microstep mode table: a mapping from
//! microstep divisor to the levels of its mode-select inputs, ordered M0
//! upward. The families differ in both encoding and bit width (the DRV8711
//! exposes four mode bits), so the descriptor is a tagged variant rather than
//! a trait hierarchy.

use std::fmt;
use std::str::FromStr;

/// The stepper driver families this controller knows how to configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Drv8825,
    Drv8711,
    Tb67s249ftg,
}

// Mode-select levels ordered [M0, M1, M2(, M3)].
const DRV8825_MODES: &[(u32, &[u8])] = &[
    (1, &[0, 0, 0]),
    (2, &[1, 0, 0]),
    (4, &[0, 1, 0]),
    (8, &[1, 1, 0]),
    (16, &[0, 0, 1]),
    (32, &[0, 1, 1]),
];

// The DRV8711 MODE field is a plain binary divisor exponent, four bits wide.
const DRV8711_MODES: &[(u32, &[u8])] = &[
    (1, &[0, 0, 0, 0]),
    (2, &[1, 0, 0, 0]),
    (4, &[0, 1, 0, 0]),
    (8, &[1, 1, 0, 0]),
    (16, &[0, 0, 1, 0]),
    (32, &[1, 0, 1, 0]),
    (64, &[0, 1, 1, 0]),
    (128, &[1, 1, 1, 0]),
    (256, &[0, 0, 0, 1]),
];

// Mode 0 is electrical standby. Half step uses the non-circular
// (100% current, high torque) encoding.
const TB67S249FTG_MODES: &[(u32, &[u8])] = &[
    (0, &[0, 0, 0]),
    (1, &[0, 0, 1]),
    (2, &[0, 1, 0]),
    (4, &[0, 1, 1]),
    (8, &[1, 0, 1]),
    (16, &[1, 1, 0]),
    (32, &[1, 1, 1]),
];

impl DriverKind {
    /// The full microstep mode table of this family.
    pub fn mode_table(self) -> &'static [(u32, &'static [u8])] {
        match self {
            DriverKind::Drv8825 => DRV8825_MODES,
            DriverKind::Drv8711 => DRV8711_MODES,
            DriverKind::Tb67s249ftg => TB67S249FTG_MODES,
        }
    }

    /// Number of mode-select input lines.
    pub fn mode_bits(self) -> usize {
        self.mode_table()[0].1.len()
    }

    /// Mode-select levels for a microstep divisor, M0 first, or `None` if the
    /// divisor is not in this family's table.
    pub fn select_bits(self, mode: u32) -> Option<&'static [u8]> {
        self.mode_table()
            .iter()
            .find(|(divisor, _)| *divisor == mode)
            .map(|(_, bits)| *bits)
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverKind::Drv8825 => "DRV8825",
            DriverKind::Drv8711 => "DRV8711",
            DriverKind::Tb67s249ftg => "TB67S249FTG",
        };
        f.write_str(name)
    }
}

impl FromStr for DriverKind {
    type Err = crate::stepper::DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRV8825" => Ok(DriverKind::Drv8825),
            "DRV8711" => Ok(DriverKind::Drv8711),
            "TB67S249FTG" => Ok(DriverKind::Tb67s249ftg),
            other => Err(crate::stepper::DriverError::UnknownDriver(other.to_string())),
        }
    }
}
