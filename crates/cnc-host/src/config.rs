//! Machine configuration loader.
//!
//! Parses the INI-style machine file into strongly-typed structs: one
//! `[axis_x]`/`[axis_y]`/`[axis_z]` section per axis plus a `[machine]`
//! section for host-level paths. Configuration is immutable after loading
//! and threaded explicitly through the planner, steppers and executor.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use configparser::ini::Ini;
use motion::{AxisParams, RampKind};
use step_drivers::DriverKind;

/// GPIO assignment of one axis, mode-select pins ordered M0 upward.
#[derive(Debug, Clone)]
pub struct AxisPins {
    pub step: u8,
    pub dir: u8,
    pub enable: u8,
    pub mode: Vec<u8>,
}

/// Everything the host knows about one axis.
#[derive(Debug, Clone)]
pub struct AxisConfig {
    pub params: AxisParams,
    /// Soft travel interval [min, max] in mm.
    pub limits: (f64, f64),
    /// Inverts the logical direction on the DIR line.
    pub polarity: bool,
    pub driver: DriverKind,
    pub pins: AxisPins,
}

/// The complete parsed machine configuration.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Where the current position record is persisted between runs.
    pub coord_file: PathBuf,
    /// Axis configurations in X, Y, Z order.
    pub axes: [AxisConfig; 3],
}

impl MachineConfig {
    /// Loads and parses the configuration file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| anyhow!("failed to load configuration file {}: {e}", path.display()))?;

        let coord_file = ini
            .get("machine", "coord_file")
            .unwrap_or_else(|| "coordinates.json".to_string())
            .into();

        let axes = [
            Self::load_axis(&ini, "axis_x")?,
            Self::load_axis(&ini, "axis_y")?,
            Self::load_axis(&ini, "axis_z")?,
        ];

        Ok(Self { coord_file, axes })
    }

    /// Helper to load one axis section.
    fn load_axis(ini: &Ini, section: &str) -> Result<AxisConfig> {
        let driver: DriverKind = get_str(ini, section, "driver")?
            .parse()
            .with_context(|| format!("[{section}] driver"))?;
        let ramp: RampKind = get_str(ini, section, "ramp_type")?
            .parse()
            .with_context(|| format!("[{section}] ramp_type"))?;

        let params = AxisParams {
            step_angle: get_float(ini, section, "step_angle")?,
            mode: get_uint(ini, section, "mode")? as u32,
            lead: get_float(ini, section, "lead")?,
            traversal_rate: get_float(ini, section, "traversal_rate")?,
            feed_rate: get_float(ini, section, "feed_rate")?,
            acceleration: get_float(ini, section, "acceleration")?,
            ramp,
        };

        let limits = (
            get_float(ini, section, "limit_min")?,
            get_float(ini, section, "limit_max")?,
        );
        if limits.0 >= limits.1 {
            return Err(anyhow!(
                "[{section}] soft limits are inverted: [{}, {}]",
                limits.0,
                limits.1
            ));
        }

        let mode_pins = (0..driver.mode_bits())
            .map(|i| get_uint(ini, section, &format!("pin_m{i}")).map(|p| p as u8))
            .collect::<Result<Vec<u8>>>()?;
        let pins = AxisPins {
            step: get_uint(ini, section, "pin_step")? as u8,
            dir: get_uint(ini, section, "pin_dir")? as u8,
            enable: get_uint(ini, section, "pin_enable")? as u8,
            mode: mode_pins,
        };

        Ok(AxisConfig {
            params,
            limits,
            polarity: ini
                .getbool(section, "polarity")
                .map_err(|e| anyhow!("[{section}] polarity: {e}"))?
                .unwrap_or(false),
            driver,
            pins,
        })
    }
}

fn get_str(ini: &Ini, section: &str, key: &str) -> Result<String> {
    ini.get(section, key)
        .with_context(|| format!("[{section}] {key} not found"))
}

fn get_float(ini: &Ini, section: &str, key: &str) -> Result<f64> {
    ini.getfloat(section, key)
        .map_err(|e| anyhow!("[{section}] {key}: {e}"))?
        .with_context(|| format!("[{section}] {key} not found"))
}

fn get_uint(ini: &Ini, section: &str, key: &str) -> Result<u64> {
    ini.getuint(section, key)
        .map_err(|e| anyhow!("[{section}] {key}: {e}"))?
        .with_context(|| format!("[{section}] {key} not found"))
}
