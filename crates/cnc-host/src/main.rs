//! # CNC Host
//!
//! Host process for a 3-axis CNC router: validates a G-code program against
//! the machine configuration, plans each command into per-axis pulse
//! sequences and drives the stepper drivers over GPIO.
//!
//! With `--debug` the hardware writes are swallowed and everything else runs,
//! including the pulse timing. Real Raspberry Pi GPIO needs the `rasp` cargo
//! feature.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

mod config;
mod gcode;
mod gpio;
mod machine;
mod position;

use config::{AxisConfig, MachineConfig};
use gcode::Command;
use gpio::SoftPin;
use machine::Machine;
use step_drivers::{Stepper, StepperPins};

/// Drives a 3-axis CNC router from a G-code program.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input G-code file.
    #[arg(short = 'i', long)]
    gcode: PathBuf,

    /// Machine configuration file.
    #[arg(short, long, default_value = "machine.cfg")]
    config: PathBuf,

    /// Suppress hardware writes; everything else runs.
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let machine_config = MachineConfig::load(&cli.config)?;
    let program = gcode::read_program(&cli.gcode, &machine_config)?;
    info!("Loaded {} instructions", program.len());

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        })
        .context("failed to install the interrupt handler")?;
    }

    if cli.debug {
        run_debug(&machine_config, &program, stop)
    } else {
        run_hardware(&machine_config, &program, stop)
    }
}

fn run_debug(
    config: &MachineConfig,
    program: &[Command],
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let steppers = [
        soft_stepper(&config.axes[0], "X")?,
        soft_stepper(&config.axes[1], "Y")?,
        soft_stepper(&config.axes[2], "Z")?,
    ];
    Machine::new(config, steppers, stop)?.run(program)
}

fn soft_stepper(axis: &AxisConfig, name: &str) -> Result<Stepper<SoftPin>> {
    let pins = StepperPins {
        step: SoftPin::new(axis.pins.step),
        dir: SoftPin::new(axis.pins.dir),
        enable: SoftPin::new(axis.pins.enable),
        mode: axis.pins.mode.iter().map(|&p| SoftPin::new(p)).collect(),
    };
    Ok(Stepper::new(name, axis.driver, pins, axis.params.mode, axis.polarity)?)
}

#[cfg(feature = "rasp")]
fn run_hardware(
    config: &MachineConfig,
    program: &[Command],
    stop: Arc<AtomicBool>,
) -> Result<()> {
    use gpio::rasp::{output_pin, BoardPin};

    fn board_stepper(axis: &AxisConfig, name: &str) -> Result<Stepper<BoardPin>> {
        let pins = StepperPins {
            step: output_pin(axis.pins.step)?,
            dir: output_pin(axis.pins.dir)?,
            enable: output_pin(axis.pins.enable)?,
            mode: axis
                .pins
                .mode
                .iter()
                .map(|&p| output_pin(p))
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(Stepper::new(name, axis.driver, pins, axis.params.mode, axis.polarity)?)
    }

    let steppers = [
        board_stepper(&config.axes[0], "X")?,
        board_stepper(&config.axes[1], "Y")?,
        board_stepper(&config.axes[2], "Z")?,
    ];
    Machine::new(config, steppers, stop)?.run(program)
}

#[cfg(not(feature = "rasp"))]
fn run_hardware(_: &MachineConfig, _: &[Command], _: Arc<AtomicBool>) -> Result<()> {
    anyhow::bail!(
        "built without Raspberry Pi GPIO support; rebuild with `--features rasp` or pass --debug"
    )
}
