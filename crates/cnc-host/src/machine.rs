//! The machine executor.
//!
//! Owns the three axis controllers, the planner, the current position and the
//! active plane. Each validated command is planned into three pulse
//! sequences and dispatched to one worker thread per axis; the executor joins
//! all three before the next command, which is the only synchronization
//! point. A worker error (or Ctrl-C) raises the shared stop flag so the
//! sibling workers bail at their next pulse.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use embedded_hal::digital::OutputPin;
use motion::{ArcArgs, MotionPlanner, Plane, PlannerError, PulseSequence};
use step_drivers::{DriverError, Stepper};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::MachineConfig;
use crate::gcode::{Command, CommandKind, Params};
use crate::position::Position;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("line {line}: {message}")]
    InvalidCommand { line: usize, message: String },

    #[error("axis worker panicked")]
    WorkerPanic,
}

/// The executor: three steppers, a planner, a position and a plane.
pub struct Machine<P: OutputPin + Send> {
    steppers: [Stepper<P>; 3],
    planner: MotionPlanner,
    limits: [(f64, f64); 3],
    coordinates: Position,
    coord_file: PathBuf,
    plane: Plane,
    stop: Arc<AtomicBool>,
}

impl<P: OutputPin + Send> Machine<P> {
    /// Build the executor and read the persisted position record.
    pub fn new(
        config: &MachineConfig,
        steppers: [Stepper<P>; 3],
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        let params = [
            config.axes[0].params.clone(),
            config.axes[1].params.clone(),
            config.axes[2].params.clone(),
        ];
        let limits = [
            config.axes[0].limits,
            config.axes[1].limits,
            config.axes[2].limits,
        ];
        let coordinates = Position::load(&config.coord_file)?;
        Ok(Self {
            steppers,
            planner: MotionPlanner::new(params),
            limits,
            coordinates,
            coord_file: config.coord_file.clone(),
            plane: Plane::Xy,
            stop,
        })
    }

    pub fn position(&self) -> Position {
        self.coordinates
    }

    /// Run a whole program: enable the drivers, execute every command in
    /// order, then release the hardware and persist the position. The
    /// release and the position write happen on every exit path.
    pub fn run(&mut self, commands: &[Command]) -> Result<()> {
        for stepper in &mut self.steppers {
            stepper.enable()?;
        }
        let outcome = self.run_all(commands);
        for stepper in &mut self.steppers {
            if let Err(e) = stepper.release() {
                warn!("failed to release stepper: {e}");
            }
        }
        self.coordinates.save(&self.coord_file)?;
        info!(
            "position persisted: X{} Y{} Z{}",
            self.coordinates.x, self.coordinates.y, self.coordinates.z
        );
        outcome?;
        Ok(())
    }

    fn run_all(&mut self, commands: &[Command]) -> Result<(), MachineError> {
        for command in commands {
            if self.stop.load(Ordering::Relaxed) {
                return Err(DriverError::Cancelled.into());
            }
            info!("Executing '{command}'");
            self.execute(command)?;
        }
        Ok(())
    }

    /// Plan and dispatch one command, then commit the position change.
    pub fn execute(&mut self, command: &Command) -> Result<(), MachineError> {
        match command.kind {
            CommandKind::Rapid => {
                let deltas = self.rapid_deltas(&command.params);
                let plan = self.planner.plan_move(deltas)?;
                self.dispatch(&plan)?;
                self.commit_deltas(deltas);
            }
            CommandKind::LinearInterp => {
                // The two axis words define the plane; the missing axis holds.
                let plane = line_plane(&command.params);
                let (iu, iv) = plane.axes();
                let current = self.coordinate_array();
                let words = command.params.axis_words();
                let delta_u = words[iu].unwrap() - current[iu];
                let delta_v = words[iv].unwrap() - current[iv];
                let feed = self.feed_rate(&command.params, plane);
                let plan = self
                    .planner
                    .plan_interpolated_line(plane, delta_u, delta_v, feed)?;
                self.dispatch(&plan)?;
                let mut deltas = [0.0; 3];
                deltas[iu] = delta_u;
                deltas[iv] = delta_v;
                self.commit_deltas(deltas);
            }
            CommandKind::CircularCw | CommandKind::CircularCcw => {
                let plane = self.plane;
                let arc = self.arc_args(command, plane)?;
                let (iu, iv) = plane.axes();
                let words = command.params.axis_words();
                let plan = self.planner.plan_interpolated_arc(plane, &arc)?;
                self.dispatch(&plan)?;
                // Arcs commit the supplied end point.
                let mut coords = self.coordinate_array();
                coords[iu] = words[iu].unwrap();
                coords[iv] = words[iv].unwrap();
                self.set_coordinates(coords);
            }
            CommandKind::SelectPlane(plane) => {
                self.plane = plane;
            }
            CommandKind::Home => {
                let current = self.coordinate_array();
                let mut deltas = [0.0; 3];
                for axis in 0..3 {
                    deltas[axis] = self.limits[axis].0 - current[axis];
                }
                let plan = self.planner.plan_move(deltas)?;
                self.dispatch(&plan)?;
                self.set_coordinates([self.limits[0].0, self.limits[1].0, self.limits[2].0]);
            }
            CommandKind::Misc(m) => {
                warn!("ignoring unsupported M-code M{m:02}");
            }
        }
        Ok(())
    }

    /// Fork three axis workers, one per pulse sequence, and join them all.
    /// The first non-cancellation error wins; a failing worker raises the
    /// stop flag so its siblings terminate at their next pulse.
    fn dispatch(&mut self, plan: &[PulseSequence; 3]) -> Result<(), MachineError> {
        let stop = &self.stop;
        let results: Vec<Result<(), MachineError>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .steppers
                .iter_mut()
                .zip(plan.iter())
                .map(|(stepper, sequence)| {
                    scope.spawn(move || {
                        let result = stepper.step_sequence(sequence, stop);
                        if result.is_err() {
                            stop.store(true, Ordering::Relaxed);
                        }
                        result
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result.map_err(MachineError::from),
                    Err(_) => {
                        stop.store(true, Ordering::Relaxed);
                        Err(MachineError::WorkerPanic)
                    }
                })
                .collect()
        });

        let mut first_error: Option<MachineError> = None;
        for result in results {
            if let Err(error) = result {
                let masks_root_cause = matches!(
                    first_error,
                    Some(MachineError::Driver(DriverError::Cancelled))
                ) && !matches!(error, MachineError::Driver(DriverError::Cancelled));
                if first_error.is_none() || masks_root_cause {
                    // A cancellation never hides the error that caused it.
                    first_error = Some(error);
                }
            }
        }
        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    fn coordinate_array(&self) -> [f64; 3] {
        [self.coordinates.x, self.coordinates.y, self.coordinates.z]
    }

    fn set_coordinates(&mut self, coords: [f64; 3]) {
        self.coordinates.x = coords[0];
        self.coordinates.y = coords[1];
        self.coordinates.z = coords[2];
    }

    fn commit_deltas(&mut self, deltas: [f64; 3]) {
        self.coordinates.x += deltas[0];
        self.coordinates.y += deltas[1];
        self.coordinates.z += deltas[2];
    }

    fn rapid_deltas(&self, params: &Params) -> [f64; 3] {
        let current = self.coordinate_array();
        let words = params.axis_words();
        let mut deltas = [0.0; 3];
        for axis in 0..3 {
            if let Some(target) = words[axis] {
                deltas[axis] = target - current[axis];
            }
        }
        deltas
    }

    /// F overrides the configured feed rate for this command only; otherwise
    /// the smaller of the two participating axes' feed rates applies.
    fn feed_rate(&self, params: &Params, plane: Plane) -> f64 {
        params.f.unwrap_or_else(|| {
            let (iu, iv) = plane.axes();
            self.planner
                .axis(iu)
                .feed_rate
                .min(self.planner.axis(iv).feed_rate)
        })
    }

    fn arc_args(&self, command: &Command, plane: Plane) -> Result<ArcArgs, MachineError> {
        let (iu, iv) = plane.axes();
        let words = command.params.axis_words();
        if words[iu].is_none() || words[iv].is_none() {
            return Err(MachineError::InvalidCommand {
                line: command.line,
                message: "arc end point must lie in the active plane".to_string(),
            });
        }
        let radius_mm = match command.params.r {
            Some(r) => r,
            None => {
                let offsets = plane_center_offsets(&command.params, plane).ok_or_else(|| {
                    MachineError::InvalidCommand {
                        line: command.line,
                        message: "arc center offsets must lie in the active plane".to_string(),
                    }
                })?;
                offsets.0.hypot(offsets.1)
            }
        };
        let current = self.coordinate_array();
        Ok(ArcArgs {
            radius_mm,
            end_mm: Some((
                words[iu].unwrap() - current[iu],
                words[iv].unwrap() - current[iv],
            )),
            feed_rate: self.feed_rate(&command.params, plane),
            clockwise: command.kind == CommandKind::CircularCw,
        })
    }
}

fn line_plane(params: &Params) -> Plane {
    match (params.x, params.y, params.z) {
        (Some(_), Some(_), None) => Plane::Xy,
        (Some(_), None, Some(_)) => Plane::Xz,
        // The parser guarantees exactly two axis words.
        _ => Plane::Yz,
    }
}

/// The center-offset words belonging to a plane: I/J for XY, I/K for XZ,
/// J/K for YZ.
fn plane_center_offsets(params: &Params, plane: Plane) -> Option<(f64, f64)> {
    let (u, v) = match plane {
        Plane::Xy => (params.i, params.j),
        Plane::Xz => (params.i, params.k),
        Plane::Yz => (params.j, params.k),
    };
    Some((u?, v?))
}
