//! Pulse-sequence planning.
//!
//! Translates validated move commands into per-axis [`PulseSequence`]s:
//! - rapid positioning, each axis independent at its traversal rate with an
//!   acceleration ramp overlaid on head and tail,
//! - linear interpolation on a plane, both axes finishing together on
//!   independent constant-rate time bases,
//! - circular interpolation, a quadrant walk in step space with per-axis
//!   arc-time delays.
//!
//! Axes that do not move receive empty sequences.

use std::f64::consts::{PI, TAU};

use tracing::debug;

use crate::errors::PlannerError;
use crate::kinematics;
use crate::ramp::{RampCache, RampKind};
use crate::{PulseSequence, PulseStep};

/// The pair of physical axes a 2D interpolation maps onto.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Plane {
    Xy,
    Xz,
    Yz,
}

impl Plane {
    /// Indices of the (u, v) axes of this plane in X/Y/Z order.
    pub fn axes(self) -> (usize, usize) {
        match self {
            Plane::Xy => (0, 1),
            Plane::Xz => (0, 2),
            Plane::Yz => (1, 2),
        }
    }
}

/// Immutable kinematic description of one axis.
#[derive(Debug, Clone)]
pub struct AxisParams {
    /// Mechanical rotation per full step, degrees.
    pub step_angle: f64,
    /// Microstepping divisor.
    pub mode: u32,
    /// Linear travel per revolution, mm.
    pub lead: f64,
    /// Rapid (G00) speed, mm/min.
    pub traversal_rate: f64,
    /// Machining (G01/G02/G03) speed, mm/min.
    pub feed_rate: f64,
    /// Linear acceleration, mm/s².
    pub acceleration: f64,
    /// Ramp curve used on rapids.
    pub ramp: RampKind,
}

impl AxisParams {
    fn steps(&self, distance_mm: f64) -> i64 {
        kinematics::mm_to_steps(distance_mm, self.step_angle, self.mode, self.lead)
    }

    fn pps(&self, v_mm_min: f64) -> f64 {
        kinematics::mm_per_min_to_pps(v_mm_min, self.step_angle, self.mode, self.lead)
    }
}

/// Circular interpolation request, in plane coordinates relative to the
/// start point. The circle center lies at +u from the start at one radius.
#[derive(Debug, Clone, Copy)]
pub struct ArcArgs {
    pub radius_mm: f64,
    /// End point (u, v) relative to start; `(0, 0)` closes a full circle.
    pub end_mm: Option<(f64, f64)>,
    pub feed_rate: f64,
    pub clockwise: bool,
}

/// Plans pulse sequences for the three machine axes.
pub struct MotionPlanner {
    axes: [AxisParams; 3],
    ramps: RampCache,
}

impl MotionPlanner {
    pub fn new(axes: [AxisParams; 3]) -> Self {
        Self {
            axes,
            ramps: RampCache::new(),
        }
    }

    pub fn axis(&self, index: usize) -> &AxisParams {
        &self.axes[index]
    }

    /// Rapid positioning: every axis runs independently at its own traversal
    /// rate, so shorter axes finish earlier. The axis's ramp profile is
    /// overlaid on the head and, mirrored, on the tail of the sequence.
    pub fn plan_move(&mut self, deltas_mm: [f64; 3]) -> Result<[PulseSequence; 3], PlannerError> {
        let mut plan: [PulseSequence; 3] = Default::default();
        for (i, delta) in deltas_mm.iter().enumerate() {
            let axis = &self.axes[i];
            let steps = axis.steps(*delta);
            if steps == 0 {
                continue;
            }
            let profile = self.ramps.profile(
                axis.ramp,
                axis.traversal_rate,
                axis.acceleration,
                axis.step_angle,
                axis.mode,
                axis.lead,
            )?;
            plan[i] = overlay_ramp(steps, &profile);
        }
        debug!(
            "planned rapid move: {} / {} / {} pulses",
            plan[0].len(),
            plan[1].len(),
            plan[2].len()
        );
        Ok(plan)
    }

    /// Linear interpolation on a plane.
    ///
    /// Both participating axes cover the Euclidean path in the same total
    /// time; each emits its own step count at its own constant rate, so
    /// neither stalls for the other.
    pub fn plan_interpolated_line(
        &mut self,
        plane: Plane,
        delta_u: f64,
        delta_v: f64,
        feed_rate: f64,
    ) -> Result<[PulseSequence; 3], PlannerError> {
        if !(feed_rate > 0.0) {
            return Err(PlannerError::InvalidFeedRate(feed_rate));
        }
        let mut plan: [PulseSequence; 3] = Default::default();
        let path = delta_u.hypot(delta_v);
        if path == 0.0 {
            return Ok(plan);
        }
        let minutes = path / feed_rate;
        let (iu, iv) = plane.axes();
        plan[iu] = constant_rate_sequence(&self.axes[iu], delta_u, minutes);
        plan[iv] = constant_rate_sequence(&self.axes[iv], delta_v, minutes);
        debug!(
            "planned interpolated line: {} / {} pulses over {:.4} s",
            plan[iu].len(),
            plan[iv].len(),
            minutes * 60.0
        );
        Ok(plan)
    }

    /// Circular interpolation on a plane.
    ///
    /// Works in step units. The walk advances whichever axis has the smaller
    /// remaining distance to its next ideal step (both on a tie) and emits,
    /// per advance, the arc time between that axis's consecutive integer
    /// crossings. Terminates at the end point or after a full circle.
    pub fn plan_interpolated_arc(
        &mut self,
        plane: Plane,
        arc: &ArcArgs,
    ) -> Result<[PulseSequence; 3], PlannerError> {
        if !(arc.feed_rate > 0.0) {
            return Err(PlannerError::InvalidFeedRate(arc.feed_rate));
        }
        let (iu, iv) = plane.axes();
        let axis_u = &self.axes[iu];
        let axis_v = &self.axes[iv];

        let r = axis_u.steps(arc.radius_mm);
        if r <= 0 {
            return Err(PlannerError::DegenerateArc(r));
        }
        let rf = r as f64;

        // The walk below always runs clockwise; counter-clockwise arcs are
        // its mirror image across the u axis.
        let end = arc.end_mm.map(|(eu, ev)| {
            let ex = axis_u.steps(eu);
            let ey = axis_v.steps(ev);
            (ex, if arc.clockwise { ey } else { -ey })
        });

        // Seconds per radian of arc travel, one per axis time base.
        let secs_per_rad_u = rf / axis_u.pps(arc.feed_rate);
        let secs_per_rad_v = rf / axis_v.pps(arc.feed_rate);

        let mut seq_u = PulseSequence::with_capacity(4 * r as usize);
        let mut seq_v = PulseSequence::with_capacity(4 * r as usize);
        let (mut x, mut y) = (0i64, 0i64);
        let (mut phi_u, mut phi_v) = (0.0f64, 0.0f64);

        for _ in 0..4 * r {
            let (kx, ky, factor_u, factor_v) = quadrant(x, y, r);
            let x_dist = (x - r).abs();
            let y_dist = r - y.abs();

            if x_dist <= y_dist {
                x += factor_u;
                let phi = factor_u as f64 * ((r - x) as f64 / rf).acos() + TAU * kx as f64;
                seq_u.push(PulseStep {
                    direction: factor_u as i8,
                    delay: secs_per_rad_u * (phi - phi_u),
                });
                phi_u = phi;
            }
            if y_dist <= x_dist {
                y += factor_v;
                let phi = factor_v as f64 * (y as f64 / rf).asin() + PI * ky as f64;
                seq_v.push(PulseStep {
                    direction: factor_v as i8,
                    delay: secs_per_rad_v * (phi - phi_v),
                });
                phi_v = phi;
            }
            if end == Some((x, y)) {
                break;
            }
        }

        if !arc.clockwise {
            for pulse in &mut seq_v {
                pulse.direction = -pulse.direction;
            }
        }

        debug!(
            "planned interpolated arc: r={} steps, {} / {} pulses",
            r,
            seq_u.len(),
            seq_v.len()
        );
        let mut plan: [PulseSequence; 3] = Default::default();
        plan[iu] = seq_u;
        plan[iv] = seq_v;
        Ok(plan)
    }
}

/// One axis's share of an interpolated line: `|steps|` pulses at the constant
/// rate that covers `delta_mm` in the move's total time.
fn constant_rate_sequence(axis: &AxisParams, delta_mm: f64, minutes: f64) -> PulseSequence {
    let steps = axis.steps(delta_mm);
    if steps == 0 {
        return PulseSequence::new();
    }
    let speed = delta_mm.abs() / minutes;
    let delay = 1.0 / axis.pps(speed);
    let direction: i8 = if steps >= 0 { 1 } else { -1 };
    vec![PulseStep { direction, delay }; steps.unsigned_abs() as usize]
}

/// Quadrant bookkeeping for the clockwise walk, keyed on the current step
/// position relative to the circle center at (r, 0). Returns
/// (kx, ky, factor_u, factor_v): the angle-unwrap multiples and the step
/// directions of each axis inside this region.
fn quadrant(x: i64, y: i64, r: i64) -> (i64, i64, i64, i64) {
    if x < r && y >= 0 {
        (0, 0, 1, 1)
    } else if x >= r && y > 0 {
        (0, 1, 1, -1)
    } else if x > r && y <= 0 {
        (1, 1, -1, -1)
    } else {
        (1, 2, -1, 1)
    }
}

/// Emit `|steps|` pulses with the ramp profile on the head, its mirror image
/// on the tail and the profile's final (cruise) interval between. When the
/// move is too short for two full ramps the profile is truncated
/// symmetrically at the midpoint.
fn overlay_ramp(steps: i64, profile: &[f64]) -> PulseSequence {
    let direction: i8 = if steps >= 0 { 1 } else { -1 };
    let n = steps.unsigned_abs() as usize;
    let cruise = profile[profile.len() - 1];
    (0..n)
        .map(|i| {
            let delay = if i < profile.len() && i < n / 2 {
                profile[i]
            } else if i >= n / 2 && i + profile.len() >= n {
                profile[n - 1 - i]
            } else {
                cruise
            };
            PulseStep { direction, delay }
        })
        .collect()
}
