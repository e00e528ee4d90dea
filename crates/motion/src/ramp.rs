//! Acceleration ramp generation.
//!
//! A ramp profile is the head of a velocity curve: a strictly decreasing
//! sequence of per-step durations c₁…cₙ that accelerates the shaft from rest
//! to a target angular velocity. Deceleration is the same sequence reversed.
//! Generation is pure, so profiles are memoized by [`RampCache`].

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::errors::PlannerError;
use crate::kinematics;

/// The shape of the acceleration curve used on the head and tail of a move.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RampKind {
    /// Constant acceleration (classic Austin ramp).
    Trapezoidal,
    /// Constant acceleration with a jerk-limited logistic start and end.
    Sigmoidal,
    /// Three-segment S-curve: concave, linear, convex.
    Polynomial,
}

impl FromStr for RampKind {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trapezoidal" => Ok(RampKind::Trapezoidal),
            "sigmoidal" => Ok(RampKind::Sigmoidal),
            "polynomial" => Ok(RampKind::Polynomial),
            other => Err(PlannerError::UnknownRampType(other.to_string())),
        }
    }
}

/// Generate the acceleration step durations for one axis.
///
/// `v_mm_min` is the target speed in mm/min, `accel_mm_s2` the linear
/// acceleration in mm/s²; the remaining arguments describe the axis geometry.
/// The returned sequence is non-empty and its final entry approximates the
/// step period at target speed.
pub fn generate(
    kind: RampKind,
    v_mm_min: f64,
    accel_mm_s2: f64,
    step_angle_deg: f64,
    mode: u32,
    lead_mm: f64,
) -> Result<Vec<f64>, PlannerError> {
    let phi = kinematics::step_angle_rad(step_angle_deg, mode);
    let w = kinematics::angular_velocity(v_mm_min, step_angle_deg, mode, lead_mm);
    let a = kinematics::angular_acceleration(accel_mm_s2, step_angle_deg, mode, lead_mm);
    if !(w > 0.0) {
        return Err(PlannerError::NonPositiveVelocity(v_mm_min));
    }
    if !(a > 0.0) {
        return Err(PlannerError::NonPositiveAcceleration(accel_mm_s2));
    }

    match kind {
        RampKind::Trapezoidal => Ok(trapezoidal(v_mm_min, w, a, phi)),
        RampKind::Sigmoidal => sigmoidal(v_mm_min, w, a, phi),
        RampKind::Polynomial => Ok(polynomial(v_mm_min, w, a, phi)),
    }
}

fn trapezoidal(v_mm_min: f64, w: f64, a: f64, phi: f64) -> Vec<f64> {
    debug!("generating trapezoidal ramp profile [v_max={v_mm_min}]");
    // Number of steps needed to reach the target angular velocity:
    // [n = w^2 / (2 * phi * a)]
    let num_steps = ((w * w / (2.0 * phi * a)).round() as usize).max(1);
    // Initial step duration: [c0 = sqrt(2 * phi / a)]
    let c0 = (2.0 * phi / a).sqrt();
    let mut c = Vec::with_capacity(num_steps);
    c.push(c0);
    for i in 1..num_steps {
        c.push(c0 * (((i + 1) as f64).sqrt() - (i as f64).sqrt()));
    }
    c
}

fn sigmoidal(v_mm_min: f64, w: f64, a: f64, phi: f64) -> Result<Vec<f64>, PlannerError> {
    debug!("generating sigmoidal ramp profile [v_max={v_mm_min}]");
    // Inflection offset of the logistic curve, seconds.
    let ti = 0.4;
    let k = w / (4.0 * a);
    let kp = 4.0 * a / w;
    let a_e = (kp * ti).exp();
    let e_n = (kp * phi / w).exp();
    let t_mod = ti - k * 0.005f64.ln();

    let steps = w * w * (((kp * t_mod).exp() + a_e).ln() - (a_e + 1.0).ln()) / (4.0 * a * phi);
    if !a_e.is_finite() || !e_n.is_finite() || !steps.is_finite() {
        return Err(PlannerError::RampOutOfRange);
    }
    let num_steps = (steps.round() as usize).max(2);

    let mut c = Vec::with_capacity(num_steps - 1);
    let mut en_i = e_n;
    for _ in 1..num_steps {
        let en_next = en_i * e_n;
        let cn = k * (((a_e + 1.0) * en_next - a_e) / ((a_e + 1.0) * en_i - a_e)).ln();
        c.push(cn);
        en_i = en_next;
    }
    Ok(c)
}

fn polynomial(v_mm_min: f64, w: f64, a: f64, phi: f64) -> Vec<f64> {
    debug!("generating polynomial ramp profile [v_max={v_mm_min}]");
    // Segment target velocities: concave to w/4, linear to 3w/4, convex to w.
    let v1 = w / 4.0;
    let v2 = 3.0 * w / 4.0;
    let v3 = w;
    let n1 = (v1 * v1 / (phi * a)).round() as usize;
    let n2 = n1 + (v2 * v2 / (2.0 * a * phi)).round() as usize;
    let n3 = (n2 + (2.0 * v3 * v3 * v3 / (phi * a * a)).round() as usize).max(1);

    let mut c = Vec::with_capacity(n3);
    for i in 0..n3 {
        let cn = if i < n1 {
            // Concave period: acceleration rises linearly with progress.
            let ai = (i as f64 + 1.0) / (n1 as f64 + 1.0) * a;
            let c0 = (2.0 * phi / ai).cbrt();
            c0 * (((i + 1) as f64).cbrt() - (i as f64).cbrt())
        } else if i < n2 {
            // Linear period: the constant-acceleration formula continues.
            let c0 = (2.0 * phi / a).sqrt();
            c0 * (((i + 1) as f64).sqrt() - (i as f64).sqrt())
        } else {
            // Convex period: acceleration tapers back toward zero.
            let ai = (n3 - (i - n2)) as f64 / n3 as f64 * a;
            let c0 = (2.0 * phi / ai).cbrt();
            c0 * (((i + 1) as f64).cbrt() - (i as f64).cbrt())
        };
        c.push(cn);
    }
    c
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct RampKey {
    kind: RampKind,
    v: u64,
    a: u64,
    step_angle: u64,
    mode: u32,
    lead: u64,
}

/// Memoization table for ramp profiles.
///
/// Generation is pure, so a profile is computed at most once per
/// (variant, velocity, acceleration, geometry) key and shared thereafter.
#[derive(Debug, Default)]
pub struct RampCache {
    profiles: HashMap<RampKey, Arc<[f64]>>,
}

impl RampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the memoized profile for the key, generating it on first use.
    pub fn profile(
        &mut self,
        kind: RampKind,
        v_mm_min: f64,
        accel_mm_s2: f64,
        step_angle_deg: f64,
        mode: u32,
        lead_mm: f64,
    ) -> Result<Arc<[f64]>, PlannerError> {
        let key = RampKey {
            kind,
            v: v_mm_min.to_bits(),
            a: accel_mm_s2.to_bits(),
            step_angle: step_angle_deg.to_bits(),
            mode,
            lead: lead_mm.to_bits(),
        };
        if let Some(profile) = self.profiles.get(&key) {
            return Ok(profile.clone());
        }
        let profile: Arc<[f64]> =
            generate(kind, v_mm_min, accel_mm_s2, step_angle_deg, mode, lead_mm)?.into();
        self.profiles.insert(key, profile.clone());
        Ok(profile)
    }
}
