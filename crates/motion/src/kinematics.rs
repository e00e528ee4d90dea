//! Unit and kinematic conversions.
//!
//! Pure functions shared by the ramp generator and the planner. Linear
//! quantities are millimeters and mm/min; angular quantities are radians,
//! rad/s and rad/s² as seen by the motor shaft.

use std::f64::consts::PI;

/// Steps per revolution for a motor with the given full-step angle (degrees)
/// under microstepping divisor `mode`.
pub fn steps_per_rev(step_angle_deg: f64, mode: u32) -> f64 {
    360.0 / step_angle_deg * mode as f64
}

/// Shaft rotation per (micro)step, in radians.
pub fn step_angle_rad(step_angle_deg: f64, mode: u32) -> f64 {
    2.0 * PI / steps_per_rev(step_angle_deg, mode)
}

/// Convert a linear distance to a signed (micro)step count.
///
/// Rounds half away from zero and preserves sign, so
/// `mm_to_steps(-d, ..) == -mm_to_steps(d, ..)`.
pub fn mm_to_steps(distance_mm: f64, step_angle_deg: f64, mode: u32, lead_mm: f64) -> i64 {
    (distance_mm * mode as f64 * 360.0 / step_angle_deg / lead_mm).round() as i64
}

/// Inverse of [`mm_to_steps`] (exact on whole-step multiples).
pub fn steps_to_mm(steps: i64, step_angle_deg: f64, mode: u32, lead_mm: f64) -> f64 {
    steps as f64 * step_angle_deg * lead_mm / (mode as f64 * 360.0)
}

/// Convert an axis speed in mm/min to a step pulse rate in pulses/second.
pub fn mm_per_min_to_pps(v_mm_min: f64, step_angle_deg: f64, mode: u32, lead_mm: f64) -> f64 {
    v_mm_min / lead_mm / 60.0 * mode as f64 * 360.0 / step_angle_deg
}

/// Target angular velocity of the shaft in rad/s for an axis speed in mm/min.
pub fn angular_velocity(v_mm_min: f64, step_angle_deg: f64, mode: u32, lead_mm: f64) -> f64 {
    let spr = steps_per_rev(step_angle_deg, mode);
    v_mm_min / 60.0 * (spr / lead_mm) * step_angle_rad(step_angle_deg, mode)
}

/// Angular acceleration of the shaft in rad/s² for a linear acceleration in mm/s².
pub fn angular_acceleration(a_mm_s2: f64, step_angle_deg: f64, mode: u32, lead_mm: f64) -> f64 {
    let spr = steps_per_rev(step_angle_deg, mode);
    a_mm_s2 * (spr / lead_mm) * step_angle_rad(step_angle_deg, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_counts_match_axis_geometry() {
        assert_eq!(mm_to_steps(100.0, 1.8, 1, 5.0), 4000);
        assert_eq!(mm_to_steps(5.0, 1.8, 2, 5.0), 400);
        assert_eq!(mm_to_steps(23.0, 1.8, 4, 5.0), 3680);
    }

    #[test]
    fn step_counts_preserve_sign() {
        assert_eq!(mm_to_steps(-40.0, 1.8, 1, 5.0), -1600);
        assert_eq!(
            mm_to_steps(-12.345, 1.8, 2, 5.0),
            -mm_to_steps(12.345, 1.8, 2, 5.0)
        );
    }

    #[test]
    fn round_trip_on_whole_steps() {
        let mm = steps_to_mm(400, 1.8, 2, 5.0);
        assert_eq!(mm_to_steps(mm, 1.8, 2, 5.0), 400);
        assert!((mm - 5.0).abs() < 1e-12);
    }

    #[test]
    fn pulse_rate_conversion() {
        // 150 mm/min at 80 steps/mm is 200 pulses/s.
        let pps = mm_per_min_to_pps(150.0, 1.8, 2, 5.0);
        assert!((pps - 200.0).abs() < 1e-9);
    }

    #[test]
    fn angular_conversions_are_consistent() {
        // omega == pps * phi by definition.
        let phi = step_angle_rad(1.8, 2);
        let w = angular_velocity(150.0, 1.8, 2, 5.0);
        let pps = mm_per_min_to_pps(150.0, 1.8, 2, 5.0);
        assert!((w - pps * phi).abs() < 1e-12);
    }
}
