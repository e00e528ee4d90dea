//! Planner scenario tests.
//!
//! All scenarios use the reference axis geometry: 1.8 deg full-step motors,
//! half stepping, 5 mm lead screws — 80 steps/mm, so a pulse rate of
//! 200 pulses/s corresponds to 150 mm/min.

use motion::ramp::{self, RampKind};
use motion::{ArcArgs, AxisParams, MotionPlanner, Plane, PlannerError, PulseSequence};

fn axis(traversal_pps: f64, ramp: RampKind) -> AxisParams {
    AxisParams {
        step_angle: 1.8,
        mode: 2,
        lead: 5.0,
        // 80 steps/mm: pps * 60 / 80 converts a pulse rate to mm/min.
        traversal_rate: traversal_pps * 60.0 / 80.0,
        feed_rate: 120.0,
        acceleration: 100.0,
        ramp,
    }
}

fn planner(ramp: RampKind) -> MotionPlanner {
    MotionPlanner::new([
        axis(200.0, ramp),
        axis(100.0, ramp),
        axis(50.0, ramp),
    ])
}

fn total_time(seq: &PulseSequence) -> f64 {
    seq.iter().map(|p| p.delay).sum()
}

#[test]
fn rapid_move_shapes_and_ramp_heads() {
    // 8 / 4 / 3 steps at 200 / 100 / 50 pulses/s.
    let mut mp = planner(RampKind::Sigmoidal);
    let plan = mp.plan_move([0.1, 0.05, 0.0375]).unwrap();

    assert_eq!(plan[0].len(), 8);
    assert_eq!(plan[1].len(), 4);
    assert_eq!(plan[2].len(), 3);

    for seq in &plan {
        assert!(seq.iter().all(|p| p.direction == 1));
        assert!(seq.iter().all(|p| p.delay > 0.0));
        // Head and tail are mirror images.
        for i in 0..seq.len() {
            let mirrored = seq[seq.len() - 1 - i].delay;
            assert!((seq[i].delay - mirrored).abs() < 1e-15);
        }
    }

    // The head of the X sequence is the first entry of its sigmoidal ramp.
    let profile = ramp::generate(RampKind::Sigmoidal, 150.0, 100.0, 1.8, 2, 5.0).unwrap();
    assert_eq!(plan[0][0].delay, profile[0]);
}

#[test]
fn rapid_move_ramps_up_cruises_and_ramps_down() {
    let mut mp = planner(RampKind::Trapezoidal);
    // 10 mm is 800 steps, far longer than twice the ramp.
    let plan = mp.plan_move([10.0, 0.0, 0.0]).unwrap();
    let seq = &plan[0];
    assert_eq!(seq.len(), 800);
    assert!(plan[1].is_empty());
    assert!(plan[2].is_empty());

    let profile = ramp::generate(RampKind::Trapezoidal, 150.0, 100.0, 1.8, 2, 5.0).unwrap();
    let ramp_len = profile.len();
    assert!(2 * ramp_len < 800);

    // Head matches the profile.
    for i in 0..ramp_len {
        assert_eq!(seq[i].delay, profile[i]);
    }
    // Cruise plateau equals the profile's final interval.
    let cruise = *profile.last().unwrap();
    for pulse in &seq[ramp_len..800 - ramp_len] {
        assert_eq!(pulse.delay, cruise);
    }
    // Tail mirrors the head.
    for i in 0..ramp_len {
        assert_eq!(seq[799 - i].delay, profile[i]);
    }
}

#[test]
fn reversed_deltas_flip_only_directions() {
    let mut mp = planner(RampKind::Trapezoidal);
    let fwd = mp.plan_move([0.5, -0.25, 0.1]).unwrap();
    let rev = mp.plan_move([-0.5, 0.25, -0.1]).unwrap();

    for (f, r) in fwd.iter().zip(&rev) {
        assert_eq!(f.len(), r.len());
        for (pf, pr) in f.iter().zip(r) {
            assert_eq!(pf.direction, -pr.direction);
            assert_eq!(pf.delay, pr.delay);
        }
    }
}

#[test]
fn interpolated_line_per_axis_time_bases() {
    // 8 x-steps and 4 y-steps in 0.04 s total: 200 and 100 pulses/s.
    let mut mp = planner(RampKind::Sigmoidal);
    let path = 0.1f64.hypot(0.05);
    let feed = path * 60.0 / 0.04;
    let plan = mp.plan_interpolated_line(Plane::Xy, 0.1, 0.05, feed).unwrap();

    assert_eq!(plan[0].len(), 8);
    assert_eq!(plan[1].len(), 4);
    assert!(plan[2].is_empty());
    for p in &plan[0] {
        assert_eq!(p.direction, 1);
        assert!((p.delay - 0.005).abs() < 1e-9);
    }
    for p in &plan[1] {
        assert_eq!(p.direction, 1);
        assert!((p.delay - 0.010).abs() < 1e-9);
    }
    assert!((total_time(&plan[0]) - total_time(&plan[1])).abs() < 1e-9);
}

#[test]
fn interpolated_line_durations_agree_within_one_step_period() {
    let mut mp = planner(RampKind::Sigmoidal);
    // 0.07 mm is 5.6 steps and rounds to 6: the duration mismatch must stay
    // below one step period of the slower axis.
    let plan = mp
        .plan_interpolated_line(Plane::Xz, -0.2, 0.07, 90.0)
        .unwrap();

    assert_eq!(plan[0].len(), 16);
    assert_eq!(plan[2].len(), 6);
    assert!(plan[1].is_empty());
    assert!(plan[0].iter().all(|p| p.direction == -1));
    assert!(plan[2].iter().all(|p| p.direction == 1));

    let period = plan[0][0].delay.max(plan[2][0].delay);
    assert!((total_time(&plan[0]) - total_time(&plan[2])).abs() < period);
}

#[test]
fn line_with_zero_feed_is_invalid() {
    let mut mp = planner(RampKind::Sigmoidal);
    assert!(matches!(
        mp.plan_interpolated_line(Plane::Xy, 1.0, 1.0, 0.0),
        Err(PlannerError::InvalidFeedRate(_))
    ));
}

#[test]
fn full_circle_scenario() {
    // r = 10 steps, 100 pulses/s on both axes (75 mm/min at 80 steps/mm).
    let mut mp = MotionPlanner::new([
        axis(100.0, RampKind::Sigmoidal),
        axis(100.0, RampKind::Sigmoidal),
        axis(100.0, RampKind::Sigmoidal),
    ]);
    let arc = ArcArgs {
        radius_mm: 0.125,
        end_mm: Some((0.0, 0.0)),
        feed_rate: 75.0,
        clockwise: true,
    };
    let plan = mp.plan_interpolated_arc(Plane::Xy, &arc).unwrap();
    let (sx, sy) = (&plan[0], &plan[1]);

    assert_eq!(sx.len(), 40);
    assert_eq!(sy.len(), 40);
    assert!(plan[2].is_empty());

    // First pulses: x sweeps acos(9/10), y sweeps asin(1/10), both at
    // r/v = 0.1 s per radian.
    assert_eq!(sx[0].direction, 1);
    assert!((sx[0].delay - 0.1 * (0.9f64).acos()).abs() < 1e-4);
    assert_eq!(sy[0].direction, 1);
    assert!((sy[0].delay - 0.1 * (0.1f64).asin()).abs() < 1e-4);

    for seq in [sx, sy] {
        // Every interval is positive and the sequence is symmetric about its
        // midpoint.
        assert!(seq.iter().all(|p| p.delay > 0.0));
        for i in 0..seq.len() {
            let mirrored = seq[seq.len() - 1 - i].delay;
            assert!((seq[i].delay - mirrored).abs() < 1e-9);
        }
        // Cumulative position returns to the origin.
        let net: i64 = seq.iter().map(|p| p.direction as i64).sum();
        assert_eq!(net, 0);
        // A full circle at 100 pulses/s with r = 10 steps takes 2*pi*r/v.
        assert!((total_time(seq) - 0.2 * std::f64::consts::PI).abs() < 1e-9);
    }
}

#[test]
fn counter_clockwise_mirrors_the_v_axis() {
    let mut mp = planner(RampKind::Sigmoidal);
    let cw = ArcArgs {
        radius_mm: 0.125,
        end_mm: Some((0.0, 0.0)),
        feed_rate: 75.0,
        clockwise: true,
    };
    let ccw = ArcArgs { clockwise: false, ..cw };

    let plan_cw = mp.plan_interpolated_arc(Plane::Xy, &cw).unwrap();
    let plan_ccw = mp.plan_interpolated_arc(Plane::Xy, &ccw).unwrap();

    assert_eq!(plan_cw[0], plan_ccw[0]);
    assert_eq!(plan_cw[1].len(), plan_ccw[1].len());
    for (a, b) in plan_cw[1].iter().zip(&plan_ccw[1]) {
        assert_eq!(a.direction, -b.direction);
        assert_eq!(a.delay, b.delay);
    }
}

#[test]
fn arc_terminates_at_end_point() {
    // Quarter circle: from the start to (r, r) in plane coordinates.
    let mut mp = planner(RampKind::Sigmoidal);
    let arc = ArcArgs {
        radius_mm: 0.125,
        end_mm: Some((0.125, 0.125)),
        feed_rate: 75.0,
        clockwise: true,
    };
    let plan = mp.plan_interpolated_arc(Plane::Xy, &arc).unwrap();
    assert_eq!(plan[0].len(), 10);
    assert_eq!(plan[1].len(), 10);
    let net_u: i64 = plan[0].iter().map(|p| p.direction as i64).sum();
    let net_v: i64 = plan[1].iter().map(|p| p.direction as i64).sum();
    assert_eq!(net_u, 10);
    assert_eq!(net_v, 10);
}

#[test]
fn arc_on_non_default_plane_lands_on_its_axes() {
    let mut mp = planner(RampKind::Sigmoidal);
    let arc = ArcArgs {
        radius_mm: 0.05,
        end_mm: Some((0.0, 0.0)),
        feed_rate: 75.0,
        clockwise: false,
    };
    let plan = mp.plan_interpolated_arc(Plane::Yz, &arc).unwrap();
    assert!(plan[0].is_empty());
    assert_eq!(plan[1].len(), 16);
    assert_eq!(plan[2].len(), 16);
}

#[test]
fn degenerate_arc_is_rejected() {
    let mut mp = planner(RampKind::Sigmoidal);
    let arc = ArcArgs {
        radius_mm: 0.0,
        end_mm: None,
        feed_rate: 75.0,
        clockwise: true,
    };
    assert!(matches!(
        mp.plan_interpolated_arc(Plane::Xy, &arc),
        Err(PlannerError::DegenerateArc(_))
    ));
}

#[test]
fn planning_is_deterministic() {
    let mut mp1 = planner(RampKind::Trapezoidal);
    let mut mp2 = planner(RampKind::Trapezoidal);
    let a = mp1.plan_move([3.2, -1.1, 0.4]).unwrap();
    let b = mp2.plan_move([3.2, -1.1, 0.4]).unwrap();
    assert_eq!(a, b);
}
