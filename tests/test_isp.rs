// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_isp::isp::{
    apply_gains, compute_filter_gain, compute_gains, is_adjusted, mean_skewness, AwbGains,
    ChannelStats, ExposureController, ExposureSearchState, GlobalStats,
};

fn stats(skewness: [f32; 3], percentile: [f32; 3]) -> GlobalStats {
    GlobalStats([0, 1, 2].map(|i| ChannelStats {
        skewness: skewness[i],
        percentile: percentile[i],
    }))
}

/// Scene where skewness rises linearly with exposure and is balanced at
/// `target`.
fn scene(exposure: f32, target: f32) -> f32 {
    ((exposure - target) / 50.0).clamp(-1.0, 1.0)
}

#[test]
fn test_mean_skewness() {
    let s = stats([0.3, -0.6, 0.9], [100.0; 3]);
    assert!((mean_skewness(&s) - 0.2).abs() < 1e-6);
}

#[test]
fn test_is_adjusted() {
    assert!(is_adjusted(0.0));
    assert!(is_adjusted(0.09));
    assert!(is_adjusted(-0.09));
    assert!(!is_adjusted(0.1));
    assert!(!is_adjusted(-0.1));
    assert!(!is_adjusted(f32::NAN));
}

#[test]
fn test_initial_bracket() {
    let ae = ExposureController::new();
    assert_eq!(
        *ae.state(),
        ExposureSearchState {
            low_bound: 0.0,
            low_skew: -1.0,
            high_bound: 80.0,
            high_skew: 1.0,
            sample_count: 0,
        }
    );
}

#[test]
fn test_bracket_update() {
    let mut ae = ExposureController::new();

    // dark sample replaces the low end
    let next = ae.next_exposure(20.0, -0.5);
    assert_eq!(ae.state().low_bound, 20.0);
    assert_eq!(ae.state().low_skew, -0.5);
    assert_eq!(ae.state().high_bound, 80.0);
    assert!((next - 40.0).abs() < 1e-4);

    // bright sample replaces the high end
    ae.next_exposure(60.0, 0.5);
    assert_eq!(ae.state().high_bound, 60.0);
    assert_eq!(ae.state().high_skew, 0.5);
    assert_eq!(ae.state().low_bound, 20.0);
}

#[test]
fn test_zero_skewness_holds_exposure() {
    let mut ae = ExposureController::new();
    assert_eq!(ae.next_exposure(35.0, 0.0), 35.0);
}

#[test]
fn test_converges() {
    for target in [12.0, 30.0, 55.0, 70.0] {
        let mut ae = ExposureController::new();
        let mut exposure = 10.0;
        let mut converged = false;

        for _ in 0..5 {
            let skew = scene(exposure, target);
            if is_adjusted(skew) {
                converged = true;
                break;
            }
            exposure = ae.next_exposure(exposure, skew);
        }
        converged |= is_adjusted(scene(exposure, target));
        assert!(converged, "target {} ended at {}", target, exposure);
    }
}

#[test]
fn test_restart_after_five_samples() {
    let mut ae = ExposureController::new();
    for (exposure, skew) in [(5.0, -0.9), (70.0, 0.8), (30.0, -0.2), (50.0, 0.4), (40.0, 0.1)] {
        ae.next_exposure(exposure, skew);
    }
    assert_eq!(ae.state().sample_count, 5);

    let mut fresh = ExposureController::new();
    assert_eq!(ae.next_exposure(25.0, -0.3), fresh.next_exposure(25.0, -0.3));
    assert_eq!(ae.state(), fresh.state());
}

#[test]
fn test_reset() {
    let mut ae = ExposureController::new();
    ae.next_exposure(20.0, -0.5);
    ae.reset();
    assert_eq!(*ae.state(), ExposureSearchState::default());
}

#[test]
fn test_non_finite_samples() {
    let mut ae = ExposureController::new();
    assert_eq!(ae.next_exposure(20.0, f32::NAN), 80.0);
    assert_eq!(*ae.state(), ExposureSearchState {
        sample_count: 1,
        ..Default::default()
    });

    // a broken exposure reading never comes back out
    let mut ae = ExposureController::new();
    ae.next_exposure(30.0, 0.5);
    assert_eq!(ae.next_exposure(f32::NAN, 0.5), 30.0);
    assert_eq!(ae.next_exposure(f32::INFINITY, -0.5), 30.0);
    assert!(ae.next_exposure(f32::NEG_INFINITY, f32::INFINITY).is_finite());
    assert_eq!(ae.state().high_bound, 30.0);
    assert_eq!(ae.state().low_bound, 0.0);

    for i in 0..20 {
        let next = ae.next_exposure(i as f32 * 4.0, if i % 2 == 0 { -1.0 } else { 1.0 });
        assert!(next.is_finite());
    }
}

#[test]
fn test_awb_gains() {
    let gains = compute_gains(&stats([0.0; 3], [127.0; 3]));
    assert_eq!(
        gains,
        AwbGains {
            red: 2.0,
            green: 2.0,
            blue: 2.0
        }
    );
    assert_eq!(gains.to_string(), "awb:2,2,2");

    let gains = compute_gains(&stats([0.0; 3], [254.0, 127.0, 63.5]));
    assert_eq!(gains.red, 1.0);
    assert_eq!(gains.green, 2.0);
    assert_eq!(gains.blue, 4.0);
}

#[test]
fn test_filter_gain() {
    assert_eq!(compute_filter_gain(0, 1.0), 0);
    assert_eq!(compute_filter_gain(127, 1.6), 127);
    // factors below 1.0 clamp up
    assert_eq!(compute_filter_gain(0, 0.5), 0);
    assert_eq!(compute_filter_gain(-20, 0.0), -20);
    // factors above 1.6 clamp down: 1.6 * 128 - 128
    assert_eq!(compute_filter_gain(0, 2.0), 76);
    assert_eq!(compute_filter_gain(0, 1.6), 76);
    // offset coefficient of zero saturates low
    assert_eq!(compute_filter_gain(-128, 1.2), -128);
    assert_eq!(compute_filter_gain(100, 1.5), 127);
}

#[test]
fn test_apply_gains() {
    let mut rgb = [100, 100, 100, 200, 10, 0];
    apply_gains(
        &mut rgb,
        &AwbGains {
            red: 2.0,
            green: 1.0,
            blue: 0.5,
        },
    );
    assert_eq!(rgb, [200, 100, 50, 255, 10, 0]);
}
