// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Auto exposure and auto white balance control.
//!
//! Both controllers consume per-channel histogram statistics computed
//! elsewhere in the pipeline; neither looks at pixels.

use core::fmt;
use tracing::trace;

/// Mean skewness within this margin of zero counts as correctly exposed.
pub const AE_MARGIN: f32 = 0.1;

/// The exposure search is restarted from the initial bracket after this
/// many samples.
pub const AE_RESTART_SAMPLES: u8 = 5;

/// Lower end of the initial exposure bracket.
pub const AE_EXPOSURE_MIN: f32 = 0.0;

/// Upper end of the initial exposure bracket.
pub const AE_EXPOSURE_MAX: f32 = 80.0;

/// Percentile value each channel is scaled up to by the white balance.
pub const AWB_CEILING: f32 = 254.0;

const FILTER_GAIN_MIN: f32 = 1.0;
const FILTER_GAIN_MAX: f32 = 1.6;

/// Histogram statistics for a single color channel.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ChannelStats {
    pub skewness: f32,
    pub percentile: f32,
}

/// Statistics for the red, green and blue channels, in that order.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct GlobalStats(pub [ChannelStats; 3]);

impl GlobalStats {
    pub fn red(&self) -> &ChannelStats {
        &self.0[0]
    }

    pub fn green(&self) -> &ChannelStats {
        &self.0[1]
    }

    pub fn blue(&self) -> &ChannelStats {
        &self.0[2]
    }
}

/// Arithmetic mean of the three channel skewness values.
pub fn mean_skewness(stats: &GlobalStats) -> f32 {
    stats.0.iter().map(|c| c.skewness).sum::<f32>() / 3.0
}

/// True when the skewness is strictly inside the exposure margin.
pub fn is_adjusted(skewness: f32) -> bool {
    skewness < AE_MARGIN && skewness > -AE_MARGIN
}

/// Bracket of the exposure root search.
///
/// `low_skew` and `high_skew` keep opposite signs as long as the root lies
/// inside the initial bracket.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ExposureSearchState {
    pub low_bound: f32,
    pub low_skew: f32,
    pub high_bound: f32,
    pub high_skew: f32,
    pub sample_count: u8,
}

impl Default for ExposureSearchState {
    fn default() -> Self {
        Self {
            low_bound: AE_EXPOSURE_MIN,
            low_skew: -1.0,
            high_bound: AE_EXPOSURE_MAX,
            high_skew: 1.0,
            sample_count: 0,
        }
    }
}

/// Secant-method exposure controller treating skewness as the residual.
///
/// The caller owns the controller and feeds it one sample per frame. Every
/// [`AE_RESTART_SAMPLES`] samples the bracket is discarded so a stale
/// bracket from noise or a scene change cannot persist.
///
/// # Example
///
/// ```
/// use edgefirst_isp::isp::{is_adjusted, ExposureController};
///
/// let mut ae = ExposureController::new();
/// // underexposed: the histogram leans dark
/// let next = ae.next_exposure(20.0, -0.5);
/// assert!(next > 20.0 && next < 80.0);
/// assert!(!is_adjusted(-0.5));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ExposureController {
    state: ExposureSearchState,
}

impl ExposureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ExposureSearchState {
        &self.state
    }

    /// Drops the bracket and starts over from the initial one.
    pub fn reset(&mut self) {
        self.state = ExposureSearchState::default();
    }

    /// Folds the measured sample into the bracket and returns the next
    /// exposure to try.
    ///
    /// A non-finite sample is not usable: the bracket is left alone and
    /// the high end is returned, so the result is always finite. Equal
    /// residuals at both ends leave the secant undefined, in which case the
    /// high end is returned as well.
    pub fn next_exposure(&mut self, exposure: f32, skewness: f32) -> f32 {
        if self.state.sample_count >= AE_RESTART_SAMPLES {
            trace!("restarting exposure search");
            self.reset();
        }
        self.state.sample_count += 1;

        if !skewness.is_finite() || !exposure.is_finite() {
            return self.state.high_bound;
        }

        let s = &mut self.state;
        if sign(skewness) == sign(s.low_skew) {
            s.low_bound = exposure;
            s.low_skew = skewness;
        } else {
            s.high_bound = exposure;
            s.high_skew = skewness;
        }

        let denom = s.high_skew - s.low_skew;
        if denom == 0.0 {
            return s.high_bound;
        }
        let next = s.high_bound - s.high_skew * ((s.high_bound - s.low_bound) / denom);
        if next.is_finite() {
            next
        } else {
            s.high_bound
        }
    }
}

fn sign(x: f32) -> i8 {
    (x > 0.0) as i8 - (x < 0.0) as i8
}

/// Per-channel white balance multipliers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AwbGains {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl fmt::Display for AwbGains {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "awb:{},{},{}", self.red, self.green, self.blue)
    }
}

/// Scales each channel so its percentile lands on [`AWB_CEILING`].
///
/// No clamping happens here; see [`compute_filter_gain`].
pub fn compute_gains(stats: &GlobalStats) -> AwbGains {
    AwbGains {
        red: AWB_CEILING / stats.red().percentile,
        green: AWB_CEILING / stats.green().percentile,
        blue: AWB_CEILING / stats.blue().percentile,
    }
}

/// Applies a white balance factor to a signed 8-bit filter coefficient.
///
/// The factor is clamped to `[1.0, 1.6]`, the coefficient is offset into
/// `0..=255`, scaled, and shifted back. Results outside the signed range
/// saturate to `127` / `-128`.
pub fn compute_filter_gain(coeff: i8, factor: f32) -> i8 {
    let factor = if factor > FILTER_GAIN_MAX {
        FILTER_GAIN_MAX
    } else if factor <= FILTER_GAIN_MIN {
        FILTER_GAIN_MIN
    } else {
        factor
    };

    let result = factor * (coeff as f32 + 128.0);
    if result >= 255.0 {
        127
    } else if result <= 0.0 {
        -128
    } else {
        (result - 128.0) as i8
    }
}

/// Multiplies an interleaved RGB buffer by the white balance gains,
/// saturating at 255.
pub fn apply_gains(rgb: &mut [u8], gains: &AwbGains) {
    let g = [gains.red, gains.green, gains.blue];
    for px in rgb.chunks_exact_mut(3) {
        for (v, gain) in px.iter_mut().zip(g) {
            *v = (*v as f32 * gain).clamp(0.0, 255.0) as u8;
        }
    }
}
