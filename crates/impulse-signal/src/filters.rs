// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cascaded IIR filter bank applied to each analysis window.
//!
//! Biquads use the RBJ audio-EQ cookbook designs in transposed direct form II,
//! evaluated in `f64`. A `band_pass` setting expands to a Butterworth-Q
//! high-pass at the lower edge followed by a low-pass at the upper edge.
//!
//! Filter memory carries across windows. When windows overlap, memory is only
//! advanced over the first `hop` samples of each window, so the next window
//! resumes exactly where a continuous stream would be and every window sees
//! the same output a sample-by-sample filter would have produced.

use crate::SignalError;
use impulse_config::{CalibrationProfile, FilterStageSettings};
use impulse_structures::Window;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Normalised biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

struct Prewarp {
    cos_w0: f64,
    alpha: f64,
}

fn prewarp(sampling_rate_hz: f64, frequency_hz: f64, q: f64) -> Prewarp {
    let w0 = 2.0 * PI * frequency_hz / sampling_rate_hz;
    Prewarp {
        cos_w0: w0.cos(),
        alpha: w0.sin() / (2.0 * q),
    }
}

impl BiquadCoefficients {
    fn normalised(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        BiquadCoefficients {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    pub fn notch(sampling_rate_hz: f64, frequency_hz: f64, q: f64) -> Self {
        let Prewarp { cos_w0, alpha } = prewarp(sampling_rate_hz, frequency_hz, q);
        Self::normalised(1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    pub fn high_pass(sampling_rate_hz: f64, cutoff_hz: f64) -> Self {
        let Prewarp { cos_w0, alpha } = prewarp(sampling_rate_hz, cutoff_hz, FRAC_1_SQRT_2);
        let b = (1.0 + cos_w0) / 2.0;
        Self::normalised(b, -(1.0 + cos_w0), b, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    pub fn low_pass(sampling_rate_hz: f64, cutoff_hz: f64) -> Self {
        let Prewarp { cos_w0, alpha } = prewarp(sampling_rate_hz, cutoff_hz, FRAC_1_SQRT_2);
        let b = (1.0 - cos_w0) / 2.0;
        Self::normalised(b, 1.0 - cos_w0, b, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
    }

    /// Magnitude response at `frequency_hz`
    pub fn gain_at(&self, sampling_rate_hz: f64, frequency_hz: f64) -> f64 {
        let w = 2.0 * PI * frequency_hz / sampling_rate_hz;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterStage {
    Biquad {
        coefficients: BiquadCoefficients,
        z1: f64,
        z2: f64,
    },
    DcBlock {
        pole: f64,
        prev_in: f64,
        prev_out: f64,
    },
}

impl FilterStage {
    fn biquad(coefficients: BiquadCoefficients) -> Self {
        FilterStage::Biquad {
            coefficients,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        match self {
            FilterStage::Biquad { coefficients: c, z1, z2 } => {
                let y = c.b0 * x + *z1;
                *z1 = c.b1 * x - c.a1 * y + *z2;
                *z2 = c.b2 * x - c.a2 * y;
                y
            }
            FilterStage::DcBlock {
                pole,
                prev_in,
                prev_out,
            } => {
                let y = x - *prev_in + *pole * *prev_out;
                *prev_in = x;
                *prev_out = y;
                y
            }
        }
    }

    fn reset(&mut self) {
        match self {
            FilterStage::Biquad { z1, z2, .. } => {
                *z1 = 0.0;
                *z2 = 0.0;
            }
            FilterStage::DcBlock {
                prev_in, prev_out, ..
            } => {
                *prev_in = 0.0;
                *prev_out = 0.0;
            }
        }
    }

    fn gain_at(&self, sampling_rate_hz: f64, frequency_hz: f64) -> f64 {
        match self {
            FilterStage::Biquad { coefficients, .. } => {
                coefficients.gain_at(sampling_rate_hz, frequency_hz)
            }
            FilterStage::DcBlock { pole, .. } => {
                let w = 2.0 * PI * frequency_hz / sampling_rate_hz;
                let num = (1.0 - w.cos()).hypot(w.sin());
                let den = (1.0 - pole * w.cos()).hypot(pole * w.sin());
                num / den
            }
        }
    }
}

fn build_stages(
    settings: &FilterStageSettings,
    sampling_rate_hz: f64,
    stages: &mut Vec<FilterStage>,
) -> Result<(), SignalError> {
    let nyquist = sampling_rate_hz / 2.0;
    let check_frequency = |hz: f64| -> Result<(), SignalError> {
        if hz.is_finite() && hz > 0.0 && hz < nyquist {
            Ok(())
        } else {
            Err(SignalError::InvalidFilter(format!(
                "{} stage frequency {} Hz must lie in (0, {}) Hz",
                settings.kind(),
                hz,
                nyquist
            )))
        }
    };

    match *settings {
        FilterStageSettings::Notch { frequency_hz, q } => {
            check_frequency(frequency_hz)?;
            if !(q.is_finite() && q > 0.0) {
                return Err(SignalError::InvalidFilter(format!("notch q {} must be positive", q)));
            }
            stages.push(FilterStage::biquad(BiquadCoefficients::notch(
                sampling_rate_hz,
                frequency_hz,
                q,
            )));
        }
        FilterStageSettings::BandPass { low_hz, high_hz } => {
            check_frequency(low_hz)?;
            check_frequency(high_hz)?;
            if low_hz >= high_hz {
                return Err(SignalError::InvalidFilter(format!(
                    "band-pass low edge {} Hz must be below high edge {} Hz",
                    low_hz, high_hz
                )));
            }
            stages.push(FilterStage::biquad(BiquadCoefficients::high_pass(
                sampling_rate_hz,
                low_hz,
            )));
            stages.push(FilterStage::biquad(BiquadCoefficients::low_pass(
                sampling_rate_hz,
                high_hz,
            )));
        }
        FilterStageSettings::HighPass { cutoff_hz } => {
            check_frequency(cutoff_hz)?;
            stages.push(FilterStage::biquad(BiquadCoefficients::high_pass(
                sampling_rate_hz,
                cutoff_hz,
            )));
        }
        FilterStageSettings::DcBlock { pole } => {
            if !(pole > 0.0 && pole < 1.0) {
                return Err(SignalError::InvalidFilter(format!(
                    "dc-block pole {} must lie in (0, 1)",
                    pole
                )));
            }
            stages.push(FilterStage::DcBlock {
                pole,
                prev_in: 0.0,
                prev_out: 0.0,
            });
        }
        FilterStageSettings::Biquad { b0, b1, b2, a1, a2 } => {
            if ![b0, b1, b2, a1, a2].iter().all(|c| c.is_finite()) {
                return Err(SignalError::InvalidFilter(
                    "biquad coefficients must be finite".into(),
                ));
            }
            stages.push(FilterStage::biquad(BiquadCoefficients { b0, b1, b2, a1, a2 }));
        }
    }
    Ok(())
}

/// Ordered cascade of filter stages with memory that persists across windows
#[derive(Debug, Clone)]
pub struct FilterBank {
    stages: Vec<FilterStage>,
    checkpoint: Vec<FilterStage>,
    sampling_rate_hz: f64,
    hop: usize,
}

impl FilterBank {
    pub fn new(
        settings: &[FilterStageSettings],
        sampling_rate_hz: f64,
        hop: usize,
    ) -> Result<Self, SignalError> {
        if !(sampling_rate_hz.is_finite() && sampling_rate_hz > 0.0) {
            return Err(SignalError::InvalidFilter(format!(
                "sampling rate {} Hz must be positive",
                sampling_rate_hz
            )));
        }
        if hop == 0 {
            return Err(SignalError::InvalidWindowGeometry("hop must be at least 1".into()));
        }

        let mut stages = Vec::with_capacity(settings.len() + 1);
        for stage in settings {
            build_stages(stage, sampling_rate_hz, &mut stages)?;
        }
        Ok(FilterBank {
            checkpoint: stages.clone(),
            stages,
            sampling_rate_hz,
            hop,
        })
    }

    pub fn from_profile(profile: &CalibrationProfile) -> Result<Self, SignalError> {
        Self::new(&profile.filters, profile.sampling_rate_hz, profile.window.hop)
    }

    /// Filter a window in place. The returned window has the same length.
    pub fn apply(&mut self, mut window: Window) -> Window {
        self.apply_in_place(&mut window);
        window
    }

    pub fn apply_in_place(&mut self, window: &mut Window) {
        if self.stages.is_empty() {
            return;
        }
        let len = window.len();
        for (index, value) in window.values_mut().iter_mut().enumerate() {
            let mut x = f64::from(*value);
            for stage in self.stages.iter_mut() {
                x = stage.process(x);
            }
            *value = x as f32;

            if index + 1 == self.hop && self.hop < len {
                self.checkpoint.copy_from_slice(&self.stages);
            }
        }
        if self.hop < len {
            self.stages.copy_from_slice(&self.checkpoint);
        }
    }

    /// Zero all filter memory (profile change or reconnect)
    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
        self.checkpoint.copy_from_slice(&self.stages);
    }

    /// Number of primitive stages after expansion
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Combined magnitude response of the cascade at `frequency_hz`
    pub fn gain_at(&self, frequency_hz: f64) -> f64 {
        self.stages
            .iter()
            .map(|s| s.gain_at(self.sampling_rate_hz, frequency_hz))
            .product()
    }
}
