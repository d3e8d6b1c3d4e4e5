// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-layout feature extraction from filtered windows.
//!
//! Output order: one power value per configured band, then variance,
//! zero-crossing rate and mean absolute value when enabled.
//!
//! Band power is the mean one-sided bin power over the DFT bins whose centre
//! frequency lies inside the band (edges inclusive). Each bin is evaluated
//! with the Goertzel recurrence and scaled so that a sinusoid of amplitude
//! `A` centred on a bin reads `A^2 / 2` in that bin.

use crate::SignalError;
use impulse_config::{CalibrationProfile, FeatureSettings};
use impulse_structures::{FeatureVector, Window};
use std::f64::consts::PI;

#[derive(Debug, Clone)]
struct GoertzelBin {
    coefficient: f64,
    /// 2 for interior bins, 1 for DC and Nyquist
    scale: f64,
}

impl GoertzelBin {
    fn power(&self, values: &[f32]) -> f64 {
        let (mut s1, mut s2) = (0.0f64, 0.0f64);
        for &x in values {
            let s0 = f64::from(x) + self.coefficient * s1 - s2;
            s2 = s1;
            s1 = s0;
        }
        let magnitude_sq = (s1 * s1 + s2 * s2 - self.coefficient * s1 * s2).max(0.0);
        let n = values.len() as f64;
        self.scale * magnitude_sq / (n * n)
    }
}

#[derive(Debug, Clone)]
struct BandPlan {
    bins: Vec<GoertzelBin>,
}

impl BandPlan {
    fn power(&self, values: &[f32]) -> f64 {
        let total: f64 = self.bins.iter().map(|bin| bin.power(values)).sum();
        total / self.bins.len() as f64
    }
}

/// Computes a [`FeatureVector`] from each window
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window_size: usize,
    bands: Vec<BandPlan>,
    include_variance: bool,
    include_zero_crossing_rate: bool,
    include_mean_absolute_value: bool,
    names: Vec<String>,
}

impl FeatureExtractor {
    pub fn new(
        settings: &FeatureSettings,
        sampling_rate_hz: f64,
        window_size: usize,
    ) -> Result<Self, SignalError> {
        if window_size < 2 {
            return Err(SignalError::InvalidWindowGeometry(format!(
                "window size {} must be at least 2",
                window_size
            )));
        }
        if !(sampling_rate_hz.is_finite() && sampling_rate_hz > 0.0) {
            return Err(SignalError::InvalidFeatures(format!(
                "sampling rate {} Hz must be positive",
                sampling_rate_hz
            )));
        }
        if settings.feature_len() == 0 {
            return Err(SignalError::InvalidFeatures("no features enabled".into()));
        }

        let resolution = sampling_rate_hz / window_size as f64;
        let nyquist_bin = window_size / 2;
        let mut bands = Vec::with_capacity(settings.bands.len());
        for band in &settings.bands {
            if !(band.low_hz >= 0.0 && band.low_hz < band.high_hz) {
                return Err(SignalError::InvalidFeatures(format!(
                    "band {}-{} Hz is empty",
                    band.low_hz, band.high_hz
                )));
            }
            let first = (band.low_hz / resolution).ceil() as usize;
            let last = ((band.high_hz / resolution).floor() as usize).min(nyquist_bin);
            if first > last {
                return Err(SignalError::InvalidFeatures(format!(
                    "band {}-{} Hz contains no frequency bin at {:.3} Hz resolution",
                    band.low_hz, band.high_hz, resolution
                )));
            }
            let bins = (first..=last)
                .map(|k| GoertzelBin {
                    coefficient: 2.0 * (2.0 * PI * k as f64 / window_size as f64).cos(),
                    scale: if k == 0 || (window_size % 2 == 0 && k == nyquist_bin) {
                        1.0
                    } else {
                        2.0
                    },
                })
                .collect();
            bands.push(BandPlan { bins });
        }

        Ok(FeatureExtractor {
            window_size,
            bands,
            include_variance: settings.include_variance,
            include_zero_crossing_rate: settings.include_zero_crossing_rate,
            include_mean_absolute_value: settings.include_mean_absolute_value,
            names: settings.feature_names(),
        })
    }

    pub fn from_profile(profile: &CalibrationProfile) -> Result<Self, SignalError> {
        Self::new(
            &profile.features,
            profile.sampling_rate_hz,
            profile.window.size,
        )
    }

    pub fn feature_len(&self) -> usize {
        self.names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Deterministic summary of one window.
    ///
    /// # Errors
    ///
    /// `InsufficientWindow` if the window length differs from the configured size.
    pub fn extract(&self, window: &Window) -> Result<FeatureVector, SignalError> {
        let values = window.values();
        if values.len() != self.window_size {
            return Err(SignalError::InsufficientWindow {
                expected: self.window_size,
                actual: values.len(),
            });
        }

        let mut features = Vec::with_capacity(self.feature_len());
        for band in &self.bands {
            features.push(band.power(values) as f32);
        }

        let n = values.len() as f64;
        if self.include_variance {
            let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
            let variance = values
                .iter()
                .map(|&v| {
                    let d = f64::from(v) - mean;
                    d * d
                })
                .sum::<f64>()
                / n;
            features.push(variance as f32);
        }
        if self.include_zero_crossing_rate {
            // Zero counts as positive
            let crossings = values
                .windows(2)
                .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
                .count();
            features.push((crossings as f64 / (n - 1.0)) as f32);
        }
        if self.include_mean_absolute_value {
            let mav = values.iter().map(|&v| f64::from(v).abs()).sum::<f64>() / n;
            features.push(mav as f32);
        }

        Ok(FeatureVector::new(
            features,
            window.end_timestamp(),
            window.sequence(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impulse_config::BandSettings;
    use impulse_structures::{Sample, Timestamp};

    const FS: f64 = 256.0;

    fn window_of(values: &[f32]) -> Window {
        let samples: Vec<Sample> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(*v, Timestamp::from_micros(i as u64 * 3_906 + 1)))
            .collect();
        Window::from_samples(4, &samples).unwrap()
    }

    fn tone(frequency_hz: f64, amplitude: f64, count: usize) -> Vec<f32> {
        (0..count)
            .map(|i| (amplitude * (2.0 * PI * frequency_hz * i as f64 / FS).sin()) as f32)
            .collect()
    }

    #[test]
    fn test_band_power_localises_tone() {
        let extractor = FeatureExtractor::new(&FeatureSettings::default(), FS, 256).unwrap();
        let features = extractor.extract(&window_of(&tone(10.0, 1.0, 256))).unwrap();
        let v = features.values();
        assert_eq!(v.len(), 6);
        // 0.5 in bin 10, averaged over bins 8..=12
        assert!((v[1] - 0.1).abs() < 1e-3, "band_8_12hz = {}", v[1]);
        assert!(v[0] < 1e-4);
        assert!(v[2] < 1e-4);
        assert!((v[3] - 0.5).abs() < 1e-3, "variance = {}", v[3]);
        assert!((v[5] - 2.0 / PI as f32).abs() < 1e-2, "mav = {}", v[5]);
    }

    #[test]
    fn test_zero_crossing_rate_of_alternating_signal() {
        let settings = FeatureSettings {
            bands: vec![],
            include_variance: false,
            include_zero_crossing_rate: true,
            include_mean_absolute_value: false,
        };
        let extractor = FeatureExtractor::new(&settings, FS, 5).unwrap();
        let features = extractor
            .extract(&window_of(&[1.0, -1.0, 0.0, -2.0, 3.0]))
            .unwrap();
        // +,-,+(zero),-,+ -> 4 crossings over 4 transitions
        assert_eq!(features.values(), &[1.0]);
    }

    #[test]
    fn test_feature_vector_carries_window_end() {
        let extractor = FeatureExtractor::new(&FeatureSettings::default(), FS, 256).unwrap();
        let window = window_of(&tone(5.0, 0.3, 256));
        let features = extractor.extract(&window).unwrap();
        assert_eq!(features.timestamp(), window.end_timestamp());
        assert_eq!(features.window_sequence(), 4);
    }

    #[test]
    fn test_wrong_window_length_is_insufficient() {
        let extractor = FeatureExtractor::new(&FeatureSettings::default(), FS, 256).unwrap();
        let err = extractor.extract(&window_of(&[0.0; 128])).unwrap_err();
        assert_eq!(
            err,
            SignalError::InsufficientWindow {
                expected: 256,
                actual: 128
            }
        );
    }

    #[test]
    fn test_band_without_bins_rejected() {
        let settings = FeatureSettings {
            bands: vec![BandSettings {
                low_hz: 4.2,
                high_hz: 4.8,
            }],
            ..FeatureSettings::default()
        };
        assert!(matches!(
            FeatureExtractor::new(&settings, FS, 256),
            Err(SignalError::InvalidFeatures(_))
        ));
    }

    #[test]
    fn test_names_follow_layout() {
        let extractor = FeatureExtractor::new(&FeatureSettings::default(), FS, 256).unwrap();
        assert_eq!(extractor.feature_len(), 6);
        assert_eq!(extractor.feature_names()[0], "band_4_8hz");
        assert_eq!(extractor.feature_names()[5], "mean_absolute_value");
    }
}
