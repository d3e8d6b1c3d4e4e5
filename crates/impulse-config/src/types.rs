// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines the structs that map to sections in `impulse.toml`,
//! including the calibration profile that parameterises every signal stage.

use impulse_structures::Intent;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImpulseConfig {
    pub pipeline: PipelineConfig,
    pub emitter: EmitterConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
    pub driver: DriverConfig,
    pub profile: CalibrationProfile,
}

/// Sample buffer and processing loop settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ring buffer capacity in samples, must hold at least one window
    pub buffer_capacity: usize,
    /// Wait between polls when no full window is available
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 2048,
            poll_interval_ms: 5,
        }
    }
}

/// Event emitter retry budget
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Total delivery attempts per event, including the first
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

/// Thresholds for the degraded-health signal
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Overflows accumulated without an overflow-free poll in between
    pub overflow_degraded_threshold: u64,
    /// Consecutive events the emitter gave up on
    pub delivery_failure_degraded_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            overflow_degraded_threshold: 64,
            delivery_failure_degraded_threshold: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for run log folders (only used with file logging enabled)
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
        }
    }
}

/// Sensor driver settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverConfig {
    pub sampling_rate_hz: f64,
    /// Samples requested per driver read
    pub read_batch: usize,
    /// Seed for the simulated driver
    pub seed: u64,
    /// Recorded trace replayed instead of the simulated device
    pub trace_path: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 256.0,
            read_batch: 16,
            seed: 7,
            trace_path: None,
        }
    }
}

/// Immutable snapshot of every parameter the signal stages need.
///
/// Replacing a profile only takes effect at a window boundary.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationProfile {
    pub version: u32,
    pub sampling_rate_hz: f64,
    pub window: WindowSettings,
    pub filters: Vec<FilterStageSettings>,
    pub features: FeatureSettings,
    pub classifier: ClassifierModel,
    /// Confidence threshold for labels without an entry in `thresholds`
    pub default_threshold: f32,
    pub thresholds: Vec<LabelThreshold>,
    /// Tie-break order, earlier wins
    pub label_priority: Vec<Intent>,
    pub debounce: DebounceSettings,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            version: 1,
            sampling_rate_hz: 256.0,
            window: WindowSettings::default(),
            filters: default_filter_cascade(),
            features: FeatureSettings::default(),
            classifier: ClassifierModel::default(),
            default_threshold: 0.5,
            thresholds: Vec::new(),
            label_priority: vec![
                Intent::Stop,
                Intent::Reverse,
                Intent::Forward,
                Intent::TurnLeft,
                Intent::TurnRight,
                Intent::ArmUp,
                Intent::ArmDown,
            ],
            debounce: DebounceSettings::default(),
        }
    }
}

impl CalibrationProfile {
    /// Confidence a label's score must reach to be reported instead of IDLE
    pub fn threshold_for(&self, label: Intent) -> f32 {
        self.thresholds
            .iter()
            .find(|t| t.label == label)
            .map(|t| t.threshold)
            .unwrap_or(self.default_threshold)
    }

    /// Rank used to break score ties (lower wins).
    ///
    /// Labels missing from `label_priority` rank after every listed label, in
    /// vocabulary order.
    pub fn priority_rank(&self, label: Intent) -> usize {
        match self.label_priority.iter().position(|l| *l == label) {
            Some(rank) => rank,
            None => {
                let vocabulary_index = Intent::ALL
                    .iter()
                    .position(|l| *l == label)
                    .unwrap_or(Intent::ALL.len());
                self.label_priority.len() + vocabulary_index
            }
        }
    }

    pub fn nyquist_hz(&self) -> f64 {
        self.sampling_rate_hz / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Samples per analysis window
    pub size: usize,
    /// Samples between consecutive window starts
    pub hop: usize,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self { size: 256, hop: 128 }
    }
}

/// One stage of the filter cascade
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterStageSettings {
    Notch { frequency_hz: f64, q: f64 },
    BandPass { low_hz: f64, high_hz: f64 },
    HighPass { cutoff_hz: f64 },
    DcBlock { pole: f64 },
    /// Raw normalised coefficients (a0 = 1)
    Biquad {
        b0: f64,
        b1: f64,
        b2: f64,
        a1: f64,
        a2: f64,
    },
}

impl FilterStageSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            FilterStageSettings::Notch { .. } => "notch",
            FilterStageSettings::BandPass { .. } => "band_pass",
            FilterStageSettings::HighPass { .. } => "high_pass",
            FilterStageSettings::DcBlock { .. } => "dc_block",
            FilterStageSettings::Biquad { .. } => "biquad",
        }
    }
}

/// Mains notch, 1-40 Hz band-pass, then DC blocker
pub fn default_filter_cascade() -> Vec<FilterStageSettings> {
    vec![
        FilterStageSettings::Notch {
            frequency_hz: 60.0,
            q: 30.0,
        },
        FilterStageSettings::BandPass {
            low_hz: 1.0,
            high_hz: 40.0,
        },
        FilterStageSettings::DcBlock { pole: 0.995 },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BandSettings {
    pub low_hz: f64,
    pub high_hz: f64,
}

/// Which features the extractor produces, in output order
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub bands: Vec<BandSettings>,
    pub include_variance: bool,
    pub include_zero_crossing_rate: bool,
    pub include_mean_absolute_value: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            bands: vec![
                BandSettings { low_hz: 4.0, high_hz: 8.0 },
                BandSettings { low_hz: 8.0, high_hz: 12.0 },
                BandSettings { low_hz: 12.0, high_hz: 30.0 },
            ],
            include_variance: true,
            include_zero_crossing_rate: true,
            include_mean_absolute_value: true,
        }
    }
}

impl FeatureSettings {
    pub fn feature_len(&self) -> usize {
        self.bands.len()
            + usize::from(self.include_variance)
            + usize::from(self.include_zero_crossing_rate)
            + usize::from(self.include_mean_absolute_value)
    }

    /// Stable feature names in output order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bands
            .iter()
            .map(|b| format!("band_{}_{}hz", trim_hz(b.low_hz), trim_hz(b.high_hz)))
            .collect();
        if self.include_variance {
            names.push("variance".to_string());
        }
        if self.include_zero_crossing_rate {
            names.push("zero_crossing_rate".to_string());
        }
        if self.include_mean_absolute_value {
            names.push("mean_absolute_value".to_string());
        }
        names
    }
}

fn trim_hz(hz: f64) -> String {
    if hz.fract() == 0.0 {
        format!("{}", hz as i64)
    } else {
        format!("{hz}").replace('.', "p")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThresholdRule {
    pub label: Intent,
    pub feature_index: usize,
    pub floor: f32,
    pub ceiling: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Prototype {
    pub label: Intent,
    pub centroid: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Discriminant {
    pub label: Intent,
    pub weights: Vec<f32>,
    pub bias: f32,
}

/// Classifier model family, selected when the classifier is built
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ClassifierModel {
    FeatureThreshold { rules: Vec<ThresholdRule> },
    NearestPrototype { prototypes: Vec<Prototype> },
    LinearDiscriminant { discriminants: Vec<Discriminant> },
}

impl Default for ClassifierModel {
    /// Band-power rules over the default feature layout
    fn default() -> Self {
        ClassifierModel::FeatureThreshold {
            rules: vec![
                ThresholdRule {
                    label: Intent::Reverse,
                    feature_index: 0,
                    floor: 0.005,
                    ceiling: 0.05,
                },
                ThresholdRule {
                    label: Intent::Forward,
                    feature_index: 1,
                    floor: 0.005,
                    ceiling: 0.05,
                },
                ThresholdRule {
                    label: Intent::TurnLeft,
                    feature_index: 2,
                    floor: 0.005,
                    ceiling: 0.05,
                },
            ],
        }
    }
}

impl ClassifierModel {
    pub fn name(&self) -> &'static str {
        match self {
            ClassifierModel::FeatureThreshold { .. } => "feature_threshold",
            ClassifierModel::NearestPrototype { .. } => "nearest_prototype",
            ClassifierModel::LinearDiscriminant { .. } => "linear_discriminant",
        }
    }

    /// Labels the model scores, in declaration order
    pub fn labels(&self) -> Vec<Intent> {
        match self {
            ClassifierModel::FeatureThreshold { rules } => rules.iter().map(|r| r.label).collect(),
            ClassifierModel::NearestPrototype { prototypes } => {
                prototypes.iter().map(|p| p.label).collect()
            }
            ClassifierModel::LinearDiscriminant { discriminants } => {
                discriminants.iter().map(|d| d.label).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LabelThreshold {
    pub label: Intent,
    pub threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DebounceSettings {
    /// Consecutive windows a label must persist before it is committed
    pub debounce_window: u32,
    /// Minimum spacing of HOLD heartbeats, 0 disables them
    pub command_hold_timeout_ms: u64,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            debounce_window: 3,
            command_hold_timeout_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_feature_layout() {
        let features = FeatureSettings::default();
        assert_eq!(features.feature_len(), 6);
        assert_eq!(
            features.feature_names(),
            vec![
                "band_4_8hz",
                "band_8_12hz",
                "band_12_30hz",
                "variance",
                "zero_crossing_rate",
                "mean_absolute_value"
            ]
        );
    }

    #[test]
    fn test_fractional_band_name() {
        let features = FeatureSettings {
            bands: vec![BandSettings { low_hz: 0.5, high_hz: 4.0 }],
            include_variance: false,
            include_zero_crossing_rate: false,
            include_mean_absolute_value: false,
        };
        assert_eq!(features.feature_names(), vec!["band_0p5_4hz"]);
    }

    #[test]
    fn test_threshold_lookup_falls_back_to_default() {
        let mut profile = CalibrationProfile::default();
        profile.thresholds.push(LabelThreshold {
            label: Intent::Stop,
            threshold: 0.8,
        });
        assert_eq!(profile.threshold_for(Intent::Stop), 0.8);
        assert_eq!(profile.threshold_for(Intent::Forward), 0.5);
    }

    #[test]
    fn test_unlisted_labels_rank_last() {
        let mut profile = CalibrationProfile::default();
        profile.label_priority = vec![Intent::ArmDown];
        assert_eq!(profile.priority_rank(Intent::ArmDown), 0);
        assert!(profile.priority_rank(Intent::Forward) < profile.priority_rank(Intent::Stop));
        assert!(profile.priority_rank(Intent::Forward) > 0);
    }

    #[test]
    fn test_filter_stage_serde_tag() {
        let stage: FilterStageSettings =
            serde_json::from_str(r#"{"kind":"notch","frequency_hz":50.0,"q":25.0}"#).unwrap();
        assert_eq!(
            stage,
            FilterStageSettings::Notch {
                frequency_hz: 50.0,
                q: 25.0
            }
        );
        assert_eq!(stage.kind(), "notch");
    }
}
