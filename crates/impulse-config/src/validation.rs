//! Configuration validation
//!
//! Checks that runtime settings and calibration profiles are internally
//! consistent before any pipeline stage is built from them. Every problem is
//! collected so a single error lists all of them.

use crate::{
    CalibrationProfile, ClassifierModel, ConfigError, ConfigResult, FilterStageSettings,
    ImpulseConfig,
};
use impulse_structures::Intent;
use std::collections::HashSet;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidValue { field: String, reason: String },
    DimensionMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    Duplicate { field: String, value: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::DimensionMismatch {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{} has length {} but the feature vector has {} entries",
                    field, actual, expected
                )
            }
            Self::Duplicate { field, value } => {
                write!(f, "{} lists {} more than once", field, value)
            }
        }
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Validate the complete configuration, including its embedded profile
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &ImpulseConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_runtime_settings(config, &mut errors);
    collect_profile_errors(&config.profile, "profile", &mut errors);

    into_result(errors)
}

/// Validate a calibration profile on its own (e.g. before a hot swap)
pub fn validate_profile(profile: &CalibrationProfile) -> ConfigResult<()> {
    let mut errors = Vec::new();
    collect_profile_errors(profile, "profile", &mut errors);
    into_result(errors)
}

fn into_result(errors: Vec<ConfigValidationError>) -> ConfigResult<()> {
    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }
    Ok(())
}

fn validate_runtime_settings(config: &ImpulseConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.pipeline.buffer_capacity < config.profile.window.size {
        errors.push(invalid(
            "pipeline.buffer_capacity",
            format!(
                "{} cannot hold a {}-sample window",
                config.pipeline.buffer_capacity, config.profile.window.size
            ),
        ));
    }

    if config.emitter.max_attempts == 0 {
        errors.push(invalid("emitter.max_attempts", "must be at least 1"));
    }
    if config.emitter.base_backoff_ms > config.emitter.max_backoff_ms {
        errors.push(invalid(
            "emitter.base_backoff_ms",
            format!(
                "{} exceeds emitter.max_backoff_ms = {}",
                config.emitter.base_backoff_ms, config.emitter.max_backoff_ms
            ),
        ));
    }

    if config.health.overflow_degraded_threshold == 0 {
        errors.push(invalid("health.overflow_degraded_threshold", "must be at least 1"));
    }
    if config.health.delivery_failure_degraded_threshold == 0 {
        errors.push(invalid(
            "health.delivery_failure_degraded_threshold",
            "must be at least 1",
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(invalid(
            "logging.level",
            format!("'{}' is not one of {:?}", config.logging.level, LOG_LEVELS),
        ));
    }

    if config.driver.read_batch == 0 {
        errors.push(invalid("driver.read_batch", "must be at least 1"));
    }
    if config.driver.sampling_rate_hz != config.profile.sampling_rate_hz {
        errors.push(invalid(
            "driver.sampling_rate_hz",
            format!(
                "{} Hz does not match profile.sampling_rate_hz = {} Hz",
                config.driver.sampling_rate_hz, config.profile.sampling_rate_hz
            ),
        ));
    }
}

fn collect_profile_errors(
    profile: &CalibrationProfile,
    prefix: &str,
    errors: &mut Vec<ConfigValidationError>,
) {
    let fs = profile.sampling_rate_hz;
    if !(fs.is_finite() && fs > 0.0) {
        errors.push(invalid(
            format!("{prefix}.sampling_rate_hz"),
            "must be a positive number",
        ));
        // Every frequency check below depends on a usable rate
        return;
    }
    let nyquist = profile.nyquist_hz();

    let window = profile.window;
    if window.size < 2 {
        errors.push(invalid(format!("{prefix}.window.size"), "must be at least 2"));
    }
    if window.hop == 0 || window.hop > window.size {
        errors.push(invalid(
            format!("{prefix}.window.hop"),
            format!("{} must be between 1 and the window size {}", window.hop, window.size),
        ));
    }

    for (index, stage) in profile.filters.iter().enumerate() {
        validate_filter_stage(stage, nyquist, &format!("{prefix}.filters[{index}]"), errors);
    }

    let features = &profile.features;
    for (index, band) in features.bands.iter().enumerate() {
        let field = format!("{prefix}.features.bands[{index}]");
        if !(band.low_hz >= 0.0 && band.low_hz < band.high_hz && band.high_hz <= nyquist) {
            errors.push(invalid(
                field,
                format!(
                    "{}-{} Hz must satisfy 0 <= low < high <= {} Hz",
                    band.low_hz, band.high_hz, nyquist
                ),
            ));
        } else if window.size >= 2 {
            let resolution = fs / window.size as f64;
            let first_bin = (band.low_hz / resolution).ceil();
            let last_bin = (band.high_hz / resolution).floor();
            if first_bin > last_bin {
                errors.push(invalid(
                    field,
                    format!(
                        "{}-{} Hz contains no frequency bin at {:.3} Hz resolution",
                        band.low_hz, band.high_hz, resolution
                    ),
                ));
            }
        }
    }
    let feature_len = features.feature_len();
    if feature_len == 0 {
        errors.push(invalid(
            format!("{prefix}.features"),
            "no features enabled",
        ));
    }

    validate_classifier(&profile.classifier, feature_len, prefix, errors);

    if !(0.0..=1.0).contains(&profile.default_threshold) {
        errors.push(invalid(
            format!("{prefix}.default_threshold"),
            format!("{} is outside [0, 1]", profile.default_threshold),
        ));
    }
    let mut seen = HashSet::new();
    for (index, entry) in profile.thresholds.iter().enumerate() {
        if !(0.0..=1.0).contains(&entry.threshold) {
            errors.push(invalid(
                format!("{prefix}.thresholds[{index}]"),
                format!("{} threshold {} is outside [0, 1]", entry.label, entry.threshold),
            ));
        }
        if !seen.insert(entry.label) {
            errors.push(ConfigValidationError::Duplicate {
                field: format!("{prefix}.thresholds"),
                value: entry.label.to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    for label in &profile.label_priority {
        if !seen.insert(*label) {
            errors.push(ConfigValidationError::Duplicate {
                field: format!("{prefix}.label_priority"),
                value: label.to_string(),
            });
        }
    }

    if profile.debounce.debounce_window == 0 {
        errors.push(invalid(
            format!("{prefix}.debounce.debounce_window"),
            "must be at least 1",
        ));
    }
}

fn validate_filter_stage(
    stage: &FilterStageSettings,
    nyquist: f64,
    field: &str,
    errors: &mut Vec<ConfigValidationError>,
) {
    let below_nyquist = |hz: f64| hz.is_finite() && hz > 0.0 && hz < nyquist;
    match *stage {
        FilterStageSettings::Notch { frequency_hz, q } => {
            if !below_nyquist(frequency_hz) {
                errors.push(invalid(
                    field,
                    format!("notch at {} Hz must lie in (0, {}) Hz", frequency_hz, nyquist),
                ));
            }
            if !(q.is_finite() && q > 0.0) {
                errors.push(invalid(field, format!("notch q {} must be positive", q)));
            }
        }
        FilterStageSettings::BandPass { low_hz, high_hz } => {
            if !(below_nyquist(low_hz) && below_nyquist(high_hz) && low_hz < high_hz) {
                errors.push(invalid(
                    field,
                    format!(
                        "band-pass {}-{} Hz must satisfy 0 < low < high < {} Hz",
                        low_hz, high_hz, nyquist
                    ),
                ));
            }
        }
        FilterStageSettings::HighPass { cutoff_hz } => {
            if !below_nyquist(cutoff_hz) {
                errors.push(invalid(
                    field,
                    format!("high-pass at {} Hz must lie in (0, {}) Hz", cutoff_hz, nyquist),
                ));
            }
        }
        FilterStageSettings::DcBlock { pole } => {
            if !(pole > 0.0 && pole < 1.0) {
                errors.push(invalid(field, format!("dc-block pole {} must lie in (0, 1)", pole)));
            }
        }
        FilterStageSettings::Biquad { b0, b1, b2, a1, a2 } => {
            if ![b0, b1, b2, a1, a2].iter().all(|c| c.is_finite()) {
                errors.push(invalid(field, "biquad coefficients must be finite"));
            }
        }
    }
}

fn validate_classifier(
    model: &ClassifierModel,
    feature_len: usize,
    prefix: &str,
    errors: &mut Vec<ConfigValidationError>,
) {
    let field = format!("{prefix}.classifier");

    let mut seen = HashSet::new();
    for label in model.labels() {
        if label == Intent::Idle {
            errors.push(invalid(
                &field,
                "idle is implied by the thresholds and cannot be scored directly",
            ));
        } else if !seen.insert(label) {
            errors.push(ConfigValidationError::Duplicate {
                field: field.clone(),
                value: label.to_string(),
            });
        }
    }

    match model {
        ClassifierModel::FeatureThreshold { rules } => {
            for (index, rule) in rules.iter().enumerate() {
                let rule_field = format!("{field}.rules[{index}]");
                if rule.feature_index >= feature_len {
                    errors.push(invalid(
                        &rule_field,
                        format!(
                            "feature_index {} is out of range for {} features",
                            rule.feature_index, feature_len
                        ),
                    ));
                }
                if !(rule.floor.is_finite() && rule.ceiling.is_finite() && rule.floor < rule.ceiling)
                {
                    errors.push(invalid(
                        &rule_field,
                        format!("floor {} must be below ceiling {}", rule.floor, rule.ceiling),
                    ));
                }
            }
        }
        ClassifierModel::NearestPrototype { prototypes } => {
            for (index, prototype) in prototypes.iter().enumerate() {
                if prototype.centroid.len() != feature_len {
                    errors.push(ConfigValidationError::DimensionMismatch {
                        field: format!("{field}.prototypes[{index}].centroid"),
                        expected: feature_len,
                        actual: prototype.centroid.len(),
                    });
                }
            }
        }
        ClassifierModel::LinearDiscriminant { discriminants } => {
            for (index, discriminant) in discriminants.iter().enumerate() {
                if discriminant.weights.len() != feature_len {
                    errors.push(ConfigValidationError::DimensionMismatch {
                        field: format!("{field}.discriminants[{index}].weights"),
                        expected: feature_len,
                        actual: discriminant.weights.len(),
                    });
                }
            }
        }
    }
}
