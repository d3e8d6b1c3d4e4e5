// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Intent classification from feature vectors.
//!
//! The model family is chosen once from the profile's [`ClassifierModel`] and
//! checked against the feature layout at construction, so `classify` never
//! fails on a well-formed vector. Classification is stateless across windows.

use crate::SignalError;
use impulse_config::{
    CalibrationProfile, ClassifierModel, Discriminant, Prototype, ThresholdRule,
};
use impulse_structures::{ClassificationResult, FeatureVector, Intent};
use std::collections::HashSet;
use std::fmt::Debug;

/// A scoring model: one score in `[0, 1]` per label it knows
pub trait IntentModel: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn scores(&self, features: &[f32]) -> Vec<(Intent, f32)>;
}

#[derive(Debug, Clone)]
struct FeatureThresholdModel {
    rules: Vec<ThresholdRule>,
}

impl IntentModel for FeatureThresholdModel {
    fn name(&self) -> &'static str {
        "feature_threshold"
    }

    fn scores(&self, features: &[f32]) -> Vec<(Intent, f32)> {
        self.rules
            .iter()
            .map(|rule| {
                let x = features[rule.feature_index];
                (rule.label, (x - rule.floor) / (rule.ceiling - rule.floor))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct NearestPrototypeModel {
    prototypes: Vec<Prototype>,
}

impl IntentModel for NearestPrototypeModel {
    fn name(&self) -> &'static str {
        "nearest_prototype"
    }

    fn scores(&self, features: &[f32]) -> Vec<(Intent, f32)> {
        self.prototypes
            .iter()
            .map(|prototype| {
                let distance = features
                    .iter()
                    .zip(&prototype.centroid)
                    .map(|(x, p)| (x - p) * (x - p))
                    .sum::<f32>()
                    .sqrt();
                (prototype.label, 1.0 / (1.0 + distance))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct LinearDiscriminantModel {
    discriminants: Vec<Discriminant>,
}

impl IntentModel for LinearDiscriminantModel {
    fn name(&self) -> &'static str {
        "linear_discriminant"
    }

    fn scores(&self, features: &[f32]) -> Vec<(Intent, f32)> {
        self.discriminants
            .iter()
            .map(|d| {
                let z = d
                    .weights
                    .iter()
                    .zip(features)
                    .map(|(w, x)| w * x)
                    .sum::<f32>()
                    + d.bias;
                (d.label, 1.0 / (1.0 + (-z).exp()))
            })
            .collect()
    }
}

fn check_labels(labels: impl Iterator<Item = Intent>) -> Result<(), SignalError> {
    let mut seen = HashSet::new();
    for label in labels {
        if label.is_idle() {
            return Err(SignalError::ClassifierMismatch(
                "idle cannot be scored directly".into(),
            ));
        }
        if !seen.insert(label) {
            return Err(SignalError::ClassifierMismatch(format!(
                "label {} is defined more than once",
                label
            )));
        }
    }
    Ok(())
}

/// Build the scoring model for a profile's classifier settings
pub fn create_model(
    model: &ClassifierModel,
    feature_len: usize,
) -> Result<Box<dyn IntentModel>, SignalError> {
    check_labels(model.labels().into_iter())?;

    match model {
        ClassifierModel::FeatureThreshold { rules } => {
            for rule in rules {
                if rule.feature_index >= feature_len {
                    return Err(SignalError::ClassifierMismatch(format!(
                        "{} rule reads feature {} of {}",
                        rule.label, rule.feature_index, feature_len
                    )));
                }
                if !(rule.floor.is_finite() && rule.ceiling.is_finite() && rule.floor < rule.ceiling)
                {
                    return Err(SignalError::ClassifierMismatch(format!(
                        "{} rule floor {} must be below ceiling {}",
                        rule.label, rule.floor, rule.ceiling
                    )));
                }
            }
            Ok(Box::new(FeatureThresholdModel {
                rules: rules.clone(),
            }))
        }
        ClassifierModel::NearestPrototype { prototypes } => {
            for prototype in prototypes {
                if prototype.centroid.len() != feature_len {
                    return Err(SignalError::ClassifierMismatch(format!(
                        "{} prototype has {} dimensions, features have {}",
                        prototype.label,
                        prototype.centroid.len(),
                        feature_len
                    )));
                }
            }
            Ok(Box::new(NearestPrototypeModel {
                prototypes: prototypes.clone(),
            }))
        }
        ClassifierModel::LinearDiscriminant { discriminants } => {
            for discriminant in discriminants {
                if discriminant.weights.len() != feature_len {
                    return Err(SignalError::ClassifierMismatch(format!(
                        "{} discriminant has {} weights, features have {}",
                        discriminant.label,
                        discriminant.weights.len(),
                        feature_len
                    )));
                }
            }
            Ok(Box::new(LinearDiscriminantModel {
                discriminants: discriminants.clone(),
            }))
        }
    }
}

/// Maps feature vectors to intent labels with a confidence
#[derive(Debug)]
pub struct Classifier {
    model: Box<dyn IntentModel>,
    feature_len: usize,
}

impl Classifier {
    pub fn new(model: &ClassifierModel, feature_len: usize) -> Result<Self, SignalError> {
        Ok(Classifier {
            model: create_model(model, feature_len)?,
            feature_len,
        })
    }

    pub fn from_profile(profile: &CalibrationProfile) -> Result<Self, SignalError> {
        Self::new(&profile.classifier, profile.features.feature_len())
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Pick the highest-scoring label, or IDLE if it misses its threshold.
    ///
    /// Ties go to the label ranked earlier in the profile's priority order.
    /// A reported label carries its own score as confidence; IDLE carries
    /// `1 - best_score`.
    pub fn classify(
        &self,
        features: &FeatureVector,
        profile: &CalibrationProfile,
    ) -> Result<ClassificationResult, SignalError> {
        if features.len() != self.feature_len {
            return Err(SignalError::FeatureLengthMismatch {
                expected: self.feature_len,
                actual: features.len(),
            });
        }

        let mut best: Option<(Intent, f32)> = None;
        for (label, raw) in self.model.scores(features.values()) {
            let score = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) };
            best = match best {
                None => Some((label, score)),
                Some((best_label, best_score)) => {
                    let wins = score > best_score
                        || (score == best_score
                            && profile.priority_rank(label) < profile.priority_rank(best_label));
                    if wins {
                        Some((label, score))
                    } else {
                        Some((best_label, best_score))
                    }
                }
            };
        }

        let timestamp = features.timestamp();
        Ok(match best {
            None => ClassificationResult::idle(1.0, timestamp),
            Some((label, score)) if score >= profile.threshold_for(label) => {
                ClassificationResult::new(label, score, timestamp)
            }
            Some((_, score)) => ClassificationResult::idle(1.0 - score, timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impulse_config::LabelThreshold;
    use impulse_structures::Timestamp;

    fn features(values: &[f32]) -> FeatureVector {
        FeatureVector::new(values.to_vec(), Timestamp::from_millis(10), 0)
    }

    fn rule(label: Intent, feature_index: usize) -> ThresholdRule {
        ThresholdRule {
            label,
            feature_index,
            floor: 0.0,
            ceiling: 1.0,
        }
    }

    fn threshold_profile(rules: Vec<ThresholdRule>) -> CalibrationProfile {
        CalibrationProfile {
            classifier: ClassifierModel::FeatureThreshold { rules },
            ..CalibrationProfile::default()
        }
    }

    #[test]
    fn test_highest_score_wins() {
        let profile = threshold_profile(vec![rule(Intent::Forward, 0), rule(Intent::Stop, 1)]);
        let classifier = Classifier::new(&profile.classifier, 2).unwrap();
        let result = classifier.classify(&features(&[0.9, 0.6]), &profile).unwrap();
        assert_eq!(result.label, Intent::Forward);
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert_eq!(result.timestamp, Timestamp::from_millis(10));
    }

    #[test]
    fn test_idle_when_all_below_threshold() {
        let mut profile = threshold_profile(vec![rule(Intent::Forward, 0), rule(Intent::Stop, 1)]);
        profile.thresholds.push(LabelThreshold {
            label: Intent::Forward,
            threshold: 0.95,
        });
        let classifier = Classifier::new(&profile.classifier, 2).unwrap();
        let result = classifier.classify(&features(&[0.9, 0.3]), &profile).unwrap();
        assert_eq!(result.label, Intent::Idle);
        assert!((result.confidence - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_tie_broken_by_priority() {
        let mut profile = threshold_profile(vec![rule(Intent::Forward, 0), rule(Intent::Stop, 1)]);
        let classifier = Classifier::new(&profile.classifier, 2).unwrap();
        let tied = features(&[0.7, 0.7]);

        profile.label_priority = vec![Intent::Stop, Intent::Forward];
        assert_eq!(classifier.classify(&tied, &profile).unwrap().label, Intent::Stop);

        profile.label_priority = vec![Intent::Forward, Intent::Stop];
        assert_eq!(classifier.classify(&tied, &profile).unwrap().label, Intent::Forward);
    }

    #[test]
    fn test_scores_are_clamped() {
        let profile = threshold_profile(vec![rule(Intent::ArmUp, 0)]);
        let classifier = Classifier::new(&profile.classifier, 1).unwrap();
        let result = classifier.classify(&features(&[7.5]), &profile).unwrap();
        assert_eq!(result.label, Intent::ArmUp);
        assert_eq!(result.confidence, 1.0);

        let result = classifier.classify(&features(&[f32::NAN]), &profile).unwrap();
        assert_eq!(result.label, Intent::Idle);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_nearest_prototype() {
        let profile = CalibrationProfile {
            classifier: ClassifierModel::NearestPrototype {
                prototypes: vec![
                    Prototype {
                        label: Intent::TurnLeft,
                        centroid: vec![0.0, 0.0],
                    },
                    Prototype {
                        label: Intent::TurnRight,
                        centroid: vec![3.0, 4.0],
                    },
                ],
            },
            ..CalibrationProfile::default()
        };
        let classifier = Classifier::new(&profile.classifier, 2).unwrap();
        let result = classifier.classify(&features(&[3.0, 4.0]), &profile).unwrap();
        assert_eq!(result.label, Intent::TurnRight);
        assert_eq!(result.confidence, 1.0);

        // Distance 5 from the left prototype only scores 1/6
        let result = classifier.classify(&features(&[-3.0, -4.0]), &profile).unwrap();
        assert_eq!(result.label, Intent::Idle);
    }

    #[test]
    fn test_linear_discriminant() {
        let profile = CalibrationProfile {
            classifier: ClassifierModel::LinearDiscriminant {
                discriminants: vec![Discriminant {
                    label: Intent::Reverse,
                    weights: vec![2.0],
                    bias: -1.0,
                }],
            },
            ..CalibrationProfile::default()
        };
        let classifier = Classifier::new(&profile.classifier, 1).unwrap();
        let at_boundary = classifier.classify(&features(&[0.5]), &profile).unwrap();
        assert_eq!(at_boundary.label, Intent::Reverse);
        assert!((at_boundary.confidence - 0.5).abs() < 1e-6);
        let below = classifier.classify(&features(&[0.0]), &profile).unwrap();
        assert_eq!(below.label, Intent::Idle);
    }

    #[test]
    fn test_empty_model_always_idle() {
        let profile = threshold_profile(vec![]);
        let classifier = Classifier::new(&profile.classifier, 3).unwrap();
        let result = classifier.classify(&features(&[1.0, 1.0, 1.0]), &profile).unwrap();
        assert_eq!(result.label, Intent::Idle);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_mismatches_rejected_at_construction() {
        let out_of_range = ClassifierModel::FeatureThreshold {
            rules: vec![rule(Intent::Forward, 4)],
        };
        assert!(matches!(
            Classifier::new(&out_of_range, 4),
            Err(SignalError::ClassifierMismatch(_))
        ));

        let idle = ClassifierModel::FeatureThreshold {
            rules: vec![rule(Intent::Idle, 0)],
        };
        assert!(Classifier::new(&idle, 1).is_err());

        let duplicate = ClassifierModel::FeatureThreshold {
            rules: vec![rule(Intent::Stop, 0), rule(Intent::Stop, 1)],
        };
        assert!(Classifier::new(&duplicate, 2).is_err());
    }

    #[test]
    fn test_feature_length_checked() {
        let profile = threshold_profile(vec![rule(Intent::Forward, 0)]);
        let classifier = Classifier::new(&profile.classifier, 2).unwrap();
        assert_eq!(
            classifier.classify(&features(&[0.1]), &profile).unwrap_err(),
            SignalError::FeatureLengthMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
