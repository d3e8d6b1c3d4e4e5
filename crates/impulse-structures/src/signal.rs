// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{ImpulseDataError, Timestamp};
use serde::{Deserialize, Serialize};

/// One raw reading from the sensor driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f32,
    pub timestamp: Timestamp,
}

impl Sample {
    pub const fn new(value: f32, timestamp: Timestamp) -> Self {
        Sample { value, timestamp }
    }
}

/// A fixed-length run of consecutive samples analysed as one unit.
///
/// Values and timestamps are stored side by side so that filter stages can
/// rewrite the values in place without touching timing information.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    sequence: u64,
    values: Vec<f32>,
    timestamps: Vec<Timestamp>,
}

impl Window {
    /// Build a window, checking that timestamps strictly increase.
    pub fn from_samples(sequence: u64, samples: &[Sample]) -> Result<Self, ImpulseDataError> {
        if samples.is_empty() {
            return Err(ImpulseDataError::BadParameters(
                "A window needs at least one sample".into(),
            ));
        }
        for (index, pair) in samples.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(ImpulseDataError::NonMonotonicTimestamps {
                    index: index + 1,
                    previous: pair[0].timestamp.as_micros(),
                    current: pair[1].timestamp.as_micros(),
                });
            }
        }
        Ok(Window {
            sequence,
            values: samples.iter().map(|s| s.value).collect(),
            timestamps: samples.iter().map(|s| s.timestamp).collect(),
        })
    }

    /// Position of this window in the pipeline's total window order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn start_timestamp(&self) -> Timestamp {
        self.timestamps[0]
    }

    pub fn end_timestamp(&self) -> Timestamp {
        self.timestamps[self.timestamps.len() - 1]
    }
}

/// Numeric summary of one window, in the order fixed by the active profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f32>,
    timestamp: Timestamp,
    window_sequence: u64,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>, timestamp: Timestamp, window_sequence: u64) -> Self {
        FeatureVector {
            values,
            timestamp,
            window_sequence,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// End timestamp of the window the features were computed from.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn window_sequence(&self) -> u64 {
        self.window_sequence
    }
}
