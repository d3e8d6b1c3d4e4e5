// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use impulse_structures::{ImpulseDataError, Timestamp};
use thiserror::Error;

/// Errors raised by the signal stages.
///
/// `Overflow` and `OutOfOrderSample` are recovered inside the buffer and only
/// reported for accounting. `InsufficientWindow` means the stages were wired
/// with mismatched geometry and is treated as fatal by the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("Sample buffer full: dropped oldest sample at {dropped} (overflow #{overflow_count})")]
    Overflow {
        dropped: Timestamp,
        overflow_count: u64,
    },

    #[error("Sample at {timestamp} does not follow the last accepted sample at {last}")]
    OutOfOrderSample { timestamp: Timestamp, last: Timestamp },

    #[error("Window has {actual} samples, expected {expected}")]
    InsufficientWindow { expected: usize, actual: usize },

    #[error("Sample buffer is closed")]
    BufferClosed,

    #[error("Invalid window geometry: {0}")]
    InvalidWindowGeometry(String),

    #[error("Invalid filter stage: {0}")]
    InvalidFilter(String),

    #[error("Invalid feature settings: {0}")]
    InvalidFeatures(String),

    #[error("Classifier model does not fit the feature layout: {0}")]
    ClassifierMismatch(String),

    #[error("Feature vector has {actual} entries, classifier expects {expected}")]
    FeatureLengthMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Data(#[from] ImpulseDataError),
}

impl SignalError {
    /// True for conditions the buffer already recovered from
    pub fn is_recovered(&self) -> bool {
        matches!(
            self,
            SignalError::Overflow { .. } | SignalError::OutOfOrderSample { .. }
        )
    }
}
