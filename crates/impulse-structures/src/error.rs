// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Common error type for impulse data construction.
///
/// Raised when a data structure is built from values that break its
/// invariants (e.g. a window whose timestamps are not strictly increasing).
///
/// # Examples
/// ```
/// use impulse_structures::{ImpulseDataError, Sample, Timestamp, Window};
///
/// let samples = [
///     Sample::new(0.1, Timestamp::from_micros(20)),
///     Sample::new(0.2, Timestamp::from_micros(10)),
/// ];
/// assert!(matches!(
///     Window::from_samples(0, &samples),
///     Err(ImpulseDataError::NonMonotonicTimestamps { .. })
/// ));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImpulseDataError {
    /// Invalid parameters provided to a constructor
    #[error("Bad Parameters: {0}")]
    BadParameters(String),

    /// Timestamps inside a window must be strictly increasing
    #[error("Timestamp {current} at index {index} does not follow {previous}")]
    NonMonotonicTimestamps {
        index: usize,
        previous: u64,
        current: u64,
    },

    /// A label or command name did not match the fixed vocabulary
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
}
