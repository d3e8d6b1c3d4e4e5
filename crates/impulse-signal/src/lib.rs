// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Signal stages of the impulse pipeline: sample buffering, the filter bank,
//! feature extraction and intent classification.
//!
//! Every stage after the buffer is configured from a
//! [`CalibrationProfile`](impulse_config::CalibrationProfile) and runs to
//! completion per window.

mod buffer;
mod classifier;
mod error;
mod features;
mod filters;

pub use buffer::{BufferStats, SampleBuffer, SampleProducer};
pub use classifier::{create_model, Classifier, IntentModel};
pub use error::SignalError;
pub use features::FeatureExtractor;
pub use filters::{BiquadCoefficients, FilterBank};
