// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The core crate for impulse. Defines the data types that flow through the
//! command pipeline, from raw sensor samples to outbound command events.
//!
//! Every stage of the pipeline speaks in these types:
//!
//! ```text
//! Sample ──► Window ──► FeatureVector ──► ClassificationResult ──► CommandEvent
//! ```

mod error;
mod events;
mod intent;
mod signal;
mod timestamp;

pub use error::ImpulseDataError;
pub use events::{ClassificationResult, CommandEvent, Transition};
pub use intent::{Command, Intent};
pub use signal::{FeatureVector, Sample, Window};
pub use timestamp::Timestamp;
