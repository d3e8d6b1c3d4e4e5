// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor drivers for impulse
//!
//! A [`SensorDriver`] yields timestamped samples; [`AcquisitionLoop`] moves
//! them into the sample buffer through a
//! [`SampleProducer`](impulse_signal::SampleProducer), either synchronously
//! (`pump`) or on a dedicated thread (`spawn`).
//!
//! Two drivers are provided:
//! - [`SimulatedNiaDriver`]: seeded uniform noise with an optional tone
//! - [`TraceDriver`]: replays a [`RecordedTrace`] JSON file

mod acquisition;
mod clock;
mod driver;
mod error;
mod simulated;
mod trace;

pub use acquisition::{
    AcquisitionHandle, AcquisitionLoop, AcquisitionRun, AcquisitionStats, PumpStatus, StopReason,
};
pub use clock::SampleClock;
pub use driver::SensorDriver;
pub use error::DriverError;
pub use simulated::{SimulatedNiaDriver, Tone};
pub use trace::{RecordedTrace, TraceDriver};
