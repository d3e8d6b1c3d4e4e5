//! # Impulse - Neural-Impulse Command Pipeline
//!
//! Impulse turns the continuous signal of a neural-impulse headband into
//! discrete, debounced commands for a remotely operated vehicle.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! impulse = "0.1"
//! ```
//!
//! ```rust,no_run
//! use impulse::prelude::*;
//!
//! let config = load_config(None, None)?;
//! let mut pipeline = CommandPipeline::new(&config, LoggingSink::new())?;
//!
//! let mut acquisition = AcquisitionLoop::new(
//!     SimulatedNiaDriver::from_config(&config.driver),
//!     pipeline.producer(),
//!     config.driver.read_batch,
//! );
//! for _ in 0..64 {
//!     acquisition.pump()?;
//!     pipeline.process_available()?;
//! }
//! let report = pipeline.shutdown()?;
//! println!("{} windows, final {:?}", report.windows_processed, report.final_event);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: impulse-structures, impulse-config         │
//! │  (Sample, Window, Intent, CommandEvent, profiles)       │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Signal: impulse-signal                                 │
//! │  (buffer, filter bank, features, classifier)            │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Command: impulse-command                               │
//! │  (debounce state machine, retrying emitter, sinks)      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↑
//! ┌─────────────────────────────────────────────────────────┐
//! │  I/O: impulse-driver                                    │
//! │  (simulated NIA, trace replay, acquisition thread)      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

mod error;
mod health;
mod pipeline;
mod profile_slot;

pub use error::{PipelineError, Result};
pub use health::{HealthStatus, PipelineHealth};
pub use pipeline::{CommandPipeline, ShutdownReport, WindowReport};
pub use profile_slot::ProfileHandle;

// Re-export workspace crates
pub use impulse_command as command;
pub use impulse_config as config;
pub use impulse_driver as driver;
pub use impulse_observability as observability;
pub use impulse_signal as signal;
pub use impulse_structures as structures;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::{CommandPipeline, HealthStatus, PipelineError, ProfileHandle, ShutdownReport};

    pub use impulse_command::{CommandSink, EmitCancel, LoggingSink, RecordingSink, SinkError};
    pub use impulse_config::{load_config, load_profile, CalibrationProfile, ImpulseConfig};
    pub use impulse_driver::{AcquisitionLoop, SensorDriver, SimulatedNiaDriver, TraceDriver};
    pub use impulse_structures::{
        ClassificationResult, Command, CommandEvent, Intent, Sample, Timestamp, Transition,
    };
}
