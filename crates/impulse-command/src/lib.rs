// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command stages of the impulse pipeline
//!
//! # Components
//! - [`CommandStateMachine`]: debounced IDLE/command transitions with HOLD heartbeats
//! - [`EventEmitter`]: ordered delivery to a [`CommandSink`] with bounded retry
//! - [`RetryPolicy`]: exponential backoff state for one delivery
//! - [`EmitCancel`]: cancels the emit currently waiting out a backoff
//!
//! # Error Handling
//!
//! Sinks report [`SinkError`]; `Transient` and `Disconnected` are retried,
//! `Rejected` is not. A failed emit returns [`CommandError`] and drops only
//! that event.

mod cancel;
mod emitter;
mod error;
mod retry;
mod sink;
mod state_machine;

pub use cancel::EmitCancel;
pub use emitter::{EmitOutcome, EmitterStats, EventEmitter};
pub use error::{CommandError, SinkError};
pub use retry::RetryPolicy;
pub use sink::{CommandSink, LoggingSink, RecordingSink};
pub use state_machine::CommandStateMachine;
