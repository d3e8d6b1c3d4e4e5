// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Destinations for command events

use crate::error::SinkError;
use impulse_structures::CommandEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::info;

/// External consumer of command events (vehicle link, UI, recorder)
pub trait CommandSink: Send {
    /// Hand one event to the sink
    fn publish(&mut self, event: &CommandEvent) -> Result<(), SinkError>;

    /// Whether a repeated HOLD for an acknowledged command can be skipped
    fn hold_is_idempotent(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}

/// Sink that writes every event to the log
#[derive(Debug, Default)]
pub struct LoggingSink {
    published: u64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl CommandSink for LoggingSink {
    fn publish(&mut self, event: &CommandEvent) -> Result<(), SinkError> {
        self.published += 1;
        info!("[SINK] {}", event);
        Ok(())
    }

    fn hold_is_idempotent(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "logging"
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    events: Vec<CommandEvent>,
    scripted_failures: VecDeque<SinkError>,
    attempts: u64,
}

/// Sink that keeps every delivered event in memory.
///
/// Clones share storage, so a test can keep one clone while the emitter owns
/// another. Failures queued with [`RecordingSink::fail_next`] are returned by
/// the following publish calls in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<RecordingState>>,
    hold_idempotent: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hold_idempotent(mut self, idempotent: bool) -> Self {
        self.hold_idempotent = idempotent;
        self
    }

    /// Queue a failure for an upcoming publish
    pub fn fail_next(&self, error: SinkError) {
        self.state.lock().scripted_failures.push_back(error);
    }

    /// Events delivered so far, in delivery order
    pub fn events(&self) -> Vec<CommandEvent> {
        self.state.lock().events.clone()
    }

    /// Publish calls made, including failed ones
    pub fn attempts(&self) -> u64 {
        self.state.lock().attempts
    }
}

impl CommandSink for RecordingSink {
    fn publish(&mut self, event: &CommandEvent) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }
        state.events.push(*event);
        Ok(())
    }

    fn hold_is_idempotent(&self) -> bool {
        self.hold_idempotent
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impulse_structures::{Command, Timestamp};

    #[test]
    fn test_recording_sink_scripted_failure() {
        let probe = RecordingSink::new();
        let mut sink = probe.clone();
        let event = CommandEvent::enter(Command::Forward, Timestamp::from_micros(1));

        probe.fail_next(SinkError::Transient("busy".to_string()));
        assert!(sink.publish(&event).is_err());
        assert!(sink.publish(&event).is_ok());

        assert_eq!(probe.events(), vec![event]);
        assert_eq!(probe.attempts(), 2);
    }

    #[test]
    fn test_logging_sink_counts() {
        let mut sink = LoggingSink::new();
        let event = CommandEvent::hold(Command::Stop, Timestamp::from_micros(1));
        sink.publish(&event).unwrap();
        assert_eq!(sink.published(), 1);
        assert!(sink.hold_is_idempotent());
    }
}
