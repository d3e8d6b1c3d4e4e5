// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Ordered delivery of command events with bounded retry

use crate::cancel::EmitCancel;
use crate::error::{CommandError, SinkError};
use crate::retry::RetryPolicy;
use crate::sink::CommandSink;
use impulse_config::EmitterConfig;
use impulse_structures::{Command, CommandEvent, Transition};
use tracing::{debug, warn};

/// Result of a successful [`EventEmitter::emit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The sink accepted the event
    Delivered { attempts: u32 },
    /// Redundant HOLD not sent to an idempotent sink
    Skipped,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub delivered: u64,
    pub skipped: u64,
    /// Events dropped, cancelled ones included
    pub failed: u64,
    pub cancelled: u64,
    /// Publish calls beyond the first for each event
    pub retries: u64,
    /// Failures since the last delivered event
    pub consecutive_failures: u32,
}

/// Delivers events to a sink one at a time, in call order.
///
/// `emit` blocks for at most the retry budget and never reorders: an event
/// is either delivered or dropped before the next one is attempted.
pub struct EventEmitter<S: CommandSink> {
    sink: S,
    config: EmitterConfig,
    cancel: EmitCancel,
    /// Command whose ENTER (or later HOLD) the sink has accepted
    acknowledged_active: Option<Command>,
    stats: EmitterStats,
}

impl<S: CommandSink> EventEmitter<S> {
    pub fn new(sink: S, config: &EmitterConfig) -> Result<Self, CommandError> {
        if config.max_attempts == 0 {
            return Err(CommandError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if config.base_backoff_ms > config.max_backoff_ms {
            return Err(CommandError::InvalidConfig(format!(
                "base_backoff_ms ({}) exceeds max_backoff_ms ({})",
                config.base_backoff_ms, config.max_backoff_ms
            )));
        }
        Ok(Self {
            sink,
            config: config.clone(),
            cancel: EmitCancel::new(),
            acknowledged_active: None,
            stats: EmitterStats::default(),
        })
    }

    /// Deliver one event, retrying transient failures.
    ///
    /// On error the event is dropped; later events are unaffected.
    pub fn emit(&mut self, event: CommandEvent) -> Result<EmitOutcome, CommandError> {
        self.cancel.clear();

        if event.transition == Transition::Hold
            && self.sink.hold_is_idempotent()
            && self.acknowledged_active == Some(event.command)
        {
            debug!("[EMITTER] Skipping redundant {}", event);
            self.stats.skipped += 1;
            return Ok(EmitOutcome::Skipped);
        }

        let mut policy = RetryPolicy::from_config(&self.config);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let reason = match self.sink.publish(&event) {
                Ok(()) => {
                    self.acknowledge(&event);
                    self.stats.delivered += 1;
                    self.stats.consecutive_failures = 0;
                    debug!(
                        "[EMITTER] Delivered {} to {} in {} attempt(s)",
                        event,
                        self.sink.name(),
                        attempts
                    );
                    return Ok(EmitOutcome::Delivered { attempts });
                }
                Err(reason) => reason,
            };

            if !reason.is_retryable() {
                return Err(self.fail(event, attempts, reason));
            }

            let Some(delay) = policy.next_backoff() else {
                return Err(self.fail(event, attempts, reason));
            };

            warn!(
                "[EMITTER] {} attempt {} failed ({}), retrying in {:?}",
                event, attempts, reason, delay
            );
            self.stats.retries += 1;

            if self.cancel.wait(delay) {
                warn!("[EMITTER] Delivery of {} cancelled", event);
                self.record_failure(&event);
                self.stats.cancelled += 1;
                return Err(CommandError::Cancelled { event, attempts });
            }
        }
    }

    /// Handle that cancels the emit currently in its backoff wait
    pub fn cancel_handle(&self) -> EmitCancel {
        self.cancel.clone()
    }

    pub fn stats(&self) -> EmitterStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn acknowledge(&mut self, event: &CommandEvent) {
        match event.transition {
            Transition::Enter | Transition::Hold => self.acknowledged_active = Some(event.command),
            Transition::Exit => {
                if self.acknowledged_active == Some(event.command) {
                    self.acknowledged_active = None;
                }
            }
        }
    }

    fn fail(&mut self, event: CommandEvent, attempts: u32, reason: SinkError) -> CommandError {
        warn!(
            "[EMITTER] Dropping {} after {} attempt(s): {}",
            event, attempts, reason
        );
        self.record_failure(&event);
        CommandError::DeliveryFailed {
            event,
            attempts,
            reason,
        }
    }

    fn record_failure(&mut self, event: &CommandEvent) {
        self.stats.failed += 1;
        self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_add(1);
        // The sink's view of the active command is unknown after a lost edge
        if event.transition != Transition::Hold {
            self.acknowledged_active = None;
        }
    }
}
