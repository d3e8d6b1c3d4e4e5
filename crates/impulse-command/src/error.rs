// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for command translation and delivery

use impulse_structures::CommandEvent;

/// Failure reported by a [`CommandSink`](crate::CommandSink)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Temporary condition (busy link, timeout)
    #[error("Transient sink failure: {0}")]
    Transient(String),

    /// The sink refused this event; retrying cannot help
    #[error("Sink rejected event: {0}")]
    Rejected(String),

    /// Transport link is down
    #[error("Sink disconnected: {0}")]
    Disconnected(String),
}

impl SinkError {
    /// Check if the failed publish may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Transient(_) | SinkError::Disconnected(_))
    }
}

/// Error types for the command stages
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// The emitter gave up on an event; it is dropped
    #[error("Delivery of {event} failed after {attempts} attempt(s): {reason}")]
    DeliveryFailed {
        event: CommandEvent,
        attempts: u32,
        reason: SinkError,
    },

    /// An in-flight emit was cancelled during its backoff wait
    #[error("Delivery of {event} cancelled after {attempts} attempt(s)")]
    Cancelled { event: CommandEvent, attempts: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CommandError {
    /// Check if a later delivery through the same sink may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CommandError::DeliveryFailed { reason, .. } => reason.is_retryable(),
            CommandError::Cancelled { .. } => true,
            CommandError::InvalidConfig(_) => false,
        }
    }

    /// The event that was not delivered, if any
    pub fn event(&self) -> Option<&CommandEvent> {
        match self {
            CommandError::DeliveryFailed { event, .. } | CommandError::Cancelled { event, .. } => {
                Some(event)
            }
            CommandError::InvalidConfig(_) => None,
        }
    }
}
