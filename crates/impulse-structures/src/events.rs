// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{Command, Intent, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Classifier output for a single window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Intent,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub timestamp: Timestamp,
}

impl ClassificationResult {
    /// Creates a result, clamping the confidence into `[0, 1]` (NaN becomes 0).
    pub fn new(label: Intent, confidence: f32, timestamp: Timestamp) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        ClassificationResult {
            label,
            confidence,
            timestamp,
        }
    }

    pub fn idle(confidence: f32, timestamp: Timestamp) -> Self {
        ClassificationResult::new(Intent::Idle, confidence, timestamp)
    }
}

/// Edge or heartbeat of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    Enter,
    Hold,
    Exit,
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Enter => f.write_str("ENTER"),
            Transition::Hold => f.write_str("HOLD"),
            Transition::Exit => f.write_str("EXIT"),
        }
    }
}

/// The only entity that leaves the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandEvent {
    pub command: Command,
    pub transition: Transition,
    pub timestamp: Timestamp,
}

impl CommandEvent {
    pub const fn enter(command: Command, timestamp: Timestamp) -> Self {
        CommandEvent {
            command,
            transition: Transition::Enter,
            timestamp,
        }
    }

    pub const fn hold(command: Command, timestamp: Timestamp) -> Self {
        CommandEvent {
            command,
            transition: Transition::Hold,
            timestamp,
        }
    }

    pub const fn exit(command: Command, timestamp: Timestamp) -> Self {
        CommandEvent {
            command,
            transition: Transition::Exit,
            timestamp,
        }
    }
}

impl Display for CommandEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}) @ {}", self.transition, self.command, self.timestamp)
    }
}
