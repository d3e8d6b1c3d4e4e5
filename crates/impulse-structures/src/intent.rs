// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::ImpulseDataError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Intent label produced by the classifier, one per analysis window.
///
/// `Idle` means "no intent detected"; every other label maps to exactly one
/// [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    #[default]
    Idle,
    Forward,
    Reverse,
    Stop,
    TurnLeft,
    TurnRight,
    ArmUp,
    ArmDown,
}

impl Intent {
    pub const ALL: [Intent; 8] = [
        Intent::Idle,
        Intent::Forward,
        Intent::Reverse,
        Intent::Stop,
        Intent::TurnLeft,
        Intent::TurnRight,
        Intent::ArmUp,
        Intent::ArmDown,
    ];

    /// The command this intent drives, `None` for [`Intent::Idle`].
    pub const fn command(&self) -> Option<Command> {
        match self {
            Intent::Idle => None,
            Intent::Forward => Some(Command::Forward),
            Intent::Reverse => Some(Command::Reverse),
            Intent::Stop => Some(Command::Stop),
            Intent::TurnLeft => Some(Command::TurnLeft),
            Intent::TurnRight => Some(Command::TurnRight),
            Intent::ArmUp => Some(Command::ArmUp),
            Intent::ArmDown => Some(Command::ArmDown),
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self, Intent::Idle)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Intent::Idle => "idle",
            Intent::Forward => "forward",
            Intent::Reverse => "reverse",
            Intent::Stop => "stop",
            Intent::TurnLeft => "turn-left",
            Intent::TurnRight => "turn-right",
            Intent::ArmUp => "arm-up",
            Intent::ArmDown => "arm-down",
        }
    }
}

impl Display for Intent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = ImpulseDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == s)
            .ok_or_else(|| ImpulseDataError::UnknownLabel(s.to_string()))
    }
}

/// Discrete vehicle command delivered to the actuation sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Forward,
    Reverse,
    Stop,
    TurnLeft,
    TurnRight,
    ArmUp,
    ArmDown,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Forward,
        Command::Reverse,
        Command::Stop,
        Command::TurnLeft,
        Command::TurnRight,
        Command::ArmUp,
        Command::ArmDown,
    ];

    pub const fn intent(&self) -> Intent {
        match self {
            Command::Forward => Intent::Forward,
            Command::Reverse => Intent::Reverse,
            Command::Stop => Intent::Stop,
            Command::TurnLeft => Intent::TurnLeft,
            Command::TurnRight => Intent::TurnRight,
            Command::ArmUp => Intent::ArmUp,
            Command::ArmDown => Intent::ArmDown,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        self.intent().as_str()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ImpulseDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::from_str(s)?
            .command()
            .ok_or_else(|| ImpulseDataError::UnknownLabel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_round_trips_through_its_intent() {
        for command in Command::ALL {
            assert_eq!(command.intent().command(), Some(command));
        }
        assert_eq!(Intent::Idle.command(), None);
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("turn-left".parse::<Intent>().unwrap(), Intent::TurnLeft);
        assert_eq!("arm-up".parse::<Command>().unwrap(), Command::ArmUp);
        assert!("idle".parse::<Command>().is_err());
        assert!("sideways".parse::<Intent>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&Intent::TurnRight).unwrap();
        assert_eq!(json, "\"turn-right\"");
        let command: Command = serde_json::from_str("\"arm-down\"").unwrap();
        assert_eq!(command, Command::ArmDown);
    }
}
