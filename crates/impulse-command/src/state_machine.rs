// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Debounced translation of per-window classifications into command edges.

The machine is flat: IDLE plus one state per [`Command`]. A label must be
reported for `debounce_window` consecutive windows before the active state
changes; any other label restarts the count. While a command stays active,
HOLD heartbeats are produced at most once per hold timeout.
*/

use crate::error::CommandError;
use impulse_config::DebounceSettings;
use impulse_structures::{ClassificationResult, Command, CommandEvent, Intent, Timestamp};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CommandStateMachine {
    active: Intent,
    /// Label currently accumulating a streak, never equal to `active`
    candidate: Option<Intent>,
    streak: u32,
    debounce_window: u32,
    hold_timeout: Option<Duration>,
    /// Time of the last ENTER or HOLD for the active command
    last_signal_at: Option<Timestamp>,
}

impl CommandStateMachine {
    /// Create a machine in IDLE
    ///
    /// # Arguments
    /// * `debounce_window` - Consecutive windows needed to commit a label (>= 1)
    /// * `command_hold_timeout_ms` - HOLD spacing, 0 disables HOLD
    pub fn new(debounce_window: u32, command_hold_timeout_ms: u64) -> Result<Self, CommandError> {
        if debounce_window == 0 {
            return Err(CommandError::InvalidConfig(
                "debounce_window must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            active: Intent::Idle,
            candidate: None,
            streak: 0,
            debounce_window,
            hold_timeout: hold_timeout(command_hold_timeout_ms),
            last_signal_at: None,
        })
    }

    pub fn from_settings(settings: &DebounceSettings) -> Result<Self, CommandError> {
        Self::new(settings.debounce_window, settings.command_hold_timeout_ms)
    }

    /// Feed one classification, returning the events it produces in order
    pub fn observe(&mut self, result: &ClassificationResult) -> Vec<CommandEvent> {
        let mut events = Vec::new();
        let label = result.label;
        let now = result.timestamp;

        if label == self.active {
            // Any pending switch is abandoned
            self.candidate = None;
            self.streak = 0;

            if let (Some(command), Some(timeout), Some(last)) =
                (self.active.command(), self.hold_timeout, self.last_signal_at)
            {
                if now.duration_since(last) >= timeout {
                    events.push(CommandEvent::hold(command, now));
                    self.last_signal_at = Some(now);
                }
            }
            return events;
        }

        if self.candidate == Some(label) {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.candidate = Some(label);
            self.streak = 1;
        }
        debug!(
            "[COMMAND] {} streak {}/{} (active {})",
            label, self.streak, self.debounce_window, self.active
        );

        if self.streak >= self.debounce_window {
            let previous = self.active;
            if let Some(command) = previous.command() {
                events.push(CommandEvent::exit(command, now));
            }
            if let Some(command) = label.command() {
                events.push(CommandEvent::enter(command, now));
                self.last_signal_at = Some(now);
            } else {
                self.last_signal_at = None;
            }
            info!("[COMMAND] {} -> {} at {}", previous, label, now);
            self.active = label;
            self.candidate = None;
            self.streak = 0;
        }

        events
    }

    /// Apply new debounce settings. A changed debounce window clears any
    /// pending streak; the active state is kept.
    pub fn reconfigure(&mut self, settings: &DebounceSettings) -> Result<(), CommandError> {
        if settings.debounce_window == 0 {
            return Err(CommandError::InvalidConfig(
                "debounce_window must be at least 1".to_string(),
            ));
        }
        if settings.debounce_window != self.debounce_window {
            debug!(
                "[COMMAND] Debounce window {} -> {}, pending streak cleared",
                self.debounce_window, settings.debounce_window
            );
            self.debounce_window = settings.debounce_window;
            self.candidate = None;
            self.streak = 0;
        }
        self.hold_timeout = hold_timeout(settings.command_hold_timeout_ms);
        Ok(())
    }

    /// Drop to IDLE immediately, returning `EXIT` for an active command
    pub fn force_idle(&mut self, timestamp: Timestamp) -> Option<CommandEvent> {
        let previous = std::mem::replace(&mut self.active, Intent::Idle);
        self.candidate = None;
        self.streak = 0;
        self.last_signal_at = None;

        let command = previous.command()?;
        info!("[COMMAND] Forced {} -> idle at {}", previous, timestamp);
        Some(CommandEvent::exit(command, timestamp))
    }

    pub fn active(&self) -> Intent {
        self.active
    }

    pub fn active_command(&self) -> Option<Command> {
        self.active.command()
    }

    /// Label accumulating a streak and its current count
    pub fn pending(&self) -> Option<(Intent, u32)> {
        self.candidate.map(|label| (label, self.streak))
    }

    pub fn debounce_window(&self) -> u32 {
        self.debounce_window
    }
}

fn hold_timeout(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use impulse_structures::Transition;

    fn at(ms: u64, label: Intent, confidence: f32) -> ClassificationResult {
        ClassificationResult::new(label, confidence, Timestamp::from_millis(ms))
    }

    fn feed(machine: &mut CommandStateMachine, labels: &[Intent]) -> Vec<(usize, CommandEvent)> {
        labels
            .iter()
            .enumerate()
            .flat_map(|(i, label)| {
                let events = machine.observe(&at(i as u64 * 100, *label, 0.9));
                events.into_iter().map(move |e| (i + 1, e))
            })
            .collect()
    }

    #[test]
    fn test_zero_debounce_rejected() {
        assert!(CommandStateMachine::new(0, 500).is_err());
    }

    #[test]
    fn test_enter_after_debounce_window() {
        let mut machine = CommandStateMachine::new(3, 0).unwrap();
        let events = feed(
            &mut machine,
            &[Intent::Idle, Intent::Forward, Intent::Forward, Intent::Forward, Intent::Forward],
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 4);
        assert_eq!(events[0].1.command, Command::Forward);
        assert_eq!(events[0].1.transition, Transition::Enter);
        assert_eq!(machine.active(), Intent::Forward);
    }

    #[test]
    fn test_interleaved_label_resets_streak() {
        let mut machine = CommandStateMachine::new(3, 0).unwrap();
        let events = feed(
            &mut machine,
            &[
                Intent::Forward,
                Intent::Forward,
                Intent::Idle,
                Intent::Forward,
                Intent::Forward,
                Intent::Forward,
            ],
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 6);
    }

    #[test]
    fn test_switch_emits_exit_then_enter() {
        let mut machine = CommandStateMachine::new(2, 0).unwrap();
        let events = feed(
            &mut machine,
            &[Intent::Forward, Intent::Forward, Intent::Stop, Intent::Stop],
        );
        let kinds: Vec<_> = events.iter().map(|(_, e)| (e.transition, e.command)).collect();
        assert_eq!(
            kinds,
            vec![
                (Transition::Enter, Command::Forward),
                (Transition::Exit, Command::Forward),
                (Transition::Enter, Command::Stop),
            ]
        );
        assert_eq!(events[1].1.timestamp, events[2].1.timestamp);
    }

    #[test]
    fn test_returning_to_idle_is_debounced() {
        let mut machine = CommandStateMachine::new(2, 0).unwrap();
        feed(&mut machine, &[Intent::Reverse, Intent::Reverse]);
        assert!(machine.observe(&at(1_000, Intent::Idle, 0.8)).is_empty());
        let events = machine.observe(&at(1_100, Intent::Idle, 0.8));
        assert_eq!(events, vec![CommandEvent::exit(Command::Reverse, Timestamp::from_millis(1_100))]);
        assert_eq!(machine.active(), Intent::Idle);
    }

    #[test]
    fn test_hold_spacing() {
        let mut machine = CommandStateMachine::new(1, 250).unwrap();
        assert_eq!(machine.observe(&at(0, Intent::ArmUp, 0.9)).len(), 1);

        let mut holds = Vec::new();
        for ms in (100..=1_000).step_by(100) {
            holds.extend(machine.observe(&at(ms, Intent::ArmUp, 0.9)));
        }
        let times: Vec<u64> = holds.iter().map(|e| e.timestamp.as_micros() / 1_000).collect();
        assert_eq!(times, vec![300, 600, 900]);
        assert!(holds.iter().all(|e| e.transition == Transition::Hold));
    }

    #[test]
    fn test_zero_hold_timeout_disables_hold() {
        let mut machine = CommandStateMachine::new(1, 0).unwrap();
        machine.observe(&at(0, Intent::Stop, 0.9));
        for ms in 1..50 {
            assert!(machine.observe(&at(ms * 1_000, Intent::Stop, 0.9)).is_empty());
        }
    }

    #[test]
    fn test_reconfigure_clears_pending() {
        let mut machine = CommandStateMachine::new(3, 0).unwrap();
        feed(&mut machine, &[Intent::Forward, Intent::Forward]);
        assert_eq!(machine.pending(), Some((Intent::Forward, 2)));

        machine
            .reconfigure(&DebounceSettings {
                debounce_window: 2,
                command_hold_timeout_ms: 0,
            })
            .unwrap();
        assert_eq!(machine.pending(), None);
        assert!(machine.observe(&at(500, Intent::Forward, 0.9)).is_empty());
        assert_eq!(machine.observe(&at(600, Intent::Forward, 0.9)).len(), 1);
    }

    #[test]
    fn test_force_idle() {
        let mut machine = CommandStateMachine::new(1, 0).unwrap();
        assert_eq!(machine.force_idle(Timestamp::from_millis(1)), None);

        machine.observe(&at(0, Intent::TurnLeft, 0.9));
        let exit = machine.force_idle(Timestamp::from_millis(5)).unwrap();
        assert_eq!(exit, CommandEvent::exit(Command::TurnLeft, Timestamp::from_millis(5)));
        assert_eq!(machine.active(), Intent::Idle);
        assert_eq!(machine.active_command(), None);
    }
}
