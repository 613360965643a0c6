//! Manual override commands
//!
//! Text form, one command per line:
//!
//! ```text
//! manual on
//! manual off
//! signal 2 green
//! ```
//!
//! Signals are numbered 1-4 in cycle order (north, east, south, west).

use std::str::FromStr;

use super::error::SimError;
use super::types::{Direction, Light};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetManualMode(bool),
    SetSignal { signal: usize, state: Light },
}

impl ControlCommand {
    /// Direction addressed by a 1-based signal number
    pub fn direction_of(signal: usize) -> Option<Direction> {
        signal.checked_sub(1).and_then(Direction::from_index)
    }
}

impl FromStr for ControlCommand {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<String> = s
            .split_whitespace()
            .map(|w| w.to_ascii_lowercase())
            .collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["manual", "on"] => Ok(ControlCommand::SetManualMode(true)),
            ["manual", "off"] => Ok(ControlCommand::SetManualMode(false)),
            ["signal", number, state] => {
                let signal = number.parse::<usize>().map_err(|_| {
                    SimError::InvalidCommand(format!("bad signal number '{}'", number))
                })?;
                if Self::direction_of(signal).is_none() {
                    return Err(SimError::InvalidCommand(format!(
                        "signal {} does not exist",
                        signal
                    )));
                }
                let state = state.parse::<Light>().map_err(SimError::InvalidCommand)?;
                Ok(ControlCommand::SetSignal { signal, state })
            }
            _ => Err(SimError::InvalidCommand(format!("unrecognised command '{}'", s.trim()))),
        }
    }
}
