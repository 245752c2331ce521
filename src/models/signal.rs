// Data models for the binary correct/incorrect signal

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output level of the debounce gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    #[default]
    Low,
    High,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Low => "low",
            Signal::High => "high",
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Signal::High)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change of the signal's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub to: Signal,
}

impl Transition {
    pub fn high() -> Self {
        Self { to: Signal::High }
    }

    pub fn low() -> Self {
        Self { to: Signal::Low }
    }
}

/// Snapshot of a gate's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GateState {
    pub consecutive_matches: u32,
    pub signal: Signal,
}

/// Lines written to the microcontroller for each signal level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMessages {
    pub high: String,
    pub low: String,
}

impl SignalMessages {
    pub fn for_signal(&self, signal: Signal) -> &str {
        match signal {
            Signal::High => &self.high,
            Signal::Low => &self.low,
        }
    }
}

impl Default for SignalMessages {
    fn default() -> Self {
        Self {
            high: "correct\n".to_string(),
            low: "incorrect\n".to_string(),
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SignalResult<T> = Result<T, SignalError>;
