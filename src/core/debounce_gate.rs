// Debounce gate - turns a noisy per-frame label stream into a stable binary signal
//
// Slow to activate (needs `threshold` consecutive matches), fast to deactivate
// (a single non-matching sample drops a HIGH signal).

use crate::models::pose::ClassificationSample;
use crate::models::signal::{GateState, Signal, SignalError, SignalResult, Transition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Label considered "correct"
    pub target_label: String,
    /// Consecutive matching samples needed before the signal goes HIGH
    pub threshold: u32,
    /// Ceiling for the match counter
    pub max_count: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            target_label: "correct".to_string(),
            threshold: 60, // ~1 second at 60 frames per second
            max_count: 2000,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> SignalResult<()> {
        if self.threshold == 0 {
            return Err(SignalError::InvalidConfiguration(
                "threshold must be at least 1".to_string(),
            ));
        }

        if self.threshold > self.max_count {
            return Err(SignalError::InvalidConfiguration(format!(
                "threshold {} exceeds max count {}",
                self.threshold, self.max_count
            )));
        }

        Ok(())
    }
}

pub struct DebounceGate {
    config: GateConfig,
    state: GateState,
}

impl DebounceGate {
    pub fn new(config: GateConfig) -> SignalResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: GateState::default(),
        })
    }

    /// Feed one frame's sample. Returns the transition it caused, if any.
    pub fn observe(&mut self, sample: &ClassificationSample) -> Option<Transition> {
        if sample.label == self.config.target_label {
            self.state.consecutive_matches = self
                .state
                .consecutive_matches
                .saturating_add(1)
                .min(self.config.max_count);
        } else {
            self.state.consecutive_matches = 0;

            if self.state.signal == Signal::High {
                self.state.signal = Signal::Low;
                info!(
                    "Signal LOW: '{}' ({:.2}) replaced '{}'",
                    sample.label, sample.confidence, self.config.target_label
                );
                return Some(Transition::low());
            }
        }

        if self.state.signal == Signal::Low
            && self.state.consecutive_matches >= self.config.threshold
        {
            self.state.signal = Signal::High;
            info!(
                "Signal HIGH: '{}' held for {} samples",
                self.config.target_label, self.state.consecutive_matches
            );
            return Some(Transition::high());
        }

        debug!(
            "Gate: label='{}' confidence={:.2} matches={} signal={}",
            sample.label, sample.confidence, self.state.consecutive_matches, self.state.signal
        );
        None
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn signal(&self) -> Signal {
        self.state.signal
    }

    pub fn consecutive_matches(&self) -> u32 {
        self.state.consecutive_matches
    }

    pub fn target_label(&self) -> &str {
        &self.config.target_label
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Back to LOW with no matches. Emits nothing.
    pub fn reset(&mut self) {
        self.state = GateState::default();
    }
}
