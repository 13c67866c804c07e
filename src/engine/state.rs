use crate::core::{AcquisitionError, Result};
use serde::{Deserialize, Serialize};

/// Acquisition loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Running,
    /// Cancellation requested, waiting for the loop thread to exit
    Stopping,
}

impl LoopState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &LoopState) -> bool {
        use LoopState::*;

        matches!(
            (self, target),
            (Idle, Running) |
            (Running, Stopping) |
            // fatal source failure
            (Running, Idle) |
            (Stopping, Idle)
        )
    }

    /// Transition to a new state with validation
    pub fn transition_to(&mut self, target: LoopState) -> Result<()> {
        if !self.can_transition_to(&target) {
            return Err(AcquisitionError::InvalidTransition {
                from: self.name(),
                to: target.name(),
            });
        }
        *self = target;
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
        }
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(LoopState::Idle.can_transition_to(&LoopState::Running));
        assert!(LoopState::Running.can_transition_to(&LoopState::Stopping));
        assert!(LoopState::Stopping.can_transition_to(&LoopState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!LoopState::Idle.can_transition_to(&LoopState::Stopping));
        assert!(!LoopState::Stopping.can_transition_to(&LoopState::Running));
        assert!(!LoopState::Running.can_transition_to(&LoopState::Running));
    }

    #[test]
    fn test_transition_to_rejects_invalid() {
        let mut state = LoopState::Idle;
        assert_eq!(
            state.transition_to(LoopState::Stopping),
            Err(AcquisitionError::InvalidTransition {
                from: "Idle",
                to: "Stopping"
            })
        );
        assert_eq!(state, LoopState::Idle);
        state.transition_to(LoopState::Running).unwrap();
        assert_eq!(state, LoopState::Running);
    }
}
