//! The component lifecycle state machine.
//!
//! A component moves through a fixed sequence of states from creation to
//! termination. Operations on a component are gated on its current state:
//! the task/request engine only accepts work while the component is
//! `Started`, teardown operations require the preceding phase to have
//! completed, and `Terminated` is final.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a component.
///
/// The legal order is `Initialized → Started → Finalized → ShuttingDown →
/// Shutdown → Terminated`. The two last transitions are driven by the
/// executor pools reporting drained and terminated, and are observed
/// lazily (polling or bounded waiting) rather than synchronously.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentState {
    /// Component is created and wired but not yet started.
    Initialized,

    /// Component is running and its engine accepts tasks and requests.
    Started,

    /// Component has ended service; plugins finalized, reflection port
    /// unpublished.
    Finalized,

    /// Component teardown has begun; pools are draining.
    ShuttingDown,

    /// All pools have drained.
    Shutdown,

    /// All pool threads have exited. Final state; the component is never
    /// reused.
    Terminated,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "Initialized"),
            Self::Started => write!(f, "Started"),
            Self::Finalized => write!(f, "Finalized"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

impl ComponentState {
    /// Check if this state is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Check if the component is still in its wiring phase, where ports,
    /// pools, and plugins may be added.
    pub fn is_wirable(&self) -> bool {
        matches!(self, Self::Initialized | Self::Started)
    }

    /// Check if teardown has begun.
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Shutdown | Self::Terminated)
    }

    /// Get the valid next states from this state.
    pub fn valid_next_states(&self) -> Vec<ComponentState> {
        match self {
            Self::Initialized => vec![Self::Started],
            Self::Started => vec![Self::Finalized],
            Self::Finalized => vec![Self::ShuttingDown],
            Self::ShuttingDown => vec![Self::Shutdown],
            Self::Shutdown => vec![Self::Terminated],
            Self::Terminated => vec![],
        }
    }

    /// Check if a transition to the given state is valid.
    pub fn can_transition_to(&self, next: ComponentState) -> bool {
        self.valid_next_states().contains(&next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_chain() {
        let order = [
            ComponentState::Initialized,
            ComponentState::Started,
            ComponentState::Finalized,
            ComponentState::ShuttingDown,
            ComponentState::Shutdown,
            ComponentState::Terminated,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skips_or_reversals() {
        assert!(!ComponentState::Initialized.can_transition_to(ComponentState::Finalized));
        assert!(!ComponentState::Started.can_transition_to(ComponentState::Initialized));
        assert!(!ComponentState::Started.can_transition_to(ComponentState::Shutdown));
        assert!(ComponentState::Terminated.valid_next_states().is_empty());
    }

    #[test]
    fn test_predicates() {
        assert!(ComponentState::Initialized.is_wirable());
        assert!(ComponentState::Started.is_wirable());
        assert!(!ComponentState::Finalized.is_wirable());
        assert!(ComponentState::ShuttingDown.is_shutting_down());
        assert!(ComponentState::Terminated.is_terminal());
        assert!(!ComponentState::Shutdown.is_terminal());
    }

    #[test]
    fn test_state_serde() {
        let state = ComponentState::Started;
        let serialized = serde_json::to_string(&state).unwrap();
        let deserialized: ComponentState = serde_json::from_str(&serialized).unwrap();
        assert_eq!(state, deserialized);
    }
}
