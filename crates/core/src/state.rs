//! Provider lifecycle states and the transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProgressError, Result};

/// Lifecycle state of a progress provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Freshly constructed. Can move to `Resumed`.
    #[default]
    Initialized,
    /// Animating. Can move to `Suspended`, `Reseted` or `Finished`.
    Resumed,
    /// Timer frozen, step time preserved. Can move to `Resumed` or `Reseted`.
    Suspended,
    /// Cancelled or rewound. Can move to `Resumed`.
    Reseted,
    /// Every step completed. Can move to `Reseted`.
    Finished,
}

/// Public operations gated by lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Define the steps
    Setup,
    /// Install progress and completion listeners
    RegisterListener,
    /// Begin animating the first step
    Start,
    /// Append steps to a running plan
    DynamicAdd,
    /// Signal one completion for the current step
    FinishStep,
    /// Freeze the animation
    Suspend,
    /// Unfreeze the animation
    Resume,
    /// Cancel and rewind
    Reset,
}

impl Operation {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Setup => "setup",
            Operation::RegisterListener => "register_listener",
            Operation::Start => "start",
            Operation::DynamicAdd => "dynamic_add",
            Operation::FinishStep => "finish_step",
            Operation::Suspend => "suspend",
            Operation::Resume => "resume",
            Operation::Reset => "reset",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LifecycleState {
    /// Check whether the transition table allows `self -> to`.
    pub fn can_transition_to(&self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Initialized, Resumed)
                | (Resumed, Suspended)
                | (Resumed, Reseted)
                | (Resumed, Finished)
                | (Suspended, Resumed)
                | (Suspended, Reseted)
                | (Reseted, Resumed)
                | (Finished, Reseted)
        )
    }

    /// Move to `to`, failing if the table forbids it.
    pub fn transition(&mut self, to: LifecycleState) -> Result<()> {
        if !self.can_transition_to(to) {
            return Err(ProgressError::InvalidTransition { from: *self, to });
        }
        *self = to;
        Ok(())
    }

    /// Land in `Reseted` from any state, including `Initialized`.
    pub fn reset(&mut self) {
        *self = LifecycleState::Reseted;
    }

    /// Whether a run is in flight (animating or frozen).
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Resumed | Self::Suspended)
    }

    /// Operations the provider accepts in this state.
    pub fn allowed_operations(&self) -> &'static [Operation] {
        use Operation::*;
        match self {
            Self::Initialized | Self::Reseted => &[Setup, RegisterListener, Start, Reset],
            Self::Resumed => &[DynamicAdd, FinishStep, Suspend, Reset],
            Self::Suspended => &[DynamicAdd, FinishStep, Resume, Reset],
            Self::Finished => &[FinishStep, Reset],
        }
    }

    /// Check `op` against [`allowed_operations`](Self::allowed_operations).
    pub fn ensure_allows(&self, op: Operation) -> Result<()> {
        if self.allowed_operations().contains(&op) {
            Ok(())
        } else {
            Err(ProgressError::InvalidState {
                operation: op,
                state: *self,
            })
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Initialized => write!(f, "initialized"),
            LifecycleState::Resumed => write!(f, "resumed"),
            LifecycleState::Suspended => write!(f, "suspended"),
            LifecycleState::Reseted => write!(f, "reseted"),
            LifecycleState::Finished => write!(f, "finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    const ALL: [LifecycleState; 5] = [Initialized, Resumed, Suspended, Reseted, Finished];

    #[test]
    fn test_transition_table() {
        let legal = [
            (Initialized, Resumed),
            (Resumed, Suspended),
            (Resumed, Reseted),
            (Resumed, Finished),
            (Suspended, Resumed),
            (Suspended, Reseted),
            (Reseted, Resumed),
            (Finished, Reseted),
        ];

        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut state = Initialized;
        let err = state.transition(Finished).unwrap_err();
        assert_eq!(
            err,
            ProgressError::InvalidTransition {
                from: Initialized,
                to: Finished
            }
        );
        assert_eq!(state, Initialized);
    }

    #[test]
    fn test_full_run() {
        let mut state = LifecycleState::default();
        state.transition(Resumed).unwrap();
        state.transition(Suspended).unwrap();
        state.transition(Resumed).unwrap();
        state.transition(Finished).unwrap();
        state.transition(Reseted).unwrap();
        state.transition(Resumed).unwrap();
        assert_eq!(state, Resumed);
    }

    #[test]
    fn test_reset_from_any_state() {
        for from in ALL {
            let mut state = from;
            state.reset();
            assert_eq!(state, Reseted);
        }
    }

    #[test]
    fn test_is_running() {
        let running: Vec<_> = ALL.into_iter().filter(LifecycleState::is_running).collect();
        assert_eq!(running, vec![Resumed, Suspended]);
    }

    #[test]
    fn test_allowed_operations() {
        assert!(Initialized.ensure_allows(Operation::Setup).is_ok());
        assert!(Reseted.ensure_allows(Operation::RegisterListener).is_ok());
        assert!(Resumed.ensure_allows(Operation::DynamicAdd).is_ok());
        assert!(Suspended.ensure_allows(Operation::Resume).is_ok());

        let err = Resumed.ensure_allows(Operation::Setup).unwrap_err();
        assert_eq!(
            err,
            ProgressError::InvalidState {
                operation: Operation::Setup,
                state: Resumed
            }
        );
        assert_eq!(err.to_string(), "setup is not allowed while resumed");

        for state in ALL {
            assert!(state.ensure_allows(Operation::Reset).is_ok());
        }
    }
}
