//! Error types shared by the fauxbar crates.

use crate::state::{LifecycleState, Operation};

/// Error type for provider operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Errors that can occur while driving a progress provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgressError {
    /// Operation called in a state that does not permit it
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        /// The rejected operation
        operation: Operation,
        /// State at the time of the call
        state: LifecycleState,
    },

    /// Lifecycle transition not present in the transition table
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: LifecycleState,
        /// Requested state
        to: LifecycleState,
    },

    /// Malformed step or animator configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `start` was called before any steps were set up
    #[error("no steps configured; call setup before start")]
    NotConfigured,

    /// The animation timer could not be scheduled
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Configuration problems detected before any state is mutated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A plan needs at least one step
    #[error("step count must be at least 1")]
    NoSteps,

    /// Per-step list does not have one entry per step
    #[error("expected {expected} {what}, got {actual}")]
    LengthMismatch {
        /// Which list was wrong
        what: &'static str,
        /// Number of steps
        expected: usize,
        /// Entries supplied
        actual: usize,
    },

    /// A step needs at least one completion signal
    #[error("step {step} has concurrency 0; must be at least 1")]
    ZeroConcurrency {
        /// Offending step index
        step: usize,
    },

    /// Weight outside (0, 1] or not a finite number
    #[error("step {step} weight {weight} is outside (0, 1]")]
    WeightOutOfRange {
        /// Offending step index
        step: usize,
        /// Offending weight
        weight: f64,
    },

    /// Weights must never decrease
    #[error("step {step} weight {weight} is below previous weight {previous}")]
    NonMonotonicWeight {
        /// Offending step index
        step: usize,
        /// Weight of the step before it
        previous: f64,
        /// Offending weight
        weight: f64,
    },

    /// The last weight must be exactly 1.0
    #[error("last weight must be 1.0, got {0}")]
    TerminalWeight(f64),

    /// Added steps must not start below the progress already earned
    #[error("first added weight {weight} is below completed weight {completed}")]
    BelowCompleted {
        /// Weight earned by completed steps
        completed: f64,
        /// First supplied weight
        weight: f64,
    },

    /// Animator setting outside its valid range
    #[error("invalid animator setting {name}: {reason}")]
    Animator {
        /// Setting name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}
