//! fauxbar core data models.
//!
//! Lifecycle states, step plans, estimation strategies and the errors
//! shared by the simulated-progress provider.

#![warn(missing_docs)]

mod error;
mod plan;
mod snapshot;
mod state;
mod strategy;

pub use error::{ConfigError, ProgressError, Result};
pub use plan::{StepDefinition, StepPlan};
pub use snapshot::ProgressSnapshot;
pub use state::{LifecycleState, Operation};
pub use strategy::EstimateStrategy;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
