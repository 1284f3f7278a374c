//! Point-in-time view of a provider.

use serde::{Deserialize, Serialize};

use crate::state::LifecycleState;
use crate::Time;

/// A snapshot of progress at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Lifecycle state
    pub state: LifecycleState,

    /// Displayed overall progress in [0, 1]
    pub progress: f64,

    /// Index of the step in flight
    pub current_step: usize,

    /// Total number of steps
    pub steps: usize,

    /// When snapshot was taken
    pub taken_at: Time,
}

impl ProgressSnapshot {
    /// Progress as a whole percentage, for display.
    pub fn percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).floor() as u8
    }
}
