//! Simulated progress (Layer 2)
//!
//! Estimation, animation, timers and the provider facade that a progress
//! indicator binds to.

#![warn(missing_docs)]

pub mod animator;
pub mod clock;
pub mod config;
pub mod estimator;
pub mod listener;
pub mod provider;
pub mod scheduler;

pub use animator::{ProgressAnimator, StepRuntime};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{AnimatorConfig, Easing};
pub use estimator::EstimationEngine;
pub use listener::{CompletionListener, ListenerRegistry, ProgressListener};
pub use provider::{FakeProgressProvider, ProviderBuilder};
pub use scheduler::{TickFn, TickScheduler, TimerHandle, TokioScheduler, VirtualTime};

pub use fauxbar_core::{
    ConfigError, EstimateStrategy, LifecycleState, ProgressError, ProgressSnapshot, Result,
};
