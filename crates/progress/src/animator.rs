//! Progress animation within and across steps.

use std::time::{Duration, Instant};

use fauxbar_core::StepPlan;

use crate::config::AnimatorConfig;

/// Timing of the step in flight.
#[derive(Debug, Clone, Copy)]
pub struct StepRuntime {
    /// Estimated duration driving the curve
    pub estimate: Duration,

    /// When the step last resumed; `None` while suspended
    resumed_at: Option<Instant>,

    /// Running time accumulated before the last suspension
    carried: Duration,
}

impl StepRuntime {
    fn new(estimate: Duration, now: Instant) -> Self {
        Self {
            estimate,
            resumed_at: Some(now),
            carried: Duration::ZERO,
        }
    }

    /// Running time of the step, excluding suspended periods.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.carried
            + self
                .resumed_at
                .map_or(Duration::ZERO, |resumed| now.saturating_duration_since(resumed))
    }

    /// Whether the step clock is frozen.
    pub fn is_paused(&self) -> bool {
        self.resumed_at.is_none()
    }
}

/// Moves the displayed value toward the current step's target.
///
/// The value eases from the previous step's weight toward the current one but
/// is held below `previous + span * step_ceiling` until the step is confirmed
/// with [`ProgressAnimator::complete_step`]. It never moves backwards.
#[derive(Debug, Clone)]
pub struct ProgressAnimator {
    config: AnimatorConfig,
    progress: f64,
    runtime: Option<StepRuntime>,
}

impl ProgressAnimator {
    /// Create an animator at zero progress.
    pub fn new(config: AnimatorConfig) -> Self {
        Self {
            config,
            progress: 0.0,
            runtime: None,
        }
    }

    /// Animator settings.
    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    /// Displayed progress.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Timing of the step in flight.
    pub fn runtime(&self) -> Option<&StepRuntime> {
        self.runtime.as_ref()
    }

    /// Start animating a new step.
    pub fn begin_step(&mut self, estimate: Duration, now: Instant) {
        self.runtime = Some(StepRuntime::new(estimate, now));
    }

    /// Value the curve gives for the step in flight at `now`.
    pub fn target_at(&self, plan: &StepPlan, now: Instant) -> Option<f64> {
        let runtime = self.runtime.as_ref()?;
        let from = plan.previous_weight();
        let span = (plan.current_weight() - from).max(0.0);

        let fraction = if runtime.estimate.is_zero() {
            f64::INFINITY
        } else {
            runtime.elapsed(now).as_secs_f64() / runtime.estimate.as_secs_f64()
        };
        let share = self.config.easing.apply(fraction).min(self.config.step_ceiling);
        Some(from + span * share)
    }

    /// Advance the displayed value. Returns the new value if it grew.
    pub fn tick(&mut self, plan: &StepPlan, now: Instant) -> Option<f64> {
        if self.runtime.as_ref().map_or(true, StepRuntime::is_paused) {
            return None;
        }
        let value = self.target_at(plan, now)?;
        if value > self.progress {
            self.progress = value;
            Some(value)
        } else {
            None
        }
    }

    /// Confirm the step in flight: jump to `weight` and return the step's running time.
    pub fn complete_step(&mut self, weight: f64, now: Instant) -> Duration {
        self.progress = self.progress.max(weight);
        self.runtime
            .take()
            .map_or(Duration::ZERO, |runtime| runtime.elapsed(now))
    }

    /// Freeze the step clock.
    pub fn pause(&mut self, now: Instant) {
        if let Some(runtime) = self.runtime.as_mut() {
            if let Some(resumed) = runtime.resumed_at.take() {
                runtime.carried += now.saturating_duration_since(resumed);
            }
        }
    }

    /// Restart the step clock where it was frozen.
    pub fn resume(&mut self, now: Instant) {
        if let Some(runtime) = self.runtime.as_mut() {
            if runtime.resumed_at.is_none() {
                runtime.resumed_at = Some(now);
            }
        }
    }

    /// Back to zero with no step in flight.
    pub fn clear(&mut self) {
        self.progress = 0.0;
        self.runtime = None;
    }
}
