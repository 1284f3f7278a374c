//! Animator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use fauxbar_core::ConfigError;

/// Decelerating curve mapping elapsed/estimated time to a share of a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Easing {
    /// `1 - e^(-rate * f)`: never reaches the target, slows down forever
    Exponential {
        /// Decay rate; higher moves faster early on
        rate: f64,
    },
    /// `1 - (1 - f)^2`, flat once the estimate has elapsed
    Quadratic,
}

impl Easing {
    /// Map an elapsed fraction of the estimate to a share of the step in [0, 1].
    pub fn apply(&self, fraction: f64) -> f64 {
        if fraction.is_nan() || fraction <= 0.0 {
            return 0.0;
        }
        match *self {
            Easing::Exponential { rate } => 1.0 - (-rate * fraction).exp(),
            Easing::Quadratic => {
                let rest = 1.0 - fraction.min(1.0);
                1.0 - rest * rest
            }
        }
    }
}

impl Default for Easing {
    fn default() -> Self {
        Easing::Exponential { rate: 2.5 }
    }
}

/// Configuration for the progress animator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Time between animation ticks
    pub tick_interval: Duration,

    /// Curve used inside each step
    pub easing: Easing,

    /// Largest share of a step shown before it is confirmed, in (0, 1)
    pub step_ceiling: f64,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            easing: Easing::default(),
            step_ceiling: 0.99,
        }
    }
}

impl AnimatorConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the easing curve.
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Set the step ceiling.
    pub fn with_step_ceiling(mut self, ceiling: f64) -> Self {
        self.step_ceiling = ceiling;
        self
    }

    /// Check every setting is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Animator {
                name: "tick_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(self.step_ceiling > 0.0 && self.step_ceiling < 1.0) {
            return Err(ConfigError::Animator {
                name: "step_ceiling",
                reason: format!("{} is outside (0, 1)", self.step_ceiling),
            });
        }
        if let Easing::Exponential { rate } = self.easing {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(ConfigError::Animator {
                    name: "easing.rate",
                    reason: format!("{} must be a positive number", rate),
                });
            }
        }
        Ok(())
    }
}
