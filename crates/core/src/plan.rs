//! Step plan - ordered steps with concurrency counts and accumulated weights.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Slack allowed when checking that the last weight is 1.0.
const WEIGHT_EPSILON: f64 = 1e-9;

/// One step of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Position in the plan
    pub index: usize,

    /// Number of `finish_step` calls needed to complete the step
    pub concurrency: u32,

    /// Overall progress once this step completes, in (0, 1]
    pub weight: f64,
}

/// Ordered steps plus a cursor on the step in flight.
///
/// The plan remembers the steps it was set up with so a reset can rewind to
/// them, discarding anything appended by [`StepPlan::dynamic_add`].
#[derive(Debug, Clone, Default)]
pub struct StepPlan {
    steps: Vec<StepDefinition>,
    baseline: Vec<StepDefinition>,
    current: usize,
    remaining: u32,
}

impl StepPlan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the plan. Weights default to an even split, concurrencies to 1.
    pub fn setup(
        &mut self,
        step_count: usize,
        concurrencies: Option<&[u32]>,
        weights: Option<&[f64]>,
    ) -> Result<(), ConfigError> {
        if step_count == 0 {
            return Err(ConfigError::NoSteps);
        }
        let concurrencies = resolve_concurrencies(step_count, concurrencies, 0)?;
        let weights = match weights {
            Some(weights) => validate_weights(step_count, weights, 0)?,
            None => even_split(0.0, step_count),
        };

        self.baseline = concurrencies
            .into_iter()
            .zip(weights)
            .enumerate()
            .map(|(index, (concurrency, weight))| StepDefinition {
                index,
                concurrency,
                weight,
            })
            .collect();
        self.rewind();
        Ok(())
    }

    /// Append steps to a plan in flight.
    ///
    /// Without weights, every step not yet completed (including the one in
    /// flight) is spread evenly over `[completed, 1.0]`. With weights, they are
    /// the new steps' targets; the unfinished existing steps are spread evenly
    /// beneath the first of them.
    pub fn dynamic_add(
        &mut self,
        step_count: usize,
        concurrencies: Option<&[u32]>,
        weights: Option<&[f64]>,
    ) -> Result<(), ConfigError> {
        self.dynamic_add_above(self.previous_weight(), step_count, concurrencies, weights)
    }

    /// Like [`dynamic_add`](Self::dynamic_add), but unfinished steps are spread
    /// above `floor` (typically the value already on screen) instead of the
    /// completed weight.
    ///
    /// Explicit weights are still only required to stay at or above the
    /// completed weight; when the first of them is below `floor`, the pending
    /// steps are spread from the first weight itself.
    pub fn dynamic_add_above(
        &mut self,
        floor: f64,
        step_count: usize,
        concurrencies: Option<&[u32]>,
        weights: Option<&[f64]>,
    ) -> Result<(), ConfigError> {
        if step_count == 0 {
            return Err(ConfigError::NoSteps);
        }
        let offset = self.steps.len();
        let concurrencies = resolve_concurrencies(step_count, concurrencies, offset)?;
        let completed = self.previous_weight();
        let base = if floor.is_finite() {
            floor.clamp(completed, 1.0)
        } else {
            completed
        };
        let pending = self.steps.len().saturating_sub(self.current);

        let (pending_weights, new_weights) = match weights {
            Some(weights) => {
                let new_weights = validate_weights(step_count, weights, offset)?;
                let first = new_weights[0];
                if first < completed {
                    return Err(ConfigError::BelowCompleted {
                        completed,
                        weight: first,
                    });
                }
                let base = base.min(first);
                let pending_weights = (1..=pending)
                    .map(|k| base + (first - base) * k as f64 / (pending + 1) as f64)
                    .collect::<Vec<_>>();
                (pending_weights, new_weights)
            }
            None => {
                let mut all = even_split(base, pending + step_count);
                let new_weights = all.split_off(pending);
                (all, new_weights)
            }
        };

        for (step, weight) in self.steps[self.current..].iter_mut().zip(pending_weights) {
            step.weight = weight;
        }
        self.steps.extend(
            concurrencies
                .into_iter()
                .zip(new_weights)
                .enumerate()
                .map(|(i, (concurrency, weight))| StepDefinition {
                    index: offset + i,
                    concurrency,
                    weight,
                }),
        );
        Ok(())
    }

    /// Restore the set-up steps and move the cursor back to the first one.
    pub fn rewind(&mut self) {
        self.steps = self.baseline.clone();
        self.current = 0;
        self.remaining = self.steps.first().map_or(0, |s| s.concurrency);
    }

    /// Register one completion signal for the current step.
    ///
    /// Returns `true` when the step has received all the signals it needs.
    pub fn complete_signal(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    /// Move the cursor to the next step. Returns `false` at the end of the plan.
    pub fn advance(&mut self) -> bool {
        match self.steps.get(self.current + 1) {
            Some(next) => {
                self.current += 1;
                self.remaining = next.concurrency;
                true
            }
            None => false,
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are defined.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All step definitions.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Concurrency count of every step.
    pub fn concurrencies(&self) -> Vec<u32> {
        self.steps.iter().map(|s| s.concurrency).collect()
    }

    /// Accumulated weight of every step.
    pub fn weights(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.weight).collect()
    }

    /// Index of the step in flight.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The step in flight.
    pub fn current(&self) -> Option<&StepDefinition> {
        self.steps.get(self.current)
    }

    /// Target weight of the step in flight.
    pub fn current_weight(&self) -> f64 {
        self.current().map_or(0.0, |s| s.weight)
    }

    /// Weight earned by completed steps; 0 for the first step.
    pub fn previous_weight(&self) -> f64 {
        match self.current {
            0 => 0.0,
            i => self.steps.get(i - 1).map_or(0.0, |s| s.weight),
        }
    }

    /// Completion signals the current step still needs.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether the cursor is on the final step.
    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.steps.len()
    }
}

fn resolve_concurrencies(
    step_count: usize,
    concurrencies: Option<&[u32]>,
    offset: usize,
) -> Result<Vec<u32>, ConfigError> {
    let Some(concurrencies) = concurrencies else {
        return Ok(vec![1; step_count]);
    };
    if concurrencies.len() != step_count {
        return Err(ConfigError::LengthMismatch {
            what: "step concurrencies",
            expected: step_count,
            actual: concurrencies.len(),
        });
    }
    if let Some(i) = concurrencies.iter().position(|&c| c == 0) {
        return Err(ConfigError::ZeroConcurrency { step: offset + i });
    }
    Ok(concurrencies.to_vec())
}

fn validate_weights(
    step_count: usize,
    weights: &[f64],
    offset: usize,
) -> Result<Vec<f64>, ConfigError> {
    if weights.len() != step_count {
        return Err(ConfigError::LengthMismatch {
            what: "accumulated weights",
            expected: step_count,
            actual: weights.len(),
        });
    }

    let mut previous = 0.0;
    for (i, &weight) in weights.iter().enumerate() {
        if !weight.is_finite() || weight <= 0.0 || weight > 1.0 + WEIGHT_EPSILON {
            return Err(ConfigError::WeightOutOfRange {
                step: offset + i,
                weight,
            });
        }
        if weight < previous {
            return Err(ConfigError::NonMonotonicWeight {
                step: offset + i,
                previous,
                weight,
            });
        }
        previous = weight;
    }

    if (previous - 1.0).abs() > WEIGHT_EPSILON {
        return Err(ConfigError::TerminalWeight(previous));
    }

    let mut weights = weights.to_vec();
    if let Some(last) = weights.last_mut() {
        *last = 1.0;
    }
    Ok(weights)
}

/// `count` evenly spaced weights over `(from, 1.0]`, the last exactly 1.0.
fn even_split(from: f64, count: usize) -> Vec<f64> {
    (1..=count)
        .map(|i| {
            if i == count {
                1.0
            } else {
                from + (1.0 - from) * i as f64 / count as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_weights(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_setup_defaults() {
        let mut plan = StepPlan::new();
        plan.setup(4, None, None).unwrap();

        assert_eq!(plan.len(), 4);
        assert_eq!(plan.concurrencies(), vec![1, 1, 1, 1]);
        assert_weights(&plan.weights(), &[0.25, 0.5, 0.75, 1.0]);
        assert_eq!(plan.weights()[3], 1.0);
        assert_eq!(plan.current_index(), 0);
        assert_eq!(plan.previous_weight(), 0.0);
        assert_eq!(plan.remaining(), 1);
    }

    #[test]
    fn test_setup_three_even_steps_ends_exactly_at_one() {
        let mut plan = StepPlan::new();
        plan.setup(3, None, None).unwrap();
        assert_eq!(plan.weights()[2], 1.0);
    }

    #[test]
    fn test_setup_rejects_bad_config() {
        let mut plan = StepPlan::new();

        assert_eq!(plan.setup(0, None, None), Err(ConfigError::NoSteps));
        assert_eq!(
            plan.setup(2, Some(&[1]), None),
            Err(ConfigError::LengthMismatch {
                what: "step concurrencies",
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            plan.setup(2, Some(&[1, 0]), None),
            Err(ConfigError::ZeroConcurrency { step: 1 })
        );
        assert_eq!(
            plan.setup(2, None, Some(&[0.6, 0.4])),
            Err(ConfigError::NonMonotonicWeight {
                step: 1,
                previous: 0.6,
                weight: 0.4
            })
        );
        assert_eq!(
            plan.setup(2, None, Some(&[0.3, 0.9])),
            Err(ConfigError::TerminalWeight(0.9))
        );
        assert!(matches!(
            plan.setup(2, None, Some(&[0.0, 1.0])),
            Err(ConfigError::WeightOutOfRange { step: 0, .. })
        ));
        assert!(matches!(
            plan.setup(1, None, Some(&[f64::NAN])),
            Err(ConfigError::WeightOutOfRange { step: 0, .. })
        ));

        // Nothing was mutated by the failures
        assert!(plan.is_empty());
    }

    #[test]
    fn test_equal_weights_allowed() {
        let mut plan = StepPlan::new();
        plan.setup(3, None, Some(&[0.5, 0.5, 1.0])).unwrap();
        assert_weights(&plan.weights(), &[0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_complete_signal_and_advance() {
        let mut plan = StepPlan::new();
        plan.setup(2, Some(&[3, 1]), None).unwrap();

        assert!(!plan.complete_signal());
        assert_eq!(plan.remaining(), 2);
        assert!(!plan.complete_signal());
        assert!(plan.complete_signal());
        assert!(!plan.is_last());

        assert!(plan.advance());
        assert_eq!(plan.current_index(), 1);
        assert_eq!(plan.previous_weight(), 0.5);
        assert_eq!(plan.current_weight(), 1.0);
        assert_eq!(plan.remaining(), 1);
        assert!(plan.is_last());
        assert!(!plan.advance());
    }

    #[test]
    fn test_dynamic_add_even_split_of_remaining() {
        let mut plan = StepPlan::new();
        plan.setup(2, None, None).unwrap();
        assert!(plan.complete_signal());
        assert!(plan.advance());

        plan.dynamic_add(2, None, None).unwrap();

        assert_eq!(plan.len(), 4);
        assert_weights(&plan.weights(), &[0.5, 0.5 + 0.5 / 3.0, 0.5 + 1.0 / 3.0, 1.0]);
        assert_eq!(plan.steps()[3].index, 3);
        assert_eq!(plan.previous_weight(), 0.5);
    }

    #[test]
    fn test_dynamic_add_explicit_weights() {
        let mut plan = StepPlan::new();
        plan.setup(2, None, None).unwrap();
        assert!(plan.complete_signal());
        assert!(plan.advance());

        plan.dynamic_add(2, Some(&[2, 1]), Some(&[0.8, 1.0])).unwrap();

        // Step in flight is squeezed beneath the first added weight
        assert_weights(&plan.weights(), &[0.5, 0.65, 0.8, 1.0]);
        assert_eq!(plan.concurrencies(), vec![1, 1, 2, 1]);
    }

    #[test]
    fn test_dynamic_add_rejects_weight_below_completed() {
        let mut plan = StepPlan::new();
        plan.setup(2, None, Some(&[0.6, 1.0])).unwrap();
        assert!(plan.complete_signal());
        assert!(plan.advance());

        assert_eq!(
            plan.dynamic_add(1, None, Some(&[0.6])),
            Err(ConfigError::TerminalWeight(0.6))
        );
        assert_eq!(
            plan.dynamic_add(2, None, Some(&[0.4, 1.0])),
            Err(ConfigError::BelowCompleted {
                completed: 0.6,
                weight: 0.4
            })
        );
        assert_eq!(
            plan.dynamic_add(1, Some(&[0]), None),
            Err(ConfigError::ZeroConcurrency { step: 2 })
        );
        assert_weights(&plan.weights(), &[0.6, 1.0]);
    }

    #[test]
    fn test_dynamic_add_first_weight_equal_to_completed() {
        let mut plan = StepPlan::new();
        plan.setup(2, None, None).unwrap();
        assert!(plan.complete_signal());
        assert!(plan.advance());

        plan.dynamic_add(2, None, Some(&[0.5, 1.0])).unwrap();

        // Step in flight collapses to a zero-width span at the completed weight
        assert_weights(&plan.weights(), &[0.5, 0.5, 0.5, 1.0]);
        assert_eq!(plan.previous_weight(), 0.5);
        assert_eq!(plan.current_weight(), 0.5);
    }

    #[test]
    fn test_dynamic_add_above_floor() {
        let mut plan = StepPlan::new();
        plan.setup(2, None, None).unwrap();
        assert!(plan.complete_signal());
        assert!(plan.advance());

        plan.dynamic_add_above(0.8, 1, None, None).unwrap();
        assert_weights(&plan.weights(), &[0.5, 0.9, 1.0]);

        // Floors below the completed weight fall back to it
        let mut plan = StepPlan::new();
        plan.setup(2, None, None).unwrap();
        plan.dynamic_add_above(-1.0, 2, None, None).unwrap();
        assert_weights(&plan.weights(), &[0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_dynamic_add_above_floor_with_weights() {
        let mut plan = StepPlan::new();
        plan.setup(2, None, None).unwrap();
        assert!(plan.complete_signal());
        assert!(plan.advance());

        plan.dynamic_add_above(0.6, 1, None, Some(&[1.0])).unwrap();
        assert_weights(&plan.weights(), &[0.5, 0.8, 1.0]);

        // First weight under the floor: pending steps sit just beneath it
        let mut plan = StepPlan::new();
        plan.setup(2, None, None).unwrap();
        assert!(plan.complete_signal());
        assert!(plan.advance());

        plan.dynamic_add_above(0.9, 2, None, Some(&[0.7, 1.0])).unwrap();
        assert_weights(&plan.weights(), &[0.5, 0.7, 0.7, 1.0]);
    }

    #[test]
    fn test_rewind_drops_added_steps() {
        let mut plan = StepPlan::new();
        plan.setup(2, Some(&[2, 1]), None).unwrap();
        assert!(!plan.complete_signal());
        plan.dynamic_add(3, None, None).unwrap();
        assert_eq!(plan.len(), 5);

        plan.rewind();

        assert_eq!(plan.len(), 2);
        assert_weights(&plan.weights(), &[0.5, 1.0]);
        assert_eq!(plan.current_index(), 0);
        assert_eq!(plan.remaining(), 2);
    }
}
