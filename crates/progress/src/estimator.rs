//! Step duration estimation.

use std::time::Duration;

use fauxbar_core::EstimateStrategy;

/// Predicts how long the upcoming step will take from completed steps.
///
/// Estimates only pace the animation; they never gate completion.
#[derive(Debug, Clone, Default)]
pub struct EstimationEngine {
    strategy: EstimateStrategy,
    initial: Duration,
    samples: Vec<Duration>,
}

impl EstimationEngine {
    /// Create an engine using `strategy`.
    pub fn new(strategy: EstimateStrategy) -> Self {
        Self {
            strategy,
            initial: Duration::ZERO,
            samples: Vec::new(),
        }
    }

    /// Active strategy.
    pub fn strategy(&self) -> EstimateStrategy {
        self.strategy
    }

    /// Set the fallback used until the first sample is recorded.
    pub fn seed(&mut self, initial: Duration) {
        self.initial = initial;
    }

    /// Record a completed step's real duration.
    pub fn record_sample(&mut self, duration: Duration) {
        self.samples.push(duration);
    }

    /// Recorded durations, oldest first.
    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// Estimated duration of the next step.
    pub fn estimate_next(&self) -> Duration {
        match self.strategy {
            EstimateStrategy::Recent => self.samples.last().copied().unwrap_or(self.initial),
            EstimateStrategy::Average => {
                if self.samples.is_empty() {
                    return self.initial;
                }
                let total: Duration = self.samples.iter().sum();
                total / self.samples.len() as u32
            }
        }
    }

    /// Forget the seed and every sample.
    pub fn clear(&mut self) {
        self.initial = Duration::ZERO;
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_samples(strategy: EstimateStrategy, secs: &[u64]) -> EstimationEngine {
        let mut engine = EstimationEngine::new(strategy);
        engine.seed(Duration::from_secs(1));
        for &s in secs {
            engine.record_sample(Duration::from_secs(s));
        }
        engine
    }

    #[test]
    fn test_recent_strategy() {
        let engine = with_samples(EstimateStrategy::Recent, &[2, 5]);
        assert_eq!(engine.estimate_next(), Duration::from_secs(5));
    }

    #[test]
    fn test_average_strategy() {
        let engine = with_samples(EstimateStrategy::Average, &[2, 5]);
        assert_eq!(engine.estimate_next(), Duration::from_millis(3500));
    }

    #[test]
    fn test_falls_back_to_seed() {
        for strategy in [EstimateStrategy::Recent, EstimateStrategy::Average] {
            let engine = with_samples(strategy, &[]);
            assert_eq!(engine.estimate_next(), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_clear() {
        let mut engine = with_samples(EstimateStrategy::Average, &[4]);
        engine.clear();
        assert!(engine.samples().is_empty());
        assert_eq!(engine.estimate_next(), Duration::ZERO);
        assert_eq!(engine.strategy(), EstimateStrategy::Average);
    }
}
