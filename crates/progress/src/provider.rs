//! Simulated progress provider.
//!
//! Ties the step plan, estimation engine, animator and listener slot together
//! behind one mutex, and keeps a repeating timer alive while a run is resumed.
//!
//! ```text
//! setup → register_listener → start ─┬─ tick → progress listener
//!                                    └─ finish_step → snap → next step … → completion listener
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use fauxbar_core::{
    EstimateStrategy, LifecycleState, Operation, ProgressError, ProgressSnapshot, Result,
    StepPlan,
};
use tracing::{debug, info, trace};

use crate::animator::ProgressAnimator;
use crate::clock::{Clock, TokioClock};
use crate::config::AnimatorConfig;
use crate::estimator::EstimationEngine;
use crate::listener::ListenerRegistry;
use crate::scheduler::{TickFn, TickScheduler, TimerHandle, TokioScheduler, VirtualTime};

/// Builder for [`FakeProgressProvider`].
#[derive(Debug, Default)]
pub struct ProviderBuilder {
    strategy: EstimateStrategy,
    config: AnimatorConfig,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn TickScheduler>>,
}

impl ProviderBuilder {
    /// Start from the defaults: recent strategy, tokio clock and scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the estimation strategy.
    pub fn strategy(mut self, strategy: EstimateStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the animator configuration.
    pub fn config(mut self, config: AnimatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the time source.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Set the timer scheduler.
    pub fn scheduler(mut self, scheduler: impl TickScheduler + 'static) -> Self {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Drive the provider from a virtual timeline (clock and scheduler).
    pub fn virtual_time(self, time: &VirtualTime) -> Self {
        self.clock(time.clock()).scheduler(time.clone())
    }

    /// Build the provider in the `Initialized` state.
    pub fn build(self) -> Result<FakeProgressProvider> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> FakeProgressProvider {
        let shared = Shared {
            state: LifecycleState::Initialized,
            plan: StepPlan::new(),
            estimator: EstimationEngine::new(self.strategy),
            animator: ProgressAnimator::new(self.config),
            listeners: ListenerRegistry::new(),
            timer: None,
            generation: 0,
            queued_finishes: 0,
        };
        FakeProgressProvider {
            inner: Arc::new(Inner {
                shared: Mutex::new(shared),
                clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
                scheduler: self
                    .scheduler
                    .unwrap_or_else(|| Arc::new(TokioScheduler::new())),
            }),
        }
    }
}

/// Fake progress for work whose real duration is unknown.
///
/// Cloning yields another handle to the same provider, so `finish_step` can be
/// called from whichever task completes the real work.
#[derive(Debug, Clone)]
pub struct FakeProgressProvider {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    shared: Mutex<Shared>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn TickScheduler>,
}

#[derive(Debug)]
struct Shared {
    state: LifecycleState,
    plan: StepPlan,
    estimator: EstimationEngine,
    animator: ProgressAnimator,
    listeners: ListenerRegistry,
    timer: Option<TimerHandle>,
    /// Bumped whenever the timer is stopped; stale ticks compare against it
    generation: u64,
    /// `finish_step` calls received while suspended
    queued_finishes: u32,
}

enum Notice {
    Progress(f64),
    Completed,
}

/// Listener calls collected under the lock and made after it is released.
#[must_use]
struct Dispatch {
    notices: Vec<Notice>,
    listeners: ListenerRegistry,
}

impl Dispatch {
    fn new(listeners: &ListenerRegistry) -> Self {
        Self {
            notices: Vec::new(),
            listeners: listeners.clone(),
        }
    }

    fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn deliver(self) {
        for notice in self.notices {
            match notice {
                Notice::Progress(value) => {
                    if let Some(listener) = self.listeners.progress() {
                        listener(value);
                    }
                }
                Notice::Completed => {
                    if let Some(listener) = self.listeners.completion() {
                        listener();
                    }
                }
            }
        }
    }
}

impl FakeProgressProvider {
    /// Create a provider using `strategy` and the tokio clock and scheduler.
    pub fn new(strategy: EstimateStrategy) -> Self {
        ProviderBuilder::new().strategy(strategy).assemble()
    }

    /// Builder for custom clocks, schedulers and animator settings.
    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::new()
    }

    /// Define the steps. Only in `Initialized` or `Reseted`.
    pub fn setup(
        &self,
        step_count: usize,
        step_concurrencies: Option<&[u32]>,
        accumulated_weights: Option<&[f64]>,
    ) -> Result<()> {
        let mut shared = self.inner.lock();
        shared.state.ensure_allows(Operation::Setup)?;
        shared
            .plan
            .setup(step_count, step_concurrencies, accumulated_weights)?;
        debug!(
            "Set up {} steps with weights {:?}",
            step_count,
            shared.plan.weights()
        );
        Ok(())
    }

    /// Replace the progress and completion listeners. Only in `Initialized` or `Reseted`.
    ///
    /// Listeners survive resets. They are called without the provider lock
    /// held, so they may call back into the provider.
    pub fn register_listener(
        &self,
        on_progress: impl Fn(f64) + Send + Sync + 'static,
        on_completion: impl Fn() + Send + Sync + 'static,
    ) -> Result<()> {
        let mut shared = self.inner.lock();
        shared.state.ensure_allows(Operation::RegisterListener)?;
        shared
            .listeners
            .register(Arc::new(on_progress), Arc::new(on_completion));
        debug!("Registered progress listeners");
        Ok(())
    }

    /// Start animating the first step, expected to take `initial_estimate`.
    pub fn start(&self, initial_estimate: Duration) -> Result<()> {
        let mut guard = self.inner.lock();
        let shared = &mut *guard;
        shared.state.ensure_allows(Operation::Start)?;
        if shared.plan.is_empty() {
            return Err(ProgressError::NotConfigured);
        }

        let generation = shared.generation + 1;
        let timer = self.inner.schedule(
            shared.animator.config().tick_interval,
            generation,
            Arc::downgrade(&self.inner),
        )?;
        shared.state.transition(LifecycleState::Resumed)?;
        shared.generation = generation;
        shared.timer = Some(timer);

        shared.estimator.seed(initial_estimate);
        let estimate = shared.estimator.estimate_next();
        shared.animator.begin_step(estimate, self.inner.clock.now());
        info!(
            "Started {} steps, first estimated at {:?}",
            shared.plan.len(),
            estimate
        );
        Ok(())
    }

    /// Append steps to the running plan. Only in `Resumed` or `Suspended`.
    ///
    /// Unfinished steps are respread above the value already displayed, so the
    /// bar keeps moving through the added steps.
    pub fn dynamic_add(
        &self,
        step_count: usize,
        step_concurrencies: Option<&[u32]>,
        accumulated_weights: Option<&[f64]>,
    ) -> Result<()> {
        let mut shared = self.inner.lock();
        shared.state.ensure_allows(Operation::DynamicAdd)?;
        let shown = shared.animator.progress();
        shared.plan.dynamic_add_above(
            shown,
            step_count,
            step_concurrencies,
            accumulated_weights,
        )?;
        debug!(
            "Added {} steps, weights now {:?}",
            step_count,
            shared.plan.weights()
        );
        Ok(())
    }

    /// Signal that one unit of the current step's real work is done.
    ///
    /// While suspended the signal is queued and applied on [`resume`](Self::resume).
    /// Signals after the run finished are ignored.
    pub fn finish_step(&self) -> Result<()> {
        let dispatch = {
            let mut guard = self.inner.lock();
            let shared = &mut *guard;
            match shared.state {
                LifecycleState::Resumed => {
                    let mut dispatch = Dispatch::new(&shared.listeners);
                    self.inner.complete_signal(shared, &mut dispatch)?;
                    dispatch
                }
                LifecycleState::Suspended => {
                    shared.queued_finishes += 1;
                    debug!(
                        "Queued finish_step while suspended ({} pending)",
                        shared.queued_finishes
                    );
                    return Ok(());
                }
                LifecycleState::Finished => {
                    trace!("Ignoring finish_step after completion");
                    return Ok(());
                }
                state => {
                    return Err(ProgressError::InvalidState {
                        operation: Operation::FinishStep,
                        state,
                    })
                }
            }
        };
        dispatch.deliver();
        Ok(())
    }

    /// Freeze the animation, keeping the time spent in the current step.
    pub fn suspend(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let shared = &mut *guard;
        shared.state.ensure_allows(Operation::Suspend)?;
        shared.state.transition(LifecycleState::Suspended)?;
        shared.generation += 1;
        shared.timer = None;
        shared.animator.pause(self.inner.clock.now());
        debug!("Suspended at {:.3}", shared.animator.progress());
        Ok(())
    }

    /// Continue a suspended run and apply any queued `finish_step` calls.
    pub fn resume(&self) -> Result<()> {
        let dispatch = {
            let mut guard = self.inner.lock();
            let shared = &mut *guard;
            shared.state.ensure_allows(Operation::Resume)?;

            let generation = shared.generation + 1;
            let timer = self.inner.schedule(
                shared.animator.config().tick_interval,
                generation,
                Arc::downgrade(&self.inner),
            )?;
            shared.state.transition(LifecycleState::Resumed)?;
            shared.generation = generation;
            shared.timer = Some(timer);
            shared.animator.resume(self.inner.clock.now());

            let queued = std::mem::take(&mut shared.queued_finishes);
            debug!("Resumed with {} queued finish_step calls", queued);
            let mut dispatch = Dispatch::new(&shared.listeners);
            for _ in 0..queued {
                if shared.state != LifecycleState::Resumed {
                    break;
                }
                self.inner.complete_signal(shared, &mut dispatch)?;
            }
            dispatch
        };
        dispatch.deliver();
        Ok(())
    }

    /// Cancel the run: stop the timer and clear everything but the listeners.
    ///
    /// Valid from any state. The plan rewinds to its set-up steps, so the
    /// provider can be started again without another `setup`.
    pub fn reset(&self) {
        let dispatch = {
            let mut guard = self.inner.lock();
            let shared = &mut *guard;
            shared.generation += 1;
            shared.timer = None;
            shared.state.reset();
            shared.plan.rewind();
            shared.estimator.clear();
            shared.queued_finishes = 0;

            let mut dispatch = Dispatch::new(&shared.listeners);
            if shared.animator.progress() > 0.0 {
                dispatch.push(Notice::Progress(0.0));
            }
            shared.animator.clear();
            info!("Progress reset");
            dispatch
        };
        dispatch.deliver();
    }

    /// Lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Displayed progress in [0, 1].
    pub fn progress(&self) -> f64 {
        self.inner.lock().animator.progress()
    }

    /// Estimation strategy.
    pub fn estimate_strategy(&self) -> EstimateStrategy {
        self.inner.lock().estimator.strategy()
    }

    /// Number of steps in the plan.
    pub fn steps(&self) -> usize {
        self.inner.lock().plan.len()
    }

    /// Concurrency count of every step.
    pub fn step_concurrencies(&self) -> Vec<u32> {
        self.inner.lock().plan.concurrencies()
    }

    /// Accumulated weight of every step.
    pub fn accumulated_weights(&self) -> Vec<f64> {
        self.inner.lock().plan.weights()
    }

    /// Index of the step in flight.
    pub fn current_step(&self) -> usize {
        self.inner.lock().plan.current_index()
    }

    /// Estimate driving the step in flight, if any.
    pub fn step_estimate(&self) -> Option<Duration> {
        self.inner.lock().animator.runtime().map(|r| r.estimate)
    }

    /// Point-in-time view for display or logging.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let shared = self.inner.lock();
        ProgressSnapshot {
            state: shared.state,
            progress: shared.animator.progress(),
            current_step: shared.plan.current_index(),
            steps: shared.plan.len(),
            taken_at: Utc::now(),
        }
    }
}

impl Default for FakeProgressProvider {
    fn default() -> Self {
        Self::new(EstimateStrategy::default())
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(&self, period: Duration, generation: u64, weak: Weak<Inner>) -> Result<TimerHandle> {
        let tick: TickFn = Arc::new(move || match weak.upgrade() {
            Some(inner) => inner.on_tick(generation),
            None => false,
        });
        self.scheduler.schedule(period, tick)
    }

    /// One animation tick. Returns `false` once this timer is stale.
    fn on_tick(&self, generation: u64) -> bool {
        let dispatch = {
            let mut guard = self.lock();
            let shared = &mut *guard;
            if shared.generation != generation || shared.state != LifecycleState::Resumed {
                return false;
            }
            let Some(value) = shared.animator.tick(&shared.plan, self.clock.now()) else {
                return true;
            };
            trace!("Tick at {:.4}", value);
            let mut dispatch = Dispatch::new(&shared.listeners);
            dispatch.push(Notice::Progress(value));
            dispatch
        };
        dispatch.deliver();
        true
    }

    /// Apply one completion signal to the step in flight.
    fn complete_signal(&self, shared: &mut Shared, dispatch: &mut Dispatch) -> Result<()> {
        if !shared.plan.complete_signal() {
            trace!(
                "Step {} waiting on {} more signals",
                shared.plan.current_index(),
                shared.plan.remaining()
            );
            return Ok(());
        }

        let now = self.clock.now();
        let index = shared.plan.current_index();
        let before = shared.animator.progress();
        let elapsed = shared
            .animator
            .complete_step(shared.plan.current_weight(), now);
        if shared.animator.progress() > before {
            dispatch.push(Notice::Progress(shared.animator.progress()));
        }
        shared.estimator.record_sample(elapsed);
        debug!("Step {} completed in {:?}", index, elapsed);

        if shared.plan.advance() {
            let estimate = shared.estimator.estimate_next();
            shared.animator.begin_step(estimate, now);
            debug!(
                "Step {} started, estimated at {:?}",
                shared.plan.current_index(),
                estimate
            );
        } else {
            shared.state.transition(LifecycleState::Finished)?;
            shared.generation += 1;
            shared.timer = None;
            dispatch.push(Notice::Completed);
            info!("All {} steps finished", shared.plan.len());
        }
        Ok(())
    }
}
