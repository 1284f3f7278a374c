//! Repeating timers that drive animation ticks.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use fauxbar_core::{ProgressError, Result};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::clock::ManualClock;

/// Tick callback. Returning `false` stops the timer.
pub type TickFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Schedules a callback every `period`.
pub trait TickScheduler: Send + Sync + fmt::Debug {
    /// Start a repeating timer. The first tick fires one period from now.
    fn schedule(&self, period: Duration, tick: TickFn) -> Result<TimerHandle>;
}

/// Owned handle to a scheduled timer. Cancels the timer when dropped.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    /// Wrap a cancellation action.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop the timer.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Production scheduler: one `tokio::time::interval` task per timer.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    handle: Option<Handle>,
}

impl TokioScheduler {
    /// Spawn on whichever runtime is current when a timer is scheduled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn on a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn runtime(&self) -> Result<Handle> {
        match &self.handle {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|e| ProgressError::Scheduler(e.to_string())),
        }
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule(&self, period: Duration, tick: TickFn) -> Result<TimerHandle> {
        let runtime = self.runtime()?;
        let task = runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !tick() {
                    trace!("Timer stopped by its tick");
                    break;
                }
            }
        });
        Ok(TimerHandle::new(move || task.abort()))
    }
}

struct VirtualTimer {
    id: u64,
    period: Duration,
    due: Duration,
    tick: TickFn,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct VirtualTimers {
    next_id: u64,
    timers: Vec<VirtualTimer>,
}

/// Deterministic clock plus scheduler.
///
/// Nothing happens until [`VirtualTime::advance`] is called; ticks then fire
/// in due order with the clock set to each tick's due time.
#[derive(Clone, Default)]
pub struct VirtualTime {
    clock: ManualClock,
    timers: Arc<Mutex<VirtualTimers>>,
}

impl VirtualTime {
    /// Create a timeline at offset zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The clock this timeline moves.
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// Number of timers still scheduled.
    pub fn active_timers(&self) -> usize {
        let timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers
            .timers
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move time forward by `by`, firing every tick that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.elapsed() + by;

        while let Some((id, due, tick)) = self.next_due(target) {
            let now = self.clock.elapsed();
            if due > now {
                self.clock.advance(due - now);
            }

            let keep = tick();

            let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(timer) = timers.timers.iter_mut().find(|t| t.id == id) {
                if keep {
                    timer.due += timer.period;
                } else {
                    timer.cancelled.store(true, Ordering::SeqCst);
                }
            }
        }

        let now = self.clock.elapsed();
        if target > now {
            self.clock.advance(target - now);
        }
    }

    fn next_due(&self, target: Duration) -> Option<(u64, Duration, TickFn)> {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.timers.retain(|t| !t.cancelled.load(Ordering::SeqCst));
        timers
            .timers
            .iter()
            .filter(|t| t.due <= target)
            .min_by_key(|t| (t.due, t.id))
            .map(|t| (t.id, t.due, Arc::clone(&t.tick)))
    }
}

impl TickScheduler for VirtualTime {
    fn schedule(&self, period: Duration, tick: TickFn) -> Result<TimerHandle> {
        if period.is_zero() {
            return Err(ProgressError::Scheduler("timer period must be non-zero".to_string()));
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let id = timers.next_id;
        timers.next_id += 1;
        timers.timers.push(VirtualTimer {
            id,
            period,
            due: self.clock.elapsed() + period,
            tick,
            cancelled: Arc::clone(&cancelled),
        });
        Ok(TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst)))
    }
}

impl fmt::Debug for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTime")
            .field("elapsed", &self.clock.elapsed())
            .field("active_timers", &self.active_timers())
            .finish()
    }
}
