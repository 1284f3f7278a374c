//! Progress and completion listeners.

use std::fmt;
use std::sync::Arc;

/// Called with the displayed progress whenever it changes.
pub type ProgressListener = Arc<dyn Fn(f64) + Send + Sync>;

/// Called once when the final step completes.
pub type CompletionListener = Arc<dyn Fn() + Send + Sync>;

/// Single slot holding at most one listener pair.
///
/// Registering replaces the previous pair. The slot is never cleared by a
/// reset, so restarted runs report to the same listeners.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    slot: Option<(ProgressListener, CompletionListener)>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered pair.
    pub fn register(&mut self, progress: ProgressListener, completion: CompletionListener) {
        self.slot = Some((progress, completion));
    }

    /// Whether a pair is registered.
    pub fn is_registered(&self) -> bool {
        self.slot.is_some()
    }

    /// Current progress listener.
    pub fn progress(&self) -> Option<ProgressListener> {
        self.slot.as_ref().map(|(p, _)| Arc::clone(p))
    }

    /// Current completion listener.
    pub fn completion(&self) -> Option<CompletionListener> {
        self.slot.as_ref().map(|(_, c)| Arc::clone(c))
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_register_overwrites() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut registry = ListenerRegistry::new();
        assert!(registry.progress().is_none());

        let counter = Arc::clone(&first);
        registry.register(
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(|| {}),
        );
        let counter = Arc::clone(&second);
        registry.register(
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(|| {}),
        );

        (registry.progress().unwrap())(0.5);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(registry.completion().is_some());
    }
}
