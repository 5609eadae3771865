//! Memory-pressure collaborators for the chunk pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Supplies the pool's current size bound. Queried on every release.
pub trait PoolBound: Send + Sync {
    fn current_pool_bound(&self) -> usize;
}

/// Bound set from config and adjustable at runtime (e.g. lowered under pressure).
#[derive(Debug)]
pub struct StaticBound {
    bound: AtomicUsize,
}

impl StaticBound {
    pub fn new(bound: usize) -> Self {
        Self {
            bound: AtomicUsize::new(bound),
        }
    }

    pub fn set(&self, bound: usize) {
        self.bound.store(bound, Ordering::Relaxed);
    }
}

impl PoolBound for StaticBound {
    fn current_pool_bound(&self) -> usize {
        self.bound.load(Ordering::Relaxed)
    }
}

/// Returns `false` once its target is gone; such hooks are dropped.
type CleanupHook = Box<dyn Fn() -> bool + Send + Sync>;

/// Registry of cleanup hooks run when the host signals memory pressure.
#[derive(Default)]
pub struct PressureMonitor {
    hooks: Mutex<Vec<CleanupHook>>,
}

impl PressureMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook`. It stays registered for as long as it returns `true`.
    pub fn register_cleanup(&self, hook: impl Fn() -> bool + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Run every registered hook, dropping those whose target is gone.
    /// Returns how many live hooks ran.
    pub fn signal_pressure(&self) -> usize {
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = hooks.len();
        hooks.retain(|hook| hook());
        tracing::info!(
            hooks = hooks.len(),
            pruned = before - hooks.len(),
            "memory pressure cleanup ran"
        );
        hooks.len()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for PressureMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PressureMonitor")
            .field("hooks", &self.hook_count())
            .finish()
    }
}
