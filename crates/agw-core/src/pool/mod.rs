//! Bounded pool of reusable stream chunk objects.
//!
//! Purely an allocation optimisation: with the bound at zero every `acquire`
//! builds a fresh chunk and every `release` drops it, and callers cannot tell
//! the difference. Idle chunks are spread over several shards so concurrent
//! streams do not contend on one lock.

mod chunk;
mod pressure;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub use chunk::{ChatChunk, ChunkChoice, ChunkDelta, CHUNK_OBJECT};
pub use pressure::{PoolBound, PressureMonitor, StaticBound};

const SHARDS: usize = 8;

/// Pool of [`ChatChunk`]s owned by the composition root.
pub struct BufferPool {
    shards: Box<[Mutex<Vec<ChatChunk>>]>,
    /// Slots reserved by idle chunks. Never exceeds the bound at reservation time.
    size: AtomicUsize,
    next_shard: AtomicUsize,
    bound: Arc<dyn PoolBound>,
}

impl BufferPool {
    pub fn new(bound: Arc<dyn PoolBound>) -> Self {
        let shards = (0..SHARDS).map(|_| Mutex::new(Vec::new())).collect();
        Self {
            shards,
            size: AtomicUsize::new(0),
            next_shard: AtomicUsize::new(0),
            bound,
        }
    }

    pub fn with_bound(bound: usize) -> Self {
        Self::new(Arc::new(StaticBound::new(bound)))
    }

    fn start_shard(&self) -> usize {
        self.next_shard.fetch_add(1, Ordering::Relaxed) % SHARDS
    }

    /// Idle chunks currently held.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take a pooled chunk, or build a fresh neutral one.
    pub fn acquire(&self) -> ChatChunk {
        let start = self.start_shard();
        for i in 0..SHARDS {
            let shard = &self.shards[(start + i) % SHARDS];
            let popped = shard.lock().unwrap_or_else(PoisonError::into_inner).pop();
            if let Some(chunk) = popped {
                self.size.fetch_sub(1, Ordering::AcqRel);
                return chunk;
            }
        }
        ChatChunk::new()
    }

    /// Reserve one idle slot if the pool is below its current bound.
    fn reserve_slot(&self) -> bool {
        let bound = self.bound.current_pool_bound();
        let mut current = self.size.load(Ordering::Relaxed);
        loop {
            if current >= bound {
                return false;
            }
            match self.size.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Return a chunk. It is reset before it goes back; when the pool is at its
    /// bound the chunk is dropped instead.
    pub fn release(&self, mut chunk: ChatChunk) {
        if !self.reserve_slot() {
            return;
        }
        chunk.reset();
        let shard = &self.shards[self.start_shard()];
        shard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chunk);
    }

    /// Drop every idle chunk. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        for shard in self.shards.iter() {
            let drained = std::mem::take(&mut *shard.lock().unwrap_or_else(PoisonError::into_inner));
            self.size.fetch_sub(drained.len(), Ordering::AcqRel);
            dropped += drained.len();
        }
        dropped
    }

    /// Clear this pool whenever `monitor` signals pressure. Holds only a weak
    /// reference; once the pool is dropped the hook unregisters itself on the
    /// next signal.
    pub fn register_pressure_cleanup(self: &Arc<Self>, monitor: &PressureMonitor) {
        let pool = Arc::downgrade(self);
        monitor.register_cleanup(move || match pool.upgrade() {
            Some(pool) => {
                let dropped = pool.clear();
                tracing::debug!(dropped, "chunk pool cleared under memory pressure");
                true
            }
            None => false,
        });
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("len", &self.len())
            .field("bound", &self.bound.current_pool_bound())
            .finish()
    }
}
