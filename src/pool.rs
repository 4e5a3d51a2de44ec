//! Fixed-capacity block pool with blocking wait-for-free semantics.
//!
//! All `N` blocks are created once in [`ResourcePool::new`]; afterwards the
//! pool never allocates. A block's data is moved out into the
//! [`PoolBlock`] handle on `acquire` and parked back in its slot on
//! `release` (or when the handle is dropped), so a handed-out block cannot
//! be reused until it comes back.
//!
//! ```text
//!  acquire ──▶ [ free | used | free | used ] ◀── release / drop
//!                       │
//!                       └─ generation += 1, notify ──▶ wait_for_change()
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::PoolError;

/// Distinguishes pools so a foreign handle can be rejected.
static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

struct PoolState<T, const N: usize> {
    /// `Some` = free block parked here, `None` = handed out.
    slots: [Option<T>; N],
    free: usize,
    /// Bumped on every acquire and release.
    generation: u64,
}

struct PoolShared<T, const N: usize> {
    id: u32,
    state: Mutex<PoolState<T, N>>,
    changed: Condvar,
}

impl<T, const N: usize> PoolShared<T, N> {
    fn lock(&self) -> MutexGuard<'_, PoolState<T, N>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put_back(&self, index: usize, data: T) {
        let mut state = self.lock();
        if state.slots[index].is_none() {
            state.slots[index] = Some(data);
            state.free += 1;
            state.generation = state.generation.wrapping_add(1);
        }
        drop(state);
        self.changed.notify_all();
    }
}

/// Pool of `N` equally sized blocks of `T`.
///
/// Cloning the pool yields another handle to the same blocks.
pub struct ResourcePool<T: Default, const N: usize> {
    shared: Arc<PoolShared<T, N>>,
}

impl<T: Default, const N: usize> Clone for ResourcePool<T, N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Default, const N: usize> Default for ResourcePool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default, const N: usize> ResourcePool<T, N> {
    /// Create the pool with every block free and default-initialised.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PoolShared {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(PoolState {
                    slots: core::array::from_fn(|_| Some(T::default())),
                    free: N,
                    generation: 0,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Take the first free block. Never blocks; `None` when exhausted.
    pub fn acquire(&self) -> Option<PoolBlock<T, N>> {
        let mut state = self.shared.lock();
        let index = state.slots.iter().position(Option::is_some)?;
        let data = state.slots[index].take()?;
        state.free -= 1;
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.shared.changed.notify_all();

        Some(PoolBlock {
            shared: Arc::clone(&self.shared),
            index,
            data: Some(data),
        })
    }

    /// Return a block to the pool.
    ///
    /// A block from another pool is rejected with
    /// [`PoolError::ForeignBlock`]; it still goes home to its own pool when
    /// dropped.
    pub fn release(&self, mut block: PoolBlock<T, N>) -> Result<(), PoolError> {
        if !Arc::ptr_eq(&self.shared, &block.shared) {
            return Err(PoolError::ForeignBlock);
        }
        if let Some(data) = block.data.take() {
            self.shared.put_back(block.index, data);
        }
        Ok(())
    }

    /// Block until any acquire/release happens or `timeout` elapses.
    ///
    /// Returns `true` if availability changed. Only changes after the call
    /// starts count.
    pub fn wait_for_change(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let seen = state.generation;
        let (state, _) = self
            .shared
            .changed
            .wait_timeout_while(state, timeout, |s| s.generation == seen)
            .unwrap_or_else(PoisonError::into_inner);
        state.generation != seen
    }

    /// Acquire, waiting up to `timeout` for a block to come back.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<PoolBlock<T, N>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(block) = self.acquire() {
                return Some(block);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            self.wait_for_change(remaining);
        }
    }

    pub fn free_count(&self) -> usize {
        self.shared.lock().free
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

/// A block handed out by a [`ResourcePool`].
///
/// Dereferences to the block data. Dropping the handle returns the block.
pub struct PoolBlock<T: Default, const N: usize> {
    shared: Arc<PoolShared<T, N>>,
    index: usize,
    data: Option<T>,
}

impl<T: Default, const N: usize> PoolBlock<T, N> {
    /// Slot index inside the owning pool (stable while the block is out).
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T: Default, const N: usize> core::ops::Deref for PoolBlock<T, N> {
    type Target = T;

    fn deref(&self) -> &T {
        // `data` is only `None` after release/drop has consumed the handle.
        match &self.data {
            Some(data) => data,
            None => unreachable!("pool block used after release"),
        }
    }
}

impl<T: Default, const N: usize> core::ops::DerefMut for PoolBlock<T, N> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.data {
            Some(data) => data,
            None => unreachable!("pool block used after release"),
        }
    }
}

impl<T: Default, const N: usize> Drop for PoolBlock<T, N> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.shared.put_back(self.index, data);
        }
    }
}

impl<T: Default + core::fmt::Debug, const N: usize> core::fmt::Debug for PoolBlock<T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolBlock")
            .field("pool", &self.shared.id)
            .field("index", &self.index)
            .field("data", &self.data)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────
