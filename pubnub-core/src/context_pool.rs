//! Context allocation (§4.7): a small static pool sized by `CTX_MAX`,
//! falling back to the heap once exhausted, with deferred-free semantics
//! for a context whose transaction is still in flight.

use std::sync::{Arc, Mutex};

use tokio::sync::{MutexGuard, Mutex as AsyncMutex};

use crate::context::Context;

/// How many contexts the static pool holds before allocation falls back
/// to the heap (mirrors the C core's compile-time `PUBNUB_CTX_MAX`,
/// defaulted here rather than fixed at compile time — §9 open question).
pub const CTX_MAX: usize = 2;

/// A pool-managed context handle. Cloning shares the same underlying
/// [`Context`]; the pool only actually reclaims a slot once every handle
/// (and any in-flight transaction holding one) has been dropped and
/// [`ContextPool::free`] has been called.
///
/// Backed by `tokio::sync::Mutex` rather than `std::sync::Mutex`: a
/// transaction holds the lock across the `.await` points of its I/O, so
/// the guard must be safely holdable across suspension (§4.5 "exactly
/// one active transaction at a time").
#[derive(Clone)]
pub struct ContextHandle {
    inner: Arc<AsyncMutex<Context>>,
    slot: Slot,
}

impl ContextHandle {
    /// Acquire the context lock, held across `.await` points for the
    /// duration of one transaction.
    pub async fn lock(&self) -> MutexGuard<'_, Context> {
        self.inner.lock().await
    }

    /// Run `f` with exclusive (awaited) access to the underlying
    /// [`Context`].
    pub async fn with<R>(&self, f: impl FnOnce(&mut Context) -> R) -> R {
        let mut guard = self.lock().await;
        f(&mut guard)
    }

    /// Run `f` with exclusive access to the underlying [`Context`] only
    /// if it is not currently locked by an in-flight transaction,
    /// without blocking or awaiting. Intended for synchronous
    /// best-effort accessors (`last_result`, `last_http_code`, …) that
    /// must not themselves become `async fn`s.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Context) -> R) -> Option<R> {
        let mut guard = self.inner.try_lock().ok()?;
        Some(f(&mut guard))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Static(usize),
    Heap,
}

struct StaticSlot {
    handle: Option<Arc<AsyncMutex<Context>>>,
    pending_free: bool,
}

/// The pool itself: `CTX_MAX` static slots plus unbounded heap
/// allocation once those are exhausted.
pub struct ContextPool {
    slots: Mutex<Vec<StaticSlot>>,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextPool {
    /// A pool with `CTX_MAX` empty static slots.
    #[must_use]
    pub fn new() -> Self {
        let slots = (0..CTX_MAX)
            .map(|_| StaticSlot {
                handle: None,
                pending_free: false,
            })
            .collect();
        ContextPool {
            slots: Mutex::new(slots),
        }
    }

    /// Allocate `context` into the first free static slot, or onto the
    /// heap if all `CTX_MAX` static slots are occupied.
    pub fn alloc(&self, context: Context) -> ContextHandle {
        let mut slots = self.slots.lock().expect("context pool mutex poisoned");
        if let Some((index, slot)) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.handle.is_none())
        {
            let inner = Arc::new(AsyncMutex::new(context));
            slot.handle = Some(Arc::clone(&inner));
            slot.pending_free = false;
            return ContextHandle {
                inner,
                slot: Slot::Static(index),
            };
        }
        ContextHandle {
            inner: Arc::new(AsyncMutex::new(context)),
            slot: Slot::Heap,
        }
    }

    /// Free a handle's static slot once its transaction is known to be
    /// idle. If another `Arc` reference (an in-flight transaction) is
    /// still holding the context, the slot is marked `pending_free` and
    /// reclaimed the next time [`Self::reclaim_pending`] is called after
    /// the transaction completes; heap-allocated handles free themselves
    /// when the last `Arc` drops.
    pub fn free(&self, handle: &ContextHandle) {
        let index = match handle.slot {
            Slot::Static(index) => index,
            Slot::Heap => return,
        };
        let mut slots = self.slots.lock().expect("context pool mutex poisoned");
        let slot = &mut slots[index];
        if Arc::strong_count(&handle.inner) > 1 {
            slot.pending_free = true;
            return;
        }
        slot.handle = None;
        slot.pending_free = false;
    }

    /// Sweep slots marked `pending_free` whose in-flight transaction has
    /// since completed (no other `Arc` references remain), reclaiming
    /// them for reuse. Called after a transaction finishes.
    pub fn reclaim_pending(&self) {
        let mut slots = self.slots.lock().expect("context pool mutex poisoned");
        for slot in slots.iter_mut() {
            if slot.pending_free {
                if let Some(inner) = &slot.handle {
                    if Arc::strong_count(inner) <= 1 {
                        slot.handle = None;
                        slot.pending_free = false;
                    }
                }
            }
        }
    }

    /// How many static slots are currently occupied.
    #[must_use]
    pub fn static_slots_in_use(&self) -> usize {
        self.slots
            .lock()
            .expect("context pool mutex poisoned")
            .iter()
            .filter(|s| s.handle.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_context() -> Context {
        Context::init("pub", "sub")
    }

    #[test]
    fn static_slots_fill_before_overflowing_to_heap() {
        let pool = ContextPool::new();
        let handles: Vec<_> = (0..CTX_MAX).map(|_| pool.alloc(dummy_context())).collect();
        assert_eq!(pool.static_slots_in_use(), CTX_MAX);

        let overflow = pool.alloc(dummy_context());
        assert_eq!(overflow.slot, Slot::Heap);
        assert_eq!(pool.static_slots_in_use(), CTX_MAX);
        drop(handles);
    }

    #[test]
    fn free_reclaims_an_idle_static_slot_for_reuse() {
        let pool = ContextPool::new();
        let handle = pool.alloc(dummy_context());
        assert_eq!(pool.static_slots_in_use(), 1);
        pool.free(&handle);
        assert_eq!(pool.static_slots_in_use(), 0);

        let _next = pool.alloc(dummy_context());
        assert_eq!(pool.static_slots_in_use(), 1);
    }

    #[test]
    fn free_defers_while_a_second_handle_is_still_held() {
        let pool = ContextPool::new();
        let handle = pool.alloc(dummy_context());
        let in_flight = handle.clone();

        pool.free(&handle);
        // A clone (standing in for an in-flight transaction) still
        // holds a reference, so the slot must not be reclaimed yet.
        assert_eq!(pool.static_slots_in_use(), 1);

        drop(in_flight);
        pool.reclaim_pending();
        assert_eq!(pool.static_slots_in_use(), 0);
    }
}
