//! Per-key cancellable deferred tasks.
//!
//! A [`TimerMap`] holds at most one pending timer per key and supports the
//! two scheduling disciplines the server needs:
//!
//! - **keep-existing** ([`TimerMap::schedule`]) — a duplicate request while
//!   a timer is pending is a no-op. Used for the automatic round advance.
//! - **replace** ([`TimerMap::reschedule`]) — a new request cancels and
//!   restarts the countdown. Used to debounce presence broadcasts.
//!
//! # Cancellation is race-free
//!
//! Aborting a Tokio task does not help once the task has woken up and is
//! waiting on the shared-state lock, so cancellation cannot rely on
//! [`AbortHandle`] alone. Instead each scheduled timer carries a
//! generation [`TimerTicket`]; the fire callback must redeem it with
//! [`TimerMap::complete`] *while holding the shared-state lock* and only
//! proceed if that returns true. `cancel` retires the generation, so a
//! cancelled timer that still manages to wake finds its ticket stale and
//! does nothing: cancel-then-fire can never both apply.
//!
//! ```ignore
//! let ok = timers.schedule(room_id, delay, |ticket| async move {
//!     let mut app = state.lock().await;          // re-acquire, re-validate
//!     if !app.timers.complete(&ticket) {
//!         return;                                 // lost the race
//!     }
//!     // ...perform the deferred work against current state...
//! });
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::task::AbortHandle;

/// Proof of a specific scheduled timer. Redeemed exactly once via
/// [`TimerMap::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTicket<K> {
    key: K,
    generation: u64,
}

impl<K> TimerTicket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

struct Pending {
    generation: u64,
    abort: AbortHandle,
}

/// At most one pending deferred task per key.
///
/// Not thread-safe by itself — it lives inside the server's shared state,
/// behind the same mutex the fire callbacks re-acquire.
pub struct TimerMap<K> {
    pending: HashMap<K, Pending>,
    next_generation: u64,
}

impl<K> TimerMap<K>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Schedules `fire` to run after `delay`, unless a timer is already
    /// pending for `key` — then nothing is scheduled and this returns
    /// false (keep-existing discipline).
    ///
    /// `fire` receives the ticket it must redeem with [`complete`](Self::complete).
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F, Fut>(&mut self, key: K, delay: Duration, fire: F) -> bool
    where
        F: FnOnce(TimerTicket<K>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.pending.contains_key(&key) {
            tracing::debug!(key = ?key, "timer already pending; keeping existing");
            return false;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let ticket = TimerTicket {
            key: key.clone(),
            generation,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(ticket).await;
        });
        self.pending.insert(
            key,
            Pending {
                generation,
                abort: handle.abort_handle(),
            },
        );
        true
    }

    /// Replace discipline: cancels any pending timer for `key` and starts
    /// a fresh countdown (debounce).
    pub fn reschedule<F, Fut>(&mut self, key: K, delay: Duration, fire: F)
    where
        F: FnOnce(TimerTicket<K>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(&key);
        let scheduled = self.schedule(key, delay, fire);
        debug_assert!(scheduled, "no pending entry can remain after cancel");
    }

    /// Cancels the pending timer for `key`, if any. The generation is
    /// retired, so even an already-woken task cannot redeem its ticket.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(p) => {
                p.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Redeems a ticket: true exactly when it belongs to the timer that is
    /// still pending for its key, which is then retired. The caller must
    /// hold the shared-state lock while redeeming and acting.
    pub fn complete(&mut self, ticket: &TimerTicket<K>) -> bool {
        match self.pending.get(&ticket.key) {
            Some(p) if p.generation == ticket.generation => {
                self.pending.remove(&ticket.key);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K> Default for TimerMap<K>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests (generation bookkeeping; timing behavior lives in tests/)
// =========================================================================
