//! # Bounded Queue Module
//!
//! Capacity-limited async FIFO connecting telemetry producers to the
//! drain tasks.
//!
//! This module handles:
//! - Non-blocking `try_put`/`try_get` with `QueueFull`/`QueueEmpty` signals
//! - Cooperative `put`/`get` that suspend until the operation can proceed
//! - Edge-triggered wakeups: a signal has no stored permit, so a woken
//!   waiter re-checks its condition and may go back to sleep
//! - Atomic snapshot-and-clear draining for batch writers
//!
//! Unlike the cooperative single-scheduler original, every operation is
//! safe to call from preemptive threads: the internal mutex is the
//! critical section a threaded port is required to add.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;

/// Error returned by [`Queue::try_put`] on a full queue.
///
/// Carries the rejected item back to the caller, mirroring tokio's
/// `TrySendError`. Queue-full is an expected backpressure signal, not a
/// failure.
#[derive(Debug, Error)]
#[error("queue is full")]
pub struct QueueFull<T>(pub T);

/// Error returned by [`Queue::try_get`] on an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is empty")]
pub struct QueueEmpty;

/// Bounded async FIFO queue.
///
/// A capacity of `0` means unbounded: `is_full` is always false and
/// `try_put` never fails.
///
/// # Examples
///
/// ```
/// use blackbox::queue::Queue;
///
/// let queue: Queue<u32> = Queue::new(2);
/// queue.try_put(1).unwrap();
/// queue.try_put(2).unwrap();
/// assert!(queue.try_put(3).is_err());
/// assert_eq!(queue.try_get().unwrap(), 1);
/// ```
pub struct Queue<T> {
    /// FIFO storage, guarded for preemptive-thread access
    items: Mutex<VecDeque<T>>,
    /// Maximum number of items (0 = unbounded)
    capacity: usize,
    /// Pulsed by put, awaited by blocked getters
    put_event: Notify,
    /// Pulsed by get, awaited by blocked putters
    get_event: Notify,
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> Queue<T> {
    /// Creates a queue holding at most `capacity` items (0 = unbounded).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            put_event: Notify::new(),
            get_event: Notify::new(),
        }
    }

    /// A poisoned mutex only means a panic elsewhere while the lock was
    /// held; the queue state itself is still coherent, so recover the
    /// guard rather than propagate the panic into the logging path.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// True when the queue is at capacity. Always false for unbounded
    /// queues.
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.len() >= self.capacity
    }

    /// Configured capacity (0 = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an item without blocking.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` carrying the item back when the queue is at
    /// capacity; the queue length is unchanged.
    pub fn try_put(&self, item: T) -> Result<(), QueueFull<T>> {
        {
            let mut items = self.lock();
            if self.capacity > 0 && items.len() >= self.capacity {
                return Err(QueueFull(item));
            }
            items.push_back(item);
        }
        // Edge-triggered pulse: wakes currently-parked getters, stores
        // nothing for future ones
        self.put_event.notify_waiters();
        Ok(())
    }

    /// Pops the head item without blocking.
    ///
    /// # Errors
    ///
    /// Returns `QueueEmpty` when no item is available; the queue length is
    /// unchanged.
    pub fn try_get(&self) -> Result<T, QueueEmpty> {
        let item = {
            let mut items = self.lock();
            items.pop_front().ok_or(QueueEmpty)?
        };
        self.get_event.notify_waiters();
        Ok(item)
    }

    /// Appends an item, suspending while the queue is full.
    ///
    /// A wakeup does not reserve a slot: the condition is re-checked and
    /// the task goes back to waiting if another putter won the race.
    pub async fn put(&self, item: T) {
        let mut item = item;
        loop {
            let unparked = self.get_event.notified();
            tokio::pin!(unparked);
            // Register interest before re-checking so a pulse between the
            // check and the await is not missed
            unparked.as_mut().enable();

            match self.try_put(item) {
                Ok(()) => return,
                Err(QueueFull(rejected)) => item = rejected,
            }
            unparked.await;
        }
    }

    /// Pops the head item, suspending while the queue is empty.
    ///
    /// Same re-check contract as [`Queue::put`]: being woken does not
    /// guarantee an item is still available.
    pub async fn get(&self) -> T {
        loop {
            let arrived = self.put_event.notified();
            tokio::pin!(arrived);
            arrived.as_mut().enable();

            if let Ok(item) = self.try_get() {
                return item;
            }
            arrived.await;
        }
    }

    /// Removes and returns every queued item in FIFO order as one atomic
    /// snapshot-and-clear.
    pub fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = {
            let mut items = self.lock();
            items.drain(..).collect()
        };
        if !drained.is_empty() {
            self.get_event.notify_waiters();
        }
        drained
    }
}
