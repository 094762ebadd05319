//! Idle expiry timers.
//!
//! Each connection owns one [`ExpiryHandle`]: a spawned task that sleeps for
//! the TTL and then runs the expiry callback. Re-arming aborts the previous
//! task and hands out a handle with a fresh generation number. The callback
//! receives the generation it was armed with, so the owner can ignore a timer
//! that fired after it was superseded.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A single armed timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct ExpiryHandle {
    generation: u64,
    task: JoinHandle<()>,
}

impl ExpiryHandle {
    /// Generation this timer was armed with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancel the timer. A callback that already started keeps running.
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for ExpiryHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Arms single-shot idle timers with a fixed TTL.
#[derive(Debug)]
pub struct ExpiryScheduler {
    ttl: Duration,
    next_generation: AtomicU64,
}

impl ExpiryScheduler {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Arm a timer that calls `on_expire(generation)` once the TTL elapses.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F, Fut>(&self, on_expire: F) -> ExpiryHandle
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let ttl = self.ttl;

        let task = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            on_expire(generation).await;
        });

        ExpiryHandle { generation, task }
    }

    /// Cancel `previous` (if any) and arm a new timer in its place.
    pub fn rearm<F, Fut>(&self, previous: Option<ExpiryHandle>, on_expire: F) -> ExpiryHandle
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(handle) = previous {
            handle.cancel();
        }
        self.arm(on_expire)
    }
}
