use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Bounds the number of jobs in flight.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
}

impl AdmissionGate {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// A slot for one job, or `None` if all are taken. Never waits.
    #[must_use]
    pub fn try_admit(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).try_acquire_owned().ok()
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Sliding-window request limit per requester.
///
/// Only admitted requests count towards the limit. Requesters with nothing
/// left in the window are forgotten, at most one window after going quiet.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    seen: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl LimiterState {
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .last_sweep
            .is_some_and(|x| now.saturating_duration_since(x) < window)
        {
            return;
        }

        let before = self.seen.len();
        self.seen.retain(|_, entries| {
            entries
                .back()
                .is_some_and(|x| now.saturating_duration_since(*x) < window)
        });
        self.last_sweep = Some(now);
        trace!(dropped = before - self.seen.len(), "Swept idle requesters");
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Record a request from `identity` if it is under the limit.
    pub fn try_acquire(&self, identity: &str) -> bool {
        self.try_acquire_at(identity, Instant::now())
    }

    pub fn try_acquire_at(&self, identity: &str, now: Instant) -> bool {
        let mut state = self.state.lock();
        state.sweep(now, self.window);

        let entries = state.seen.entry(identity.to_string()).or_default();

        while entries
            .front()
            .is_some_and(|x| now.saturating_duration_since(*x) >= self.window)
        {
            entries.pop_front();
        }

        if entries.len() >= self.max_requests {
            trace!(identity, count = entries.len(), "Rate limit reached");
            return false;
        }

        entries.push_back(now);
        true
    }

    /// Number of requesters currently remembered.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.state.lock().seen.len()
    }
}
