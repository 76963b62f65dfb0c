use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::{ScrapeError, ScrapeStatus};

/// The one owner of [`ScrapeStatus`]. Every mutation goes through here so the
/// `is_running` flag and counters never drift apart.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    inner: Arc<Mutex<ScrapeStatus>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScrapeStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ScrapeStatus {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running
    }

    /// Claims the single scrape slot. `None` when a scrape is already in flight.
    pub fn try_begin(&self) -> Option<RunGuard> {
        let mut status = self.lock();
        if status.is_running {
            return None;
        }
        status.is_running = true;
        Some(RunGuard {
            tracker: self.clone(),
        })
    }

    pub(crate) fn record_attempt(&self) {
        self.lock().last_attempt = Some(Utc::now());
    }

    pub(crate) fn record_success(&self) {
        let mut status = self.lock();
        status.last_success = Some(Utc::now());
        status.consecutive_failures = 0;
        status.total_scrapes += 1;
    }

    pub(crate) fn record_failure(&self, error: &ScrapeError) {
        let mut status = self.lock();
        status.last_error = Some(error.to_string());
        status.consecutive_failures += 1;
        status.total_scrapes += 1;
        status.total_failures += 1;
    }

    pub fn set_next_scheduled(&self, at: Option<DateTime<Utc>>) {
        self.lock().next_scheduled = at;
    }
}

/// Holds the scrape slot; dropping it clears `is_running` on every exit path.
#[derive(Debug)]
pub struct RunGuard {
    tracker: StatusTracker,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tracker.lock().is_running = false;
    }
}
