use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use tokio::time::{sleep, Instant};

use crate::{service::BannerService, types::ScrapeError};

// how often the loop wakes up to look at the termination flag
const TERMINATION_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Steady,
    FailureRetry,
}

/// Keeps the cache fresh independent of request traffic.
///
/// A steady timer fires every `interval` after the previous steady attempt
/// completes. When a steady attempt fails, a short failure timer gives up to
/// `max_retries` extra attempts before the next steady one. Both timers go
/// through the runner's single scrape slot, so a tick that lands during a
/// background refresh is skipped.
pub struct RefreshScheduler {
    service: BannerService,
    interval: Duration,
    failure_retry_delay: Duration,
    max_failure_retries: u32,
}

impl RefreshScheduler {
    pub fn new(service: BannerService) -> Self {
        let config = service.config();
        RefreshScheduler {
            interval: config.interval,
            failure_retry_delay: config.failure_retry_delay,
            max_failure_retries: config.max_retries,
            service,
        }
    }

    pub async fn run(&self, should_terminate: Arc<AtomicBool>) -> Result<(), ScrapeError> {
        // fail fast, nothing to schedule without a target
        self.service.config().require_target_url()?;
        info!(
            "refresh scheduler started, every {:?} (failure retries every {:?}, at most {})",
            self.interval, self.failure_retry_delay, self.max_failure_retries
        );

        let mut next_steady = Instant::now();
        let mut next_retry: Option<Instant> = None;
        let mut retries_left = 0;

        while !should_terminate.load(Ordering::Relaxed) {
            let now = Instant::now();
            let trigger = if now >= next_steady {
                Some(Trigger::Steady)
            } else {
                match next_retry {
                    Some(at) if now >= at => Some(Trigger::FailureRetry),
                    _ => None,
                }
            };

            let trigger = match trigger {
                Some(t) => t,
                None => {
                    let wake = next_retry.map_or(next_steady, |r| r.min(next_steady));
                    sleep(wake.saturating_duration_since(now).min(TERMINATION_POLL)).await;
                    continue;
                }
            };

            debug!("scheduler firing {:?} scrape", trigger);
            match self.service.scrape().await {
                Ok(result) => {
                    debug!("scheduled scrape stored {} banners", result.count);
                    next_retry = None;
                }
                Err(ScrapeError::AlreadyRunning) => {
                    debug!("scrape already running, skipping {:?} tick", trigger);
                    if trigger == Trigger::FailureRetry {
                        next_retry = Some(Instant::now() + self.failure_retry_delay);
                    }
                }
                Err(e) if !e.is_retryable() => {
                    error!("scheduler stopping: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    if trigger == Trigger::Steady {
                        retries_left = self.max_failure_retries;
                    }
                    if retries_left > 0 {
                        retries_left -= 1;
                        warn!(
                            "scheduled scrape failed ({}), retrying in {:?}, {} retries left",
                            e, self.failure_retry_delay, retries_left
                        );
                        next_retry = Some(Instant::now() + self.failure_retry_delay);
                    } else {
                        warn!(
                            "scheduled scrape failed ({}), waiting for the next interval",
                            e
                        );
                        next_retry = None;
                    }
                }
            }
            if trigger == Trigger::Steady {
                next_steady = Instant::now() + self.interval;
            }
            self.publish_next(next_steady, next_retry);
        }

        info!("refresh scheduler terminated");
        self.service.runner().status().set_next_scheduled(None);
        Ok(())
    }

    fn publish_next(&self, next_steady: Instant, next_retry: Option<Instant>) {
        let next = next_retry.map_or(next_steady, |r| r.min(next_steady));
        let wait = next.saturating_duration_since(Instant::now());
        let at = chrono::Duration::from_std(wait)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self.service.runner().status().set_next_scheduled(at);
    }
}
