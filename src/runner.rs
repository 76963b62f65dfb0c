use std::{sync::Arc, time::Duration};

use tokio::{task, time::sleep};
use tokio_retry::strategy::FixedInterval;

use crate::{
    scraper::Scraper,
    status::{RunGuard, StatusTracker},
    types::{ScrapeError, ScrapeResult},
};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RetryOptions {
    // retries after the first attempt, so max_retries + 1 attempts in total
    #[builder(default = "3")]
    pub max_retries: u32,
    #[builder(default = "Duration::from_secs(30)")]
    pub retry_delay: Duration,
}

impl RetryOptions {
    pub fn default_builder() -> RetryOptionsBuilder {
        RetryOptionsBuilder::default()
    }
}

/// Runs the scraper with bounded retries, one logical scrape at a time.
#[derive(Clone)]
pub struct Runner {
    scraper: Arc<Scraper>,
    status: StatusTracker,
    options: RetryOptions,
}

impl Runner {
    pub fn new(scraper: Arc<Scraper>, status: StatusTracker, options: RetryOptions) -> Self {
        Runner {
            scraper,
            status,
            options,
        }
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn scraper(&self) -> &Arc<Scraper> {
        &self.scraper
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Returns [`ScrapeError::AlreadyRunning`] without side effects when another
    /// scrape holds the slot.
    pub async fn run_with_retry(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        let guard = match self.status.try_begin() {
            Some(g) => g,
            None => {
                debug!("scrape of {} requested while one is in flight", url);
                return Err(ScrapeError::AlreadyRunning);
            }
        };
        self.run_claimed(guard, url).await
    }

    /// Runs with a slot claimed beforehand through [`StatusTracker::try_begin`].
    ///
    /// The retry loop runs on its own task that owns the slot, so a caller that
    /// stops waiting does not free it while a browser session is still open.
    pub async fn run_claimed(
        &self,
        guard: RunGuard,
        url: &str,
    ) -> Result<ScrapeResult, ScrapeError> {
        let runner = self.clone();
        let url = url.to_string();
        let handle = task::spawn(async move {
            let _guard = guard;
            runner.retry_loop(&url).await
        });
        match handle.await {
            Ok(res) => res,
            Err(e) => Err(ScrapeError::Scrape(format!("scrape task aborted: {}", e))),
        }
    }

    async fn retry_loop(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        let mut delays = FixedInterval::new(self.options.retry_delay)
            .take(self.options.max_retries as usize);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.status.record_attempt();
            debug!("scrape attempt {} for {}", attempt, url);

            let err = match self.attempt(url).await {
                Ok(result) => {
                    self.status.record_success();
                    return Ok(result);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!("scrape of {} failed permanently: {}", url, err);
                self.status.record_failure(&err);
                return Err(err);
            }
            match delays.next() {
                Some(delay) => {
                    warn!(
                        "scrape attempt {} for {} failed: {}, retrying in {:?}",
                        attempt, url, err, delay
                    );
                    sleep(delay).await;
                }
                None => {
                    error!(
                        "scrape of {} failed after {} attempts: {}",
                        url, attempt, err
                    );
                    self.status.record_failure(&err);
                    return Err(err);
                }
            }
        }
    }

    // the browser session lives and dies inside the blocking task
    async fn attempt(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        let scraper = self.scraper.clone();
        let url = url.to_string();
        match task::spawn_blocking(move || scraper.scrape(&url)).await {
            Ok(res) => res,
            Err(e) => Err(ScrapeError::Scrape(format!("scrape task aborted: {}", e))),
        }
    }
}
