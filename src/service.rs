use std::sync::Arc;

use crate::{
    browser_controller::{ChromeLauncher, SessionLauncher},
    cache::CacheStore,
    config::Config,
    runner::{RetryOptions, Runner},
    scraper::{ScrapeOptions, Scraper},
    site_adapter::{MenuSiteAdapter, SiteAdapter},
    status::StatusTracker,
    types::{ScrapeError, ScrapeResult, ScrapeStatus},
};

/// What the HTTP and WordPress layers talk to: a forced `scrape()` and a
/// never-blocking-on-refresh `get_cached()`.
#[derive(Clone)]
pub struct BannerService {
    config: Arc<Config>,
    store: Arc<CacheStore>,
    runner: Arc<Runner>,
}

impl BannerService {
    pub fn new(
        config: Config,
        launcher: Arc<dyn SessionLauncher>,
        adapter: Arc<dyn SiteAdapter>,
        scrape_options: ScrapeOptions,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(CacheStore::new(config.cache_path.clone()));
        let scraper = Arc::new(Scraper::new(launcher, adapter, store.clone(), scrape_options));
        let retry_options = RetryOptions::default_builder()
            .max_retries(config.max_retries)
            .retry_delay(config.retry_delay)
            .build()?;
        let runner = Arc::new(Runner::new(scraper, StatusTracker::new(), retry_options));
        Ok(BannerService {
            config: Arc::new(config),
            store,
            runner,
        })
    }

    /// Headless Chrome against the default menu adapter.
    pub fn with_chrome(config: Config) -> anyhow::Result<Self> {
        let launcher = Arc::new(ChromeLauncher::new(config.chrome_path.clone()));
        Self::new(
            config,
            launcher,
            Arc::new(MenuSiteAdapter::default()),
            ScrapeOptions::default_builder().build()?,
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &Arc<Runner> {
        &self.runner
    }

    pub fn status(&self) -> ScrapeStatus {
        self.runner.status().snapshot()
    }

    /// Forces a fresh run of the pipeline.
    pub async fn scrape(&self) -> Result<ScrapeResult, ScrapeError> {
        let url = self.config.require_target_url()?;
        self.runner.run_with_retry(url).await
    }

    /// Best available data. Bootstraps synchronously when nothing is cached;
    /// otherwise answers from the cache and refreshes stale data in the
    /// background.
    pub async fn get_cached(&self) -> Result<ScrapeResult, ScrapeError> {
        let cached = self.store.load()?;
        match cached {
            Some(result) => {
                if result.is_stale(self.config.staleness_threshold()) {
                    self.spawn_background_refresh();
                }
                Ok(result)
            }
            None => {
                info!("no cached banners yet, scraping now");
                self.scrape().await
            }
        }
    }

    /// Starts a refresh unless one is already in flight. Returns whether one
    /// was started.
    pub fn spawn_background_refresh(&self) -> bool {
        let url = match self.config.require_target_url() {
            Ok(u) => u.to_string(),
            Err(e) => {
                warn!("cannot refresh stale banners: {}", e);
                return false;
            }
        };
        // claimed here, not in the task, so concurrent readers see it at once
        let guard = match self.runner.status().try_begin() {
            Some(g) => g,
            None => {
                debug!("stale banners, refresh already in flight");
                return false;
            }
        };
        info!("cached banners are stale, refreshing in the background");
        let runner = self.runner.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run_claimed(guard, &url).await {
                warn!("background refresh failed, serving stale banners: {}", e);
            }
        });
        true
    }
}
