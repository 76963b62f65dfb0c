use std::{sync::Arc, time::Duration};

use crate::{
    browser_controller::{BrowserSession, SessionGuard, SessionLauncher},
    cache::CacheStore,
    carousel,
    extractor::extract_at_viewport,
    site_adapter::SiteAdapter,
    types::{Banner, RawBanner, ScrapeError, ScrapeResult, ViewportProfile},
    utils::{is_absolute_url, strip_query},
};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct ScrapeOptions {
    // canonical pass, defines ids
    #[builder(default = "ViewportProfile::desktop()")]
    pub desktop: ViewportProfile,
    // enrichment pass, best effort
    #[builder(default = "ViewportProfile::mobile()")]
    pub mobile: ViewportProfile,
    #[builder(default = "Duration::from_secs(30)")]
    pub navigation_timeout: Duration,
    // how long the banner images may take to show up after load
    #[builder(default = "Duration::from_secs(15)")]
    pub selector_timeout: Duration,
    // wait after the first banner appears, client side rendering keeps adding slides
    #[builder(default = "Duration::from_secs(3)")]
    pub settle_delay: Duration,
    // wait after each carousel click
    #[builder(default = "Duration::from_secs(1)")]
    pub click_delay: Duration,
    #[builder(default = "20")]
    pub max_clicks: usize,
    // clicks in a row without new banners before the walk stops
    #[builder(default = "3")]
    pub stable_rounds: usize,
    // abort font and stylesheet requests
    #[builder(default = "true")]
    pub block_decorative_requests: bool,
}

impl ScrapeOptions {
    pub fn default_builder() -> ScrapeOptionsBuilder {
        ScrapeOptionsBuilder::default()
    }
}

/// Runs the desktop and mobile passes in one browser session and persists the
/// merged result.
pub struct Scraper {
    launcher: Arc<dyn SessionLauncher>,
    adapter: Arc<dyn SiteAdapter>,
    store: Arc<CacheStore>,
    options: ScrapeOptions,
}

impl Scraper {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        adapter: Arc<dyn SiteAdapter>,
        store: Arc<CacheStore>,
        options: ScrapeOptions,
    ) -> Self {
        Scraper {
            launcher,
            adapter,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// One full attempt. Blocks the calling thread for its whole duration.
    pub fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        if url.trim().is_empty() {
            return Err(ScrapeError::Configuration("target url is empty".into()));
        }

        let session = SessionGuard::new(self.launcher.launch()?);
        let banners = self.scrape_passes(&*session, url)?;
        // released before the result leaves the attempt
        drop(session);

        let result = ScrapeResult::new(banners, url);
        self.store.save(&result)?;
        info!(
            "scrape of {} completed with {} banners",
            result.source, result.count
        );
        Ok(result)
    }

    fn scrape_passes(
        &self,
        session: &dyn BrowserSession,
        url: &str,
    ) -> Result<Vec<Banner>, ScrapeError> {
        if self.options.block_decorative_requests {
            if let Err(e) = session.block_decorative_requests() {
                warn!("could not block fonts and stylesheets: {:#}", e);
            }
        }

        let desktop = self.run_pass(session, url, &self.options.desktop)?;
        if desktop.is_empty() {
            return Err(ScrapeError::NoBannersFound(url.into()));
        }

        let mobile = match self.run_pass(session, url, &self.options.mobile) {
            Ok(m) => m,
            Err(e) => {
                let e = ScrapeError::MobilePassFailure(e.to_string());
                warn!("{}, continuing with desktop data only", e);
                vec![]
            }
        };

        let banners = merge_passes(desktop, &mobile);
        validate_banners(&banners);
        Ok(banners)
    }

    fn run_pass(
        &self,
        session: &dyn BrowserSession,
        url: &str,
        profile: &ViewportProfile,
    ) -> Result<Vec<RawBanner>, ScrapeError> {
        info!(
            "starting {} pass ({}x{}) on {}",
            profile.name, profile.width, profile.height, url
        );
        let initial = extract_at_viewport(
            session,
            self.adapter.as_ref(),
            url,
            profile,
            &self.options,
        )?;
        let walked = carousel::walk(session, self.adapter.as_ref(), initial, &self.options);
        info!(
            "{} pass found {} banners ({} clicks)",
            profile.name,
            walked.banners.len(),
            walked.clicks
        );
        Ok(walked.banners)
    }
}

/// Desktop order defines ids; the mobile entry at the same position only
/// contributes when it is a different image.
pub fn merge_passes(desktop: Vec<RawBanner>, mobile: &[RawBanner]) -> Vec<Banner> {
    desktop
        .into_iter()
        .enumerate()
        .map(|(id, d)| {
            let distinct_mobile = mobile
                .get(id)
                .filter(|m| strip_query(&m.src) != strip_query(&d.src));
            Banner {
                id,
                mobile_src: distinct_mobile.map(|m| m.src.clone()),
                mobile_srcset: distinct_mobile.and_then(|m| m.srcset.clone()),
                mobile_width: distinct_mobile.map(|m| m.width),
                mobile_height: distinct_mobile.map(|m| m.height),
                src: d.src,
                srcset: d.srcset,
                alt: d.alt,
                link: d.link,
                width: d.width,
                height: d.height,
            }
        })
        .collect()
}

/// Flags banners that will not render from another origin. Never fails.
pub fn validate_banners(banners: &[Banner]) -> usize {
    let mut invalid = 0;
    for b in banners.iter().filter(|b| !is_absolute_url(&b.src)) {
        warn!("banner {} has a non absolute src {:?}", b.id, b.src);
        invalid += 1;
    }
    invalid
}
