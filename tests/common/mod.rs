#![allow(dead_code)]

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use anyhow::anyhow;
use banner_scraper::{
    browser_controller::{BrowserSession, SessionLauncher},
    config::Config,
    scraper::ScrapeOptions,
    service::BannerService,
    site_adapter::SiteAdapter,
    types::{RawBanner, ScrapeError, ViewportProfile},
};

pub const TARGET: &str = "https://menu.example.com/embed";

pub fn raw(src: &str) -> RawBanner {
    RawBanner {
        src: src.into(),
        srcset: None,
        alt: format!("alt for {}", src),
        link: Some("https://shop.example.com/promo".into()),
        width: 1200,
        height: 400,
    }
}

pub fn numbered(prefix: &str, n: usize) -> Vec<RawBanner> {
    (0..n)
        .map(|i| raw(&format!("https://cdn.example.com/{}-{}.jpg", prefix, i)))
        .collect()
}

/// How one viewport of the fake page behaves.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    /// Banners rendered after 0, 1, 2.. clicks; the last frame repeats.
    pub frames: Vec<Vec<RawBanner>>,
    /// `None` when there is no next control at all.
    pub next_visible: Option<bool>,
    pub fail_navigation: bool,
    pub missing_content: bool,
    /// Clicks beyond this many throw.
    pub clicks_before_failure: Option<usize>,
}

impl PageScript {
    pub fn static_page(banners: Vec<RawBanner>) -> Self {
        PageScript {
            frames: vec![banners],
            ..Default::default()
        }
    }

    pub fn carousel(frames: Vec<Vec<RawBanner>>) -> Self {
        PageScript {
            frames,
            next_visible: Some(true),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        PageScript {
            fail_navigation: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteScript {
    pub desktop: PageScript,
    pub mobile: PageScript,
}

impl SiteScript {
    pub fn new(desktop: PageScript, mobile: PageScript) -> Self {
        SiteScript { desktop, mobile }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub live: AtomicUsize,
    pub overlapped: AtomicBool,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

/// Hands out scripted sessions; attempt `n` uses `attempts[n]`, the last one repeats.
pub struct FakeLauncher {
    attempts: Vec<SiteScript>,
    pub counters: Arc<Counters>,
    pub navigation_delay: Duration,
    pub launch_fails: bool,
}

impl FakeLauncher {
    pub fn new(attempts: Vec<SiteScript>) -> Self {
        FakeLauncher {
            attempts,
            counters: Arc::new(Counters::default()),
            navigation_delay: Duration::ZERO,
            launch_fails: false,
        }
    }

    pub fn always(site: SiteScript) -> Self {
        Self::new(vec![site])
    }
}

impl SessionLauncher for FakeLauncher {
    fn launch(&self) -> anyhow::Result<Box<dyn BrowserSession + Send>> {
        let n = self.counters.launches.fetch_add(1, Ordering::SeqCst);
        if self.launch_fails {
            return Err(anyhow!("chrome binary not found"));
        }
        if self.counters.live.fetch_add(1, Ordering::SeqCst) > 0 {
            self.counters.overlapped.store(true, Ordering::SeqCst);
        }
        let site = self
            .attempts
            .get(n)
            .or_else(|| self.attempts.last())
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(FakeSession {
            site,
            state: Mutex::new(SessionState::default()),
            counters: self.counters.clone(),
            navigation_delay: self.navigation_delay,
            closed: false,
        }))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    mobile: bool,
    clicks: usize,
}

pub struct FakeSession {
    site: SiteScript,
    state: Mutex<SessionState>,
    counters: Arc<Counters>,
    navigation_delay: Duration,
    closed: bool,
}

impl FakeSession {
    fn page(&self) -> (PageScript, usize) {
        let state = self.state.lock().unwrap();
        let page = if state.mobile {
            self.site.mobile.clone()
        } else {
            self.site.desktop.clone()
        };
        (page, state.clicks)
    }
}

impl BrowserSession for FakeSession {
    fn apply_profile(&self, profile: &ViewportProfile) -> anyhow::Result<()> {
        self.state.lock().unwrap().mobile = profile.mobile;
        Ok(())
    }

    fn block_decorative_requests(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        thread::sleep(self.navigation_delay);
        self.state.lock().unwrap().clicks = 0;
        if self.page().0.fail_navigation {
            return Err(ScrapeError::NavigationTimeout(url.into()));
        }
        Ok(())
    }

    fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        if self.page().0.missing_content {
            return Err(ScrapeError::ContentNotFound(selector.into()));
        }
        Ok(())
    }

    fn evaluate(&self, script: &str) -> anyhow::Result<String> {
        let (page, clicks) = self.page();
        match script {
            "collect" => {
                let frame = page
                    .frames
                    .get(clicks)
                    .or_else(|| page.frames.last())
                    .cloned()
                    .unwrap_or_default();
                Ok(serde_json::to_string(&frame)?)
            }
            "locate" => Ok(match page.next_visible {
                Some(visible) => format!(r#"{{"found":true,"visible":{}}}"#, visible),
                None => r#"{"found":false,"visible":false}"#.to_string(),
            }),
            other => Err(anyhow!("unexpected script {}", other)),
        }
    }

    fn click(&self, selector: &str) -> anyhow::Result<()> {
        let (page, clicks) = self.page();
        if let Some(limit) = page.clicks_before_failure {
            if clicks >= limit {
                return Err(anyhow!("{} is detached from the document", selector));
            }
        }
        self.state.lock().unwrap().clicks += 1;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Answers the fake session's two scripts by name.
pub struct FakeAdapter;

impl SiteAdapter for FakeAdapter {
    fn image_selector(&self) -> &str {
        "img.banner"
    }

    fn next_control_selectors(&self) -> Vec<String> {
        vec![".next".into()]
    }

    fn collect_script(&self) -> String {
        "collect".into()
    }

    fn locate_next_script(&self) -> String {
        "locate".into()
    }

    fn next_control_selector(&self) -> String {
        ".next".into()
    }
}

pub fn fast_options() -> ScrapeOptions {
    ScrapeOptions::default_builder()
        .settle_delay(Duration::ZERO)
        .click_delay(Duration::ZERO)
        .build()
        .unwrap()
}

pub fn config(cache: &Path, max_retries: u32) -> Config {
    Config::default_builder()
        .target_url(Some(TARGET.to_string()))
        .cache_path(cache.join("banners.json"))
        .max_retries(max_retries)
        .retry_delay(Duration::ZERO)
        .build()
        .unwrap()
}

pub fn service(config: Config, launcher: FakeLauncher) -> (BannerService, Arc<Counters>) {
    let counters = launcher.counters.clone();
    let service = BannerService::new(
        config,
        Arc::new(launcher),
        Arc::new(FakeAdapter),
        fast_options(),
    )
    .unwrap();
    (service, counters)
}
