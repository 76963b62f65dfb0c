use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::{DESKTOP_USER_AGENT, MOBILE_USER_AGENT};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("navigation_timeout: {0}")]
    NavigationTimeout(String),
    #[error("content_not_found: selector {0} never appeared")]
    ContentNotFound(String),
    #[error("no_banners_found: {0} rendered no extractable banners")]
    NoBannersFound(String),
    #[error("mobile_pass_failure: {0}")]
    MobilePassFailure(String),
    #[error("already_running")]
    AlreadyRunning,
    #[error("scrape: {0}")]
    Scrape(String),
}

impl ScrapeError {
    /// Configuration problems and overlap rejections are final; everything
    /// else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ScrapeError::Configuration(_) | ScrapeError::AlreadyRunning
        )
    }
}

impl From<anyhow::Error> for ScrapeError {
    fn from(e: anyhow::Error) -> Self {
        ScrapeError::Scrape(format!("{:#}", e))
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::Scrape(format!("could not decode page data: {}", e))
    }
}

/// One image record as collected in the page, before ids are assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBanner {
    pub src: String,
    pub srcset: Option<String>,
    pub alt: String,
    pub link: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: usize,
    pub src: String,
    pub srcset: Option<String>,
    pub mobile_src: Option<String>,
    pub mobile_srcset: Option<String>,
    pub alt: String,
    pub link: Option<String>,
    pub width: u32,
    pub height: u32,
    pub mobile_width: Option<u32>,
    pub mobile_height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub banners: Vec<Banner>,
    pub scraped_at: DateTime<Utc>,
    pub source: String,
    pub count: usize,
}

impl ScrapeResult {
    pub fn new(banners: Vec<Banner>, source: &str) -> Self {
        ScrapeResult {
            count: banners.len(),
            banners,
            scraped_at: Utc::now(),
            source: source.into(),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.scraped_at
    }

    pub fn is_stale(&self, threshold: std::time::Duration) -> bool {
        match chrono::Duration::from_std(threshold) {
            Ok(threshold) => self.age() > threshold,
            // a threshold too large to represent never expires
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeStatus {
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub total_scrapes: u64,
    pub total_failures: u64,
    pub is_running: bool,
    pub next_scheduled: Option<DateTime<Utc>>,
}

/// Viewport and identity a pass is rendered with.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub user_agent: String,
    pub mobile: bool,
}

impl ViewportProfile {
    pub fn desktop() -> Self {
        ViewportProfile {
            name: "desktop".into(),
            width: 1920,
            height: 1080,
            user_agent: DESKTOP_USER_AGENT.into(),
            mobile: false,
        }
    }

    pub fn mobile() -> Self {
        ViewportProfile {
            name: "mobile".into(),
            width: 390,
            height: 844,
            user_agent: MOBILE_USER_AGENT.into(),
            mobile: true,
        }
    }
}
