use std::{path::PathBuf, time::Duration};

use crate::{
    types::ScrapeError,
    utils::{DEFAULT_CACHE_PATH, DEFAULT_CHROME_PATH, DEFAULT_INTERVAL_MINUTES},
};

pub const TARGET_URL_ENV: &str = "BANNER_TARGET_URL";
pub const INTERVAL_ENV: &str = "SCRAPE_INTERVAL_MINUTES";
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";
pub const CACHE_PATH_ENV: &str = "BANNER_CACHE_PATH";

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct Config {
    // page carrying the embedded menu; checked lazily so status reads work without it
    #[builder(default = "None")]
    pub target_url: Option<String>,
    #[builder(default = "Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60)")]
    pub interval: Duration,
    // cached data older than interval * staleness_factor is refreshed in the background
    #[builder(default = "2")]
    pub staleness_factor: u32,
    #[builder(default = "DEFAULT_CHROME_PATH.clone()")]
    pub chrome_path: Option<PathBuf>,
    #[builder(default = "PathBuf::from(DEFAULT_CACHE_PATH)")]
    pub cache_path: PathBuf,
    #[builder(default = "3")]
    pub max_retries: u32,
    // pause between attempts inside one retry cycle
    #[builder(default = "Duration::from_secs(30)")]
    pub retry_delay: Duration,
    // scheduler's short timer after a failed cycle
    #[builder(default = "Duration::from_secs(5 * 60)")]
    pub failure_retry_delay: Duration,
}

impl Config {
    pub fn default_builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::default_builder();
        builder.target_url(
            lookup(TARGET_URL_ENV)
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
        );
        if let Some(raw) = lookup(INTERVAL_ENV) {
            builder.interval(parse_interval_minutes(&raw));
        }
        if let Some(path) = lookup(CHROME_PATH_ENV).filter(|p| !p.is_empty()) {
            builder.chrome_path(Some(PathBuf::from(path)));
        }
        if let Some(path) = lookup(CACHE_PATH_ENV).filter(|p| !p.is_empty()) {
            builder.cache_path(PathBuf::from(path));
        }
        Ok(builder.build()?)
    }

    pub fn require_target_url(&self) -> Result<&str, ScrapeError> {
        match self.target_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(ScrapeError::Configuration(format!(
                "{} is not set",
                TARGET_URL_ENV
            ))),
        }
    }

    /// Saturates, so an absurd interval means cached data never goes stale.
    pub fn staleness_threshold(&self) -> Duration {
        self.interval
            .checked_mul(self.staleness_factor)
            .unwrap_or(Duration::MAX)
    }
}

/// `None` for zero or for a count of minutes that does not fit in seconds.
pub fn interval_from_minutes(minutes: u64) -> Option<Duration> {
    if minutes == 0 {
        return None;
    }
    minutes.checked_mul(60).map(Duration::from_secs)
}

fn parse_interval_minutes(raw: &str) -> Duration {
    match raw.trim().parse::<u64>().ok().and_then(interval_from_minutes) {
        Some(interval) => interval,
        None => {
            warn!(
                "invalid {} value {:?}, falling back to {} minutes",
                INTERVAL_ENV, raw, DEFAULT_INTERVAL_MINUTES
            );
            Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_environment() {
        let c = Config::from_lookup(lookup(&[
            (TARGET_URL_ENV, " https://menu.example.com/embed "),
            (INTERVAL_ENV, "15"),
            (CACHE_PATH_ENV, "/var/lib/banners/cache.json"),
            (CHROME_PATH_ENV, "/usr/bin/chromium"),
        ]))
        .unwrap();
        assert_eq!(c.require_target_url().unwrap(), "https://menu.example.com/embed");
        assert_eq!(c.interval, Duration::from_secs(15 * 60));
        assert_eq!(c.staleness_threshold(), Duration::from_secs(30 * 60));
        assert_eq!(c.cache_path, PathBuf::from("/var/lib/banners/cache.json"));
        assert_eq!(c.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn missing_target_url_is_a_configuration_error() {
        let c = Config::from_lookup(lookup(&[])).unwrap();
        assert!(matches!(
            c.require_target_url(),
            Err(ScrapeError::Configuration(_))
        ));

        let blank = Config::from_lookup(lookup(&[(TARGET_URL_ENV, "   ")])).unwrap();
        assert!(blank.target_url.is_none());
    }

    #[test]
    fn bad_interval_falls_back_to_default() {
        for raw in ["abc", "0", "-5", "", "307445734561825861"] {
            let c = Config::from_lookup(lookup(&[(INTERVAL_ENV, raw)])).unwrap();
            assert_eq!(c.interval, Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60));
        }
    }

    #[test]
    fn huge_interval_saturates_staleness() {
        let c = Config::default_builder()
            .interval(Duration::MAX / 2 + Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(c.staleness_threshold(), Duration::MAX);
        assert_eq!(interval_from_minutes(u64::MAX / 60 + 1), None);
        assert_eq!(interval_from_minutes(2), Some(Duration::from_secs(120)));
    }
}
