use itertools::Itertools;
use std::thread;

use crate::{
    browser_controller::BrowserSession,
    scraper::ScrapeOptions,
    site_adapter::SiteAdapter,
    types::{RawBanner, ScrapeError, ViewportProfile},
    utils::strip_query,
};

/// Loads `url` with the given viewport and identity and returns the banners
/// rendered once the page settles.
pub fn extract_at_viewport(
    session: &dyn BrowserSession,
    adapter: &dyn SiteAdapter,
    url: &str,
    profile: &ViewportProfile,
    options: &ScrapeOptions,
) -> Result<Vec<RawBanner>, ScrapeError> {
    // identity has to be in place before navigation, the target serves per device
    session.apply_profile(profile)?;

    debug!("navigating to {} as {}", url, profile.name);
    session.navigate(url, options.navigation_timeout)?;
    session.wait_for(adapter.image_selector(), options.selector_timeout)?;

    debug!("sleeping for {:?} to let slides render", options.settle_delay);
    thread::sleep(options.settle_delay);

    let banners = collect(session, adapter)?;
    debug!(
        "{} banners rendered initially in {} pass",
        banners.len(),
        profile.name
    );
    Ok(banners)
}

/// Runs the in-page collection step once, deduplicated by base URL.
pub fn collect(
    session: &dyn BrowserSession,
    adapter: &dyn SiteAdapter,
) -> Result<Vec<RawBanner>, ScrapeError> {
    let raw = session.evaluate(&adapter.collect_script())?;
    let found: Vec<RawBanner> = serde_json::from_str(&raw)?;
    Ok(dedupe_by_base_url(found))
}

/// Keeps the first record for every query-stripped `src`, in order.
pub fn dedupe_by_base_url(banners: Vec<RawBanner>) -> Vec<RawBanner> {
    banners
        .into_iter()
        .filter(|b| !b.src.is_empty())
        .unique_by(|b| strip_query(&b.src))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw(src: &str) -> RawBanner {
        RawBanner {
            src: src.into(),
            ..Default::default()
        }
    }

    #[test]
    fn recycled_nodes_collapse_to_one() {
        let out = dedupe_by_base_url(vec![
            raw("https://cdn.example.com/a.jpg?t=1"),
            raw("https://cdn.example.com/b.jpg"),
            raw("https://cdn.example.com/a.jpg?t=2"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].src, "https://cdn.example.com/a.jpg?t=1");
        assert_eq!(out[1].src, "https://cdn.example.com/b.jpg");
    }

    #[test]
    fn empty_sources_are_dropped() {
        let out = dedupe_by_base_url(vec![raw(""), raw("https://cdn.example.com/a.jpg")]);
        assert_eq!(out.len(), 1);
    }
}
