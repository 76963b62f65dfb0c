use std::{collections::HashSet, thread};

use crate::{
    browser_controller::BrowserSession,
    extractor::collect,
    scraper::ScrapeOptions,
    site_adapter::{NextControl, SiteAdapter},
    types::RawBanner,
    utils::strip_query,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    /// No next control, or one that is not rendered (mobile layouts list every slide).
    NoControl,
    /// `stable_rounds` clicks in a row revealed nothing new.
    Stable,
    /// Hit `max_clicks`.
    ClickCap,
    /// A click or the follow-up collection threw; what was gathered stands.
    Interrupted,
}

#[derive(Debug)]
pub struct WalkOutcome {
    pub banners: Vec<RawBanner>,
    pub clicks: usize,
    pub stop: WalkStop,
}

/// Advances the carousel until it stops yielding new slides, merging every
/// newly seen banner into `initial`. Never fails: a walk that breaks off keeps
/// what it has.
pub fn walk(
    session: &dyn BrowserSession,
    adapter: &dyn SiteAdapter,
    initial: Vec<RawBanner>,
    options: &ScrapeOptions,
) -> WalkOutcome {
    let mut seen: HashSet<String> = initial.iter().map(|b| strip_query(&b.src)).collect();
    let mut banners = initial;
    let mut clicks = 0;
    let mut stable = 0;

    let stop = loop {
        if clicks >= options.max_clicks {
            break WalkStop::ClickCap;
        }
        // re-located each round, slides recycle DOM nodes
        match locate_next(session, adapter) {
            Some(NextControl {
                found: true,
                visible: true,
            }) => {}
            _ => break WalkStop::NoControl,
        }
        if let Err(e) = session.click(&adapter.next_control_selector()) {
            warn!("carousel click {} failed, keeping collected slides: {:#}", clicks + 1, e);
            break WalkStop::Interrupted;
        }
        clicks += 1;
        thread::sleep(options.click_delay);

        let found = match collect(session, adapter) {
            Ok(f) => f,
            Err(e) => {
                warn!("collection after click {} failed: {}", clicks, e);
                break WalkStop::Interrupted;
            }
        };
        let added = merge_new(&mut banners, &mut seen, found);
        if added == 0 {
            stable += 1;
            if stable >= options.stable_rounds {
                break WalkStop::Stable;
            }
        } else {
            debug!("click {} revealed {} new banners", clicks, added);
            stable = 0;
        }
    };

    debug!(
        "carousel walk stopped ({:?}) after {} clicks with {} banners",
        stop,
        clicks,
        banners.len()
    );
    WalkOutcome {
        banners,
        clicks,
        stop,
    }
}

fn locate_next(session: &dyn BrowserSession, adapter: &dyn SiteAdapter) -> Option<NextControl> {
    let raw = match session.evaluate(&adapter.locate_next_script()) {
        Ok(r) => r,
        Err(e) => {
            debug!("could not look for a next control: {:#}", e);
            return None;
        }
    };
    match serde_json::from_str::<NextControl>(&raw) {
        Ok(n) => Some(n),
        Err(e) => {
            debug!("unexpected next control answer {:?}: {}", raw, e);
            None
        }
    }
}

/// Appends banners whose base URL has not been seen yet; returns how many.
pub fn merge_new(
    banners: &mut Vec<RawBanner>,
    seen: &mut HashSet<String>,
    found: Vec<RawBanner>,
) -> usize {
    let before = banners.len();
    for b in found {
        if seen.insert(strip_query(&b.src)) {
            banners.push(b);
        }
    }
    banners.len() - before
}
