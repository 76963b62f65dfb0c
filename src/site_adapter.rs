//! Everything that knows about the third-party menu markup lives here.
//!
//! The embedded menu is rendered client side and its class names change without
//! notice, so the rest of the pipeline only talks to a [`SiteAdapter`]: which
//! images are banners, what wraps them as a link and which element advances the
//! carousel. A markup change on the target should only ever need a new adapter.

use serde::Deserialize;

/// Attribute used to tag the next control found by [`SiteAdapter::locate_next_script`]
/// so it can be clicked with a plain selector afterwards.
pub const NEXT_CONTROL_MARKER: &str = "data-banner-scraper-next";

/// Answer of the next-control script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NextControl {
    pub found: bool,
    pub visible: bool,
}

pub trait SiteAdapter: Send + Sync {
    /// Selector of the banner images; also the marker waited on after navigation.
    fn image_selector(&self) -> &str;

    /// Selector of the element wrapping a banner when it links somewhere.
    fn link_selector(&self) -> &str {
        "a[href]"
    }

    /// Candidate selectors for the carousel "next" control, most specific first.
    fn next_control_selectors(&self) -> Vec<String>;

    /// Script returning a JSON string array of raw banners currently rendered.
    fn collect_script(&self) -> String {
        format!(
            r#"(() => {{
                const out = [];
                document.querySelectorAll({images}).forEach((img) => {{
                    if (img.getClientRects().length === 0) return;
                    const src = img.currentSrc || img.src || img.getAttribute('data-src') || '';
                    if (!src) return;
                    const anchor = img.closest({link});
                    out.push({{
                        src: src,
                        srcset: img.getAttribute('srcset'),
                        alt: img.getAttribute('alt') || '',
                        link: anchor ? anchor.href : null,
                        width: img.naturalWidth || 0,
                        height: img.naturalHeight || 0,
                    }});
                }});
                return JSON.stringify(out);
            }})()"#,
            images = js_string(self.image_selector()),
            link = js_string(self.link_selector()),
        )
    }

    /// Script tagging the first matching next control with [`NEXT_CONTROL_MARKER`]
    /// and returning a JSON string `{found, visible}`.
    fn locate_next_script(&self) -> String {
        let candidates = serde_json::to_string(&self.next_control_selectors())
            .unwrap_or_else(|_| "[]".into());
        format!(
            r#"(() => {{
                document.querySelectorAll('[{marker}]').forEach((el) => el.removeAttribute('{marker}'));
                const candidates = {candidates};
                for (const selector of candidates) {{
                    let el = null;
                    try {{ el = document.querySelector(selector); }} catch (e) {{ continue; }}
                    if (!el) continue;
                    el.setAttribute('{marker}', '1');
                    const rect = el.getBoundingClientRect();
                    const style = window.getComputedStyle(el);
                    const visible = rect.width > 0 && rect.height > 0
                        && style.display !== 'none'
                        && style.visibility !== 'hidden'
                        && parseFloat(style.opacity || '1') > 0;
                    return JSON.stringify({{ found: true, visible: visible }});
                }}
                return JSON.stringify({{ found: false, visible: false }});
            }})()"#,
            marker = NEXT_CONTROL_MARKER,
            candidates = candidates,
        )
    }

    /// Selector matching the control tagged by the last locate script run.
    fn next_control_selector(&self) -> String {
        format!("[{}]", NEXT_CONTROL_MARKER)
    }
}

/// Adapter for the embedded menu widget. Heuristics are plain data so they
/// can be swapped without touching the pipeline.
#[derive(Debug, Clone)]
pub struct MenuSiteAdapter {
    image_selector: String,
    link_selector: String,
    next_selectors: Vec<String>,
}

impl Default for MenuSiteAdapter {
    fn default() -> Self {
        MenuSiteAdapter {
            image_selector: [
                ".swiper-slide img",
                ".slick-slide img",
                "[class*='carousel'] img",
                "[class*='banner'] img",
                "[class*='promo'] img",
            ]
            .join(", "),
            link_selector: "a[href]".into(),
            next_selectors: [
                ".swiper-button-next",
                ".slick-next",
                "[class*='carousel'] button[aria-label*='next' i]",
                "button[aria-label*='next' i]",
                "[class*='carousel'] [class*='next']",
                "[class*='banner'] [class*='next']",
                "[class*='arrow'][class*='right']",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl MenuSiteAdapter {
    pub fn new(image_selector: &str, link_selector: &str, next_selectors: Vec<String>) -> Self {
        MenuSiteAdapter {
            image_selector: image_selector.into(),
            link_selector: link_selector.into(),
            next_selectors,
        }
    }
}

impl SiteAdapter for MenuSiteAdapter {
    fn image_selector(&self) -> &str {
        &self.image_selector
    }

    fn link_selector(&self) -> &str {
        &self.link_selector
    }

    fn next_control_selectors(&self) -> Vec<String> {
        self.next_selectors.clone()
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "''".into())
}
