use anyhow::{anyhow, Context, Result};
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::FailRequest;
use headless_chrome::protocol::cdp::Network::ErrorReason;
use headless_chrome::types::Bounds;
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::types::{ScrapeError, ViewportProfile};
use crate::utils::is_decorative_asset;

/// One live browser page. Every call blocks the current thread.
pub trait BrowserSession {
    fn apply_profile(&self, profile: &ViewportProfile) -> Result<()>;
    /// Aborts font and stylesheet requests from now on.
    fn block_decorative_requests(&self) -> Result<()>;
    fn navigate(&self, url: &str, timeout: Duration) -> std::result::Result<(), ScrapeError>;
    fn wait_for(&self, selector: &str, timeout: Duration) -> std::result::Result<(), ScrapeError>;
    /// Evaluates a script whose completion value is a string.
    fn evaluate(&self, script: &str) -> Result<String>;
    fn click(&self, selector: &str) -> Result<()>;
    /// Releases the browser. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

pub trait SessionLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession + Send>>;
}

/// Owns a session for the length of one scrape attempt and closes it on every
/// exit path, including unwinding.
pub struct SessionGuard {
    session: Box<dyn BrowserSession + Send>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession + Send>) -> Self {
        SessionGuard { session }
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession + Send;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        debug!("closing browser session...");
        if let Err(e) = self.session.close() {
            warn!("browser session did not close cleanly: {:#}", e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
    idle_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        ChromeLauncher {
            chrome_path,
            idle_timeout: Duration::from_secs(120),
        }
    }
}

impl SessionLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession + Send>> {
        let path = match &self.chrome_path {
            Some(p) => p.clone(),
            None => default_executable()
                .map_err(|e| anyhow!("could not find a chrome binary: {}", e))?,
        };
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(self.idle_timeout)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| anyhow!("invalid browser launch options: {}", e))?;
        let browser = Browser::new(options).context("browser launching error")?;
        let tab = browser.new_tab().context("could not create new tab")?;

        debug!("browser launched with pid {:?}", browser.get_process_id());
        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab: Some(tab),
        }))
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl ChromeSession {
    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab.as_ref().context("browser session already closed")
    }

    fn kill(pid: u32) -> bool {
        let mut s = System::new();
        let pid = Pid::from_u32(pid);
        if !s.refresh_process(pid) {
            return false;
        }
        if let Some(process) = s.process(pid) {
            debug!("killing leftover browser process with id {}", pid);
            return process.kill();
        }
        false
    }
}

impl BrowserSession for ChromeSession {
    fn apply_profile(&self, profile: &ViewportProfile) -> Result<()> {
        let tab = self.tab()?;
        tab.set_user_agent(&profile.user_agent, None, None)
            .context(format!("could not set {} user agent", profile.name))?;
        tab.set_bounds(Bounds::Normal {
            left: Some(0),
            top: Some(0),
            width: Some(profile.width as f64),
            height: Some(profile.height as f64),
        })
        .context(format!(
            "could not resize window to {}x{}",
            profile.width, profile.height
        ))?;
        Ok(())
    }

    fn block_decorative_requests(&self) -> Result<()> {
        let tab = self.tab()?;
        tab.enable_fetch(None, None)
            .context("could not enable request interception")?;
        tab.enable_request_interception(Arc::new(
            |_transport: Arc<Transport>, _session_id: SessionId, intercepted: RequestPausedEvent| {
                if is_decorative_asset(&intercepted.params.request.url) {
                    RequestPausedDecision::Fail(FailRequest {
                        request_id: intercepted.params.request_id,
                        error_reason: ErrorReason::BlockedByClient,
                    })
                } else {
                    RequestPausedDecision::Continue(None)
                }
            },
        ))
        .context("could not install request interceptor")?;
        Ok(())
    }

    fn navigate(&self, url: &str, timeout: Duration) -> std::result::Result<(), ScrapeError> {
        let tab = self.tab()?;
        tab.set_default_timeout(timeout);
        tab.navigate_to(url)
            .map_err(|e| ScrapeError::NavigationTimeout(format!("{}: {}", url, e)))?;
        tab.wait_until_navigated()
            .map_err(|e| ScrapeError::NavigationTimeout(format!("{}: {}", url, e)))?;
        Ok(())
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> std::result::Result<(), ScrapeError> {
        let tab = self.tab()?;
        match tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!("waiting for {} failed: {}", selector, e);
                Err(ScrapeError::ContentNotFound(selector.into()))
            }
        }
    }

    fn evaluate(&self, script: &str) -> Result<String> {
        let tab = self.tab()?;
        let remote = tab.evaluate(script, false).context("script evaluation failed")?;
        match remote.value {
            Some(serde_json::Value::String(s)) => Ok(s),
            other => Err(anyhow!("script returned {:?} instead of a string", other)),
        }
    }

    fn click(&self, selector: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.find_element(selector)
            .context(format!("could not find {}", selector))?
            .click()
            .context(format!("could not click {}", selector))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // taken first so a failed close is never retried
        let tab = self.tab.take();
        let browser = match self.browser.take() {
            Some(b) => b,
            None => return Ok(()),
        };
        let pid = browser.get_process_id();
        drop(tab);
        drop(browser);
        if let Some(pid) = pid {
            if Self::kill(pid) {
                warn!("browser process {} survived shutdown and was killed", pid);
            }
        }
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            debug!("killing browser process...");
            if let Err(e) = self.close() {
                warn!("could not close browser: {:#}", e);
            }
        }
    }
}
