use std::{ops::Deref, sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use thirtyfour::{
    prelude::*, CapabilitiesHelper, ChromiumLikeCapabilities, DesiredCapabilities, Proxy,
    WebDriver,
};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::configuration::{CrawlerSettings, WebDriverSettings};

use super::{Page, PageDiagnostics};

const BROWSER_ARGS: [&str; 4] = [
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--window-size=1920,1080",
];

const CONSENT_BUTTONS: [&str; 7] = [
    r#"//button[contains(., "Accept all")]"#,
    r#"//button[contains(., "I agree")]"#,
    r#"//button[contains(., "Accept")]"#,
    r#"//button[contains(., "Reject all")]"#,
    r#"//button[contains(translate(@aria-label, "ACEPT", "acept"), "accept")]"#,
    r#"//button[@jsname="higCR"]"#,
    r#"//form[contains(@action, "consent")]//button"#,
];

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const CONSENT_SETTLE: Duration = Duration::from_secs(2);

const SCROLL_SCRIPT: &str = r#"
    const el = document.querySelector(arguments[0]);
    if (el) { el.scrollBy(0, el.clientHeight); }
"#;

/// One WebDriver session.
pub struct Droid {
    pub id: Uuid,
    pub driver: WebDriver,
    uses: u32,
}

impl Droid {
    pub async fn new(
        settings: &WebDriverSettings,
        navigation_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in BROWSER_ARGS {
            caps.add_arg(arg)?;
        }
        if settings.headless {
            caps.add_arg("--headless=new")?;
        }
        if let Some(proxy) = &settings.proxy {
            caps.set_proxy(Proxy::Manual {
                ftp_proxy: None,
                http_proxy: Some(proxy.clone()),
                ssl_proxy: Some(proxy.clone()),
                socks_proxy: None,
                socks_version: None,
                socks_username: None,
                socks_password: None,
                no_proxy: None,
            })?;
        }

        let driver = WebDriver::new(&settings.url, caps).await?;
        driver.set_page_load_timeout(navigation_timeout).await?;

        let id = Uuid::new_v4();
        log::info!("Started browser session {}", id);

        Ok(Droid {
            id,
            driver,
            uses: 0,
        })
    }

    pub async fn quit(self) {
        if let Err(e) = self.driver.quit().await {
            log::error!("Failed to close browser session {}: {:?}", self.id, e);
        }
    }
}

#[async_trait]
impl Page for Droid {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn wait_until_settled(&self, timeout: Duration) -> anyhow::Result<()> {
        let poll = async {
            loop {
                let ret = self
                    .driver
                    .execute("return document.readyState;", vec![])
                    .await?;
                if ret.json().as_str() == Some("complete") {
                    return anyhow::Ok(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| anyhow!("page did not settle within {:?}", timeout))?
    }

    async fn dismiss_consent(&self) -> bool {
        for xpath in CONSENT_BUTTONS {
            let Ok(button) = self.driver.find(By::XPath(xpath)).await else {
                continue;
            };
            if !button.is_displayed().await.unwrap_or(false) {
                continue;
            }
            match button.click().await {
                Ok(_) => {
                    log::info!("Clicked cookie consent button: {}", xpath);
                    tokio::time::sleep(CONSENT_SETTLE).await;
                    return true;
                }
                Err(e) => log::debug!("Consent button {} failed: {:?}", xpath, e),
            }
        }
        false
    }

    async fn wait_for_selector(&self, selector: &'static str, timeout: Duration) -> bool {
        self.driver
            .query(By::Css(selector))
            .wait(timeout, POLL_INTERVAL)
            .first()
            .await
            .is_ok()
    }

    async fn content(&self) -> anyhow::Result<String> {
        Ok(self.driver.source().await?)
    }

    async fn scroll_by_viewport(&self, selector: &str) -> anyhow::Result<()> {
        self.driver
            .execute(SCROLL_SCRIPT, vec![serde_json::json!(selector)])
            .await?;
        Ok(())
    }

    async fn diagnostics(&self) -> PageDiagnostics {
        PageDiagnostics {
            title: self.driver.title().await.unwrap_or_default(),
            url: self
                .driver
                .current_url()
                .await
                .map(|url| url.to_string())
                .unwrap_or_default(),
            screenshot: self.driver.screenshot_as_png().await.unwrap_or_default(),
        }
    }
}

/// A borrowed session. Hand it back with `DroidPool::release`.
pub struct DroidLease {
    droid: Droid,
    _permit: OwnedSemaphorePermit,
}

impl Deref for DroidLease {
    type Target = Droid;

    fn deref(&self) -> &Self::Target {
        &self.droid
    }
}

/// Bounded set of browser sessions shared by the list and detail handlers.
pub struct DroidPool {
    webdriver: WebDriverSettings,
    crawler: CrawlerSettings,
    idle: Mutex<Vec<Droid>>,
    permits: Arc<Semaphore>,
}

impl DroidPool {
    pub fn new(webdriver: WebDriverSettings, crawler: CrawlerSettings) -> Self {
        let permits = Arc::new(Semaphore::new(crawler.max_concurrency.max(1)));
        DroidPool {
            webdriver,
            crawler,
            idle: Mutex::new(vec![]),
            permits,
        }
    }

    /// Starts `min_concurrency` sessions up front.
    pub async fn warm_up(&self) {
        let wanted = self.crawler.min_concurrency.min(self.crawler.max_concurrency);
        for _ in 0..wanted {
            match Droid::new(&self.webdriver, self.crawler.navigation_timeout()).await {
                Ok(droid) => self.idle.lock().await.push(droid),
                Err(e) => log::error!("Failed to start browser session: {:?}", e),
            }
        }
        log::info!("Browser pool warmed up with {} sessions", self.idle.lock().await.len());
    }

    pub async fn acquire(&self) -> anyhow::Result<DroidLease> {
        let permit = self.permits.clone().acquire_owned().await?;
        let idle = self.idle.lock().await.pop();
        let droid = match idle {
            Some(droid) => droid,
            None => Droid::new(&self.webdriver, self.crawler.navigation_timeout()).await?,
        };

        Ok(DroidLease {
            droid,
            _permit: permit,
        })
    }

    /// Returns a session to the pool, or retires it when it failed a request
    /// or has been used `max_usage_count` times.
    pub async fn release(&self, lease: DroidLease, healthy: bool) {
        let DroidLease { mut droid, _permit } = lease;
        droid.uses += 1;

        if healthy && droid.uses < self.crawler.max_usage_count {
            self.idle.lock().await.push(droid);
        } else {
            log::info!(
                "Retiring browser session {} after {} uses (healthy: {})",
                droid.id,
                droid.uses,
                healthy
            );
            droid.quit().await;
        }
    }
}
