use std::time::Duration;

use async_trait::async_trait;

/// What we keep about a page when something goes wrong on it.
#[derive(Debug, Clone, Default)]
pub struct PageDiagnostics {
    pub title: String,
    pub url: String,
    pub screenshot: Vec<u8>,
}

/// The slice of a browser tab the extractors need.
///
/// DOM reads go through `content`, which returns a snapshot of the rendered
/// document. Parsing happens on our side so the extraction strategies stay
/// plain functions over HTML.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> anyhow::Result<()>;

    /// Waits until the document reports it finished loading.
    async fn wait_until_settled(&self, timeout: Duration) -> anyhow::Result<()>;

    /// Clicks away a cookie consent dialog if one is showing.
    async fn dismiss_consent(&self) -> bool;

    /// Waits up to `timeout` for `selector` to match an element.
    async fn wait_for_selector(&self, selector: &'static str, timeout: Duration) -> bool;

    async fn content(&self) -> anyhow::Result<String>;

    /// Scrolls the first element matching `selector` down by its own height.
    async fn scroll_by_viewport(&self, selector: &str) -> anyhow::Result<()>;

    async fn diagnostics(&self) -> PageDiagnostics;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::{Page, PageDiagnostics};

    /// Serves one scripted snapshot per `content` call, repeating the last.
    pub struct FakePage {
        snapshots: Mutex<VecDeque<String>>,
        containers: Vec<&'static str>,
        fail_content: bool,
        fail_goto: bool,
        fail_scroll: bool,
        pub scrolls: AtomicUsize,
        pub content_calls: AtomicUsize,
    }

    impl FakePage {
        pub fn new(snapshots: Vec<String>) -> Self {
            FakePage {
                snapshots: Mutex::new(snapshots.into()),
                containers: vec![r#"div[role="feed"]"#],
                fail_content: false,
                fail_goto: false,
                fail_scroll: false,
                scrolls: AtomicUsize::new(0),
                content_calls: AtomicUsize::new(0),
            }
        }

        pub fn without_container(mut self) -> Self {
            self.containers.clear();
            self
        }

        pub fn failing(mut self) -> Self {
            self.fail_content = true;
            self
        }

        pub fn failing_navigation(mut self) -> Self {
            self.fail_goto = true;
            self
        }

        pub fn failing_scroll(mut self) -> Self {
            self.fail_scroll = true;
            self
        }

        pub fn scroll_count(&self) -> usize {
            self.scrolls.load(Ordering::SeqCst)
        }

        pub fn content_count(&self) -> usize {
            self.content_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Page for FakePage {
        async fn goto(&self, url: &str) -> anyhow::Result<()> {
            if self.fail_goto {
                return Err(anyhow!("net::ERR_TIMED_OUT at {}", url));
            }
            Ok(())
        }

        async fn wait_until_settled(&self, _timeout: Duration) -> anyhow::Result<()> {
            Ok(())
        }

        async fn dismiss_consent(&self) -> bool {
            false
        }

        async fn wait_for_selector(&self, selector: &'static str, _timeout: Duration) -> bool {
            self.containers.contains(&selector)
        }

        async fn content(&self) -> anyhow::Result<String> {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_content {
                return Err(anyhow!("target window already closed"));
            }
            let mut snapshots = self.snapshots.lock().unwrap();
            match snapshots.len() {
                0 => Ok("<html><body></body></html>".to_string()),
                1 => Ok(snapshots[0].clone()),
                _ => Ok(snapshots.pop_front().unwrap()),
            }
        }

        async fn scroll_by_viewport(&self, _selector: &str) -> anyhow::Result<()> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            if self.fail_scroll {
                return Err(anyhow!("javascript error: el is null"));
            }
            Ok(())
        }

        async fn diagnostics(&self) -> PageDiagnostics {
            PageDiagnostics {
                title: "Google Maps".to_string(),
                url: "https://www.google.com/maps/search/test".to_string(),
                screenshot: vec![0x89, 0x50, 0x4e, 0x47],
            }
        }
    }
}
