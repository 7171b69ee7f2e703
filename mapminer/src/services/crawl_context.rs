use crate::configuration::{CrawlerSettings, ScrapeSettings};

use super::{DiagnosticsSink, DroidPool, EnrichOptions, ExtractOptions, RecordSink};

/// Everything a list or detail unit needs besides its request.
pub struct CrawlContext {
    pub droids: DroidPool,
    pub scrape: ScrapeSettings,
    pub crawler: CrawlerSettings,
    pub sink: RecordSink,
    pub diagnostics: DiagnosticsSink,
}

impl CrawlContext {
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::new(&self.scrape, &self.crawler)
    }

    pub fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions {
            dom_timeout: self.crawler.network_idle_timeout(),
            settle_delay: self.scrape.detail_settle_delay(),
        }
    }
}
