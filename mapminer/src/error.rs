use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Results feed not found on {url} (title: {title:?}), tried selectors: {tried}")]
    ExtractionUnavailable {
        url: String,
        title: String,
        tried: String,
    },

    #[error("Enrichment failed for {identity_key}: {source}")]
    Enrichment {
        identity_key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Request handler timed out after {0:?}")]
    Timeout(Duration),

    #[error("Browser session error: {0}")]
    Browser(#[from] anyhow::Error),
}
