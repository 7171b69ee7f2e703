use std::error::Error;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{
    dal::{business_db, diagnostic_db, progress_db},
    domain::listing::BusinessListing,
};

use super::PageDiagnostics;

#[derive(Debug)]
pub enum PersistantData {
    Listing(BusinessListing),
    Progress { search_term: String },
    Diagnostics(DiagnosticSnapshot),
}

#[derive(Debug)]
pub struct DiagnosticSnapshot {
    pub label: String,
    pub page: PageDiagnostics,
    pub captured_at: DateTime<Utc>,
}

/// Hands page diagnostics to the persistence handler.
#[derive(Clone)]
pub struct DiagnosticsSink {
    pub sender: UnboundedSender<PersistantData>,
}

impl DiagnosticsSink {
    pub fn record(&self, label: &str, page: PageDiagnostics) {
        log::info!(
            "Captured '{}' diagnostics | title: {:?} | url: {} | screenshot: {} bytes",
            label,
            page.title,
            page.url,
            page.screenshot.len()
        );

        if let Err(e) = self
            .sender
            .send(PersistantData::Diagnostics(DiagnosticSnapshot {
                label: label.to_string(),
                page,
                captured_at: Utc::now(),
            }))
        {
            log::error!(
                "Persistant data sender channel got an Error: {:?} | Source: {:?}",
                e,
                e.source(),
            );
        }
    }
}

pub async fn data_persistance_handler(
    mut data_receiver: UnboundedReceiver<PersistantData>,
    pool: PgPool,
) {
    log::info!("Started data persistance handler");

    while let Some(data) = data_receiver.recv().await {
        log::debug!(
            "Data persistance handler has {} elements",
            data_receiver.len()
        );

        match data {
            PersistantData::Listing(listing) => {
                match business_db::insert_listing(&pool, &listing).await {
                    Ok(res) if res.rows_affected() == 0 => log::warn!(
                        "Listing already stored for '{}': {}",
                        listing.search_term,
                        listing.source_url
                    ),
                    Ok(_) => {}
                    Err(e) => log::error!("Error inserting listing in db: {:?}", e),
                }
            }
            PersistantData::Progress { search_term } => {
                if let Err(e) = progress_db::increment(&pool, &search_term).await {
                    log::error!(
                        "Error incrementing progress for '{}' in db: {:?}",
                        search_term,
                        e
                    );
                }
            }
            PersistantData::Diagnostics(snapshot) => {
                if let Err(e) = diagnostic_db::insert_snapshot(&pool, &snapshot).await {
                    log::error!("Error inserting diagnostic snapshot in db: {:?}", e);
                }
            }
        }
    }

    log::info!("Data persistance handler stopped, all senders dropped");
}
