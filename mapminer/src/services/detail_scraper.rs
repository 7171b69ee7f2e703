use std::{collections::HashSet, sync::Arc};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{
    domain::{business::BusinessRecord, search_task::SearchTask},
    error::ScrapeError,
};

use super::{
    enrich, next_attempt, requeue_later, within_handler_timeout, CrawlContext, Emission,
    EnrichOptions, Page, RecordSink,
};

const SET_RESET_LEN: usize = 50_000;

pub struct DetailRequest {
    pub task: Arc<SearchTask>,
    pub record: BusinessRecord,
    pub retry_count: u8,
}

impl DetailRequest {
    pub fn new(task: Arc<SearchTask>, record: BusinessRecord) -> Self {
        DetailRequest {
            task,
            record,
            retry_count: 0,
        }
    }
}

pub async fn detail_scraper_handler(
    mut detail_receiver: UnboundedReceiver<DetailRequest>,
    detail_sender: UnboundedSender<DetailRequest>,
    context: Arc<CrawlContext>,
) {
    log::info!("Started detail scraper handler");
    let mut seen_requests: HashSet<(String, String)> = HashSet::new();

    while let Some(request) = detail_receiver.recv().await {
        if request.retry_count == 0 {
            if seen_requests.len() > SET_RESET_LEN {
                seen_requests.clear();
            }
            let key = (request.task.term.clone(), request.record.identity_key.clone());
            if !seen_requests.insert(key) {
                log::debug!(
                    "Detail view for {} already requested, skipping",
                    request.record.identity_key
                );
                continue;
            }
        }

        tokio::spawn(scrape_detail(request, detail_sender.clone(), context.clone()));
    }
}

async fn scrape_detail(
    request: DetailRequest,
    detail_sender: UnboundedSender<DetailRequest>,
    context: Arc<CrawlContext>,
) {
    if request.task.is_finished() {
        log::debug!(
            "Target reached for '{}', dropping detail view of {}",
            request.task.term,
            request.record.name
        );
        return;
    }

    let droid = match context.droids.acquire().await {
        Ok(droid) => droid,
        Err(e) => {
            log::error!(
                "Could not get a browser session for {}: {:?}",
                request.record.name,
                e
            );
            navigation_failed(
                request,
                context.crawler.max_request_retries,
                detail_sender,
                &context.sink,
            );
            return;
        }
    };

    let DetailRequest {
        task,
        record,
        retry_count,
    } = request;
    let visit = within_handler_timeout(
        context.crawler.request_handler_timeout(),
        visit_detail(&*droid, record.clone(), &context.enrich_options()),
    )
    .await;
    context.droids.release(droid, visit.is_ok()).await;

    match visit {
        Ok(enriched) => {
            let emission = context.sink.emit(&task, enriched);
            log::debug!("Detail view for '{}' finished: {:?}", task.term, emission);
        }
        Err(e) => {
            log::error!("Detail view of {} failed: {}", record.name, e);
            navigation_failed(
                DetailRequest {
                    task,
                    record,
                    retry_count,
                },
                context.crawler.max_request_retries,
                detail_sender,
                &context.sink,
            );
        }
    }
}

/// Opens the place page and fills what it shows. Only navigation can fail.
pub async fn visit_detail<P: Page + ?Sized>(
    page: &P,
    record: BusinessRecord,
    options: &EnrichOptions,
) -> Result<BusinessRecord, ScrapeError> {
    page.goto(&record.identity_key).await?;
    Ok(enrich(page, record, options).await)
}

/// Retries the request, or emits the partial record once retries run out.
pub fn navigation_failed(
    request: DetailRequest,
    max_retries: u8,
    detail_sender: UnboundedSender<DetailRequest>,
    sink: &RecordSink,
) -> Option<Emission> {
    match next_attempt(request.retry_count, max_retries) {
        Some(retry_count) => {
            requeue_later(
                detail_sender,
                DetailRequest {
                    retry_count,
                    ..request
                },
                retry_count,
            );
            None
        }
        None => {
            log::warn!(
                "Detail view of {} unreachable after {} retries, emitting partial record",
                request.record.name,
                request.retry_count
            );
            Some(sink.emit(&request.task, request.record))
        }
    }
}
