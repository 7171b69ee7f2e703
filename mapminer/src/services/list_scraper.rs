use std::{error::Error, sync::Arc, time::Duration};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{
    domain::{business::BusinessRecord, completeness::Route, search_task::SearchTask},
    error::ScrapeError,
};

use super::{
    extract_listings, next_attempt, requeue_later, within_handler_timeout, CrawlContext,
    DetailRequest, DiagnosticsSink, Emission, ExtractOptions, ExtractionOutcome, Page, RecordSink,
};

pub struct ListRequest {
    pub task: Arc<SearchTask>,
    pub retry_count: u8,
}

impl ListRequest {
    pub fn new(task: Arc<SearchTask>) -> Self {
        ListRequest {
            task,
            retry_count: 0,
        }
    }
}

pub struct ListRequestSender {
    pub sender: UnboundedSender<ListRequest>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub emitted: u32,
    pub enqueued: u32,
    pub skipped: u32,
}

pub async fn list_scraper_handler(
    mut list_receiver: UnboundedReceiver<ListRequest>,
    list_sender: UnboundedSender<ListRequest>,
    detail_sender: UnboundedSender<DetailRequest>,
    context: Arc<CrawlContext>,
) {
    log::info!("Started list scraper handler");

    while let Some(request) = list_receiver.recv().await {
        tokio::spawn(scrape_search_term(
            request,
            list_sender.clone(),
            detail_sender.clone(),
            context.clone(),
        ));
    }
}

async fn scrape_search_term(
    request: ListRequest,
    list_sender: UnboundedSender<ListRequest>,
    detail_sender: UnboundedSender<DetailRequest>,
    context: Arc<CrawlContext>,
) {
    let task = request.task.clone();
    if task.is_finished() {
        log::info!("'{}' already has {} records, skipping", task.term, task.target);
        return;
    }

    log::info!(
        "Scraping list for '{}' (attempt {})",
        task.term,
        request.retry_count + 1
    );

    let result = match context.droids.acquire().await {
        Ok(droid) => {
            let result = within_handler_timeout(
                context.crawler.request_handler_timeout(),
                run_list_pass(
                    &*droid,
                    &task,
                    context.scrape.settle_delay(),
                    context.crawler.network_idle_timeout(),
                    &context.extract_options(),
                    &context.diagnostics,
                ),
            )
            .await;
            context.droids.release(droid, result.is_ok()).await;
            result
        }
        Err(e) => Err(ScrapeError::Browser(e)),
    };

    match result {
        Ok(outcome) => {
            let summary = dispatch_candidates(&task, outcome.records, &context.sink, &detail_sender);
            log::info!(
                "List pass for '{}' done after {} rounds ({:?}): {} emitted, {} sent to detail view, {} skipped",
                task.term,
                outcome.rounds,
                outcome.stop_reason,
                summary.emitted,
                summary.enqueued,
                summary.skipped
            );
        }
        Err(e) => {
            list_pass_failed(
                request,
                &e,
                context.crawler.max_request_retries,
                list_sender,
            );
        }
    }
}

/// Requeues a failed list pass, or abandons the term once retries run out.
/// Returns the retry count the request was requeued with.
pub fn list_pass_failed(
    request: ListRequest,
    error: &ScrapeError,
    max_retries: u8,
    list_sender: UnboundedSender<ListRequest>,
) -> Option<u8> {
    match next_attempt(request.retry_count, max_retries) {
        Some(retry_count) => {
            log::error!(
                "List pass for '{}' failed, will retry: {}",
                request.task.term,
                error
            );
            requeue_later(
                list_sender,
                ListRequest {
                    retry_count,
                    ..request
                },
                retry_count,
            );
            Some(retry_count)
        }
        None => {
            log::error!(
                "List pass for '{}' failed after {} retries, giving up: {}",
                request.task.term,
                request.retry_count,
                error
            );
            None
        }
    }
}

/// Opens the search page for `task` and collects candidates from its feed.
pub async fn run_list_pass<P: Page + ?Sized>(
    page: &P,
    task: &SearchTask,
    settle_delay: Duration,
    network_idle_timeout: Duration,
    options: &ExtractOptions,
    diagnostics: &DiagnosticsSink,
) -> Result<ExtractionOutcome, ScrapeError> {
    let search_url = task.search_url();
    page.goto(search_url.as_str()).await?;

    if let Err(e) = page.wait_until_settled(network_idle_timeout).await {
        log::warn!("Search page for '{}' did not settle: {:?}", task.term, e);
    }
    if page.dismiss_consent().await {
        log::info!("Dismissed consent dialog for '{}'", task.term);
    }
    tokio::time::sleep(settle_delay).await;

    extract_listings(page, &search_url, task.target, options, diagnostics).await
}

/// Emits complete candidates and sends the rest to the detail view.
pub fn dispatch_candidates(
    task: &Arc<SearchTask>,
    records: Vec<BusinessRecord>,
    sink: &RecordSink,
    detail_sender: &UnboundedSender<DetailRequest>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    for record in records {
        if task.is_finished() {
            break;
        }
        if task.was_emitted_before(&record.identity_key) {
            log::debug!("{} was stored by an earlier run, skipping", record.identity_key);
            summary.skipped += 1;
            continue;
        }

        match task.requirements.route(record) {
            Route::Emit(record) => {
                if let Emission::Emitted(_) = sink.emit(task, record) {
                    summary.emitted += 1;
                }
            }
            Route::Enrich(record) => {
                log::debug!("{} is missing required fields, queueing detail view", record.name);
                match detail_sender.send(DetailRequest::new(task.clone(), record)) {
                    Ok(_) => summary.enqueued += 1,
                    Err(e) => log::error!(
                        "Detail request sender channel got an Error: {:?} | Source: {:?}",
                        e,
                        e.source(),
                    ),
                }
            }
        }
    }

    summary
}
