use std::{collections::HashMap, error::Error, sync::Arc};

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{mpsc::UnboundedSender, Mutex};

use crate::{
    dal::{business_db, progress_db},
    domain::{completeness::Requirements, search_task::SearchTask},
};

use super::ListRequest;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub search_term: String,
    pub target_count: u32,
    pub emitted_count: u32,
}

/// Every search task this process knows about, keyed by term.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Arc<SearchTask>>>,
}

impl TaskRegistry {
    /// Adds `task` unless its term is already registered.
    pub async fn register(&self, task: Arc<SearchTask>) -> bool {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task.term) {
            return false;
        }
        tasks.insert(task.term.clone(), task);
        true
    }

    pub async fn contains(&self, term: &str) -> bool {
        self.tasks.lock().await.contains_key(term)
    }

    pub async fn progress(&self) -> Vec<TaskProgress> {
        let tasks = self.tasks.lock().await;
        let mut progress: Vec<TaskProgress> = tasks
            .values()
            .map(|task| TaskProgress {
                search_term: task.term.clone(),
                target_count: task.target,
                emitted_count: task.emitted(),
            })
            .collect();
        progress.sort_by(|a, b| a.search_term.cmp(&b.search_term));
        progress
    }
}

/// Builds the task for `term`, continuing from what an earlier run persisted.
pub async fn resume_task(
    pool: &PgPool,
    term: &str,
    target: u32,
    requirements: Requirements,
) -> Result<SearchTask, sqlx::Error> {
    let emitted = progress_db::get_or_init(pool, term).await?;
    let prior_keys = business_db::get_source_urls_for_term(pool, term)
        .await?
        .into_iter()
        .collect();

    Ok(SearchTask::resume(
        term,
        target,
        requirements,
        emitted.max(0) as u32,
        prior_keys,
    ))
}

/// Trims, drops blanks and duplicates, keeps first-seen order.
pub fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = vec![];
    for term in terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !normalized.iter().any(|t| t == term) {
            normalized.push(term.to_string());
        }
    }
    normalized
}

/// Registers each term and queues its list pass. Returns the terms queued.
pub async fn register_search_terms(
    pool: &PgPool,
    registry: &TaskRegistry,
    list_sender: &UnboundedSender<ListRequest>,
    terms: &[String],
    target: u32,
    requirements: Requirements,
) -> Vec<String> {
    let mut queued = vec![];

    for term in normalize_terms(terms) {
        if registry.contains(&term).await {
            log::info!("'{}' is already registered, skipping", term);
            continue;
        }

        let task = match resume_task(pool, &term, target, requirements).await {
            Ok(task) => Arc::new(task),
            Err(e) => {
                log::error!("Failed to load progress for '{}' from db: {:?}", term, e);
                continue;
            }
        };

        if !registry.register(task.clone()).await {
            continue;
        }
        if task.is_finished() {
            log::info!(
                "'{}' already has {}/{} records from an earlier run",
                term,
                task.emitted(),
                task.target
            );
            continue;
        }

        log::info!(
            "Registered '{}' with target {} ({} already emitted)",
            term,
            task.target,
            task.emitted()
        );
        match list_sender.send(ListRequest::new(task)) {
            Ok(_) => queued.push(term),
            Err(e) => log::error!(
                "List request sender channel got an Error: {:?} | Source: {:?}",
                e,
                e.source(),
            ),
        }
    }

    queued
}
