use std::{
    collections::HashSet,
    sync::atomic::{AtomicU32, Ordering},
};

use url::Url;

use super::completeness::Requirements;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

/// One search term and its progress towards `target`.
///
/// `emitted` only moves through `try_accept`, so the list pass and every
/// detail visit spawned from it share one serialization point per term.
#[derive(Debug)]
pub struct SearchTask {
    pub term: String,
    pub target: u32,
    pub requirements: Requirements,
    emitted: AtomicU32,
    /// Identity keys already persisted for this term by an earlier run.
    prior_keys: HashSet<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Acceptance {
    /// Carries the emitted count including this record.
    Accepted(u32),
    Rejected,
}

impl SearchTask {
    pub fn new(term: impl Into<String>, target: u32, requirements: Requirements) -> Self {
        SearchTask::resume(term, target, requirements, 0, HashSet::new())
    }

    pub fn resume(
        term: impl Into<String>,
        target: u32,
        requirements: Requirements,
        emitted: u32,
        prior_keys: HashSet<String>,
    ) -> Self {
        SearchTask {
            term: term.into(),
            target,
            requirements,
            emitted: AtomicU32::new(emitted.min(target)),
            prior_keys,
        }
    }

    pub fn try_accept(&self) -> Acceptance {
        match self
            .emitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |emitted| {
                (emitted < self.target).then_some(emitted + 1)
            }) {
            Ok(previous) => Acceptance::Accepted(previous + 1),
            Err(_) => Acceptance::Rejected,
        }
    }

    pub fn emitted(&self) -> u32 {
        self.emitted.load(Ordering::Acquire)
    }

    pub fn remaining(&self) -> u32 {
        self.target.saturating_sub(self.emitted())
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    pub fn was_emitted_before(&self, identity_key: &str) -> bool {
        self.prior_keys.contains(identity_key)
    }

    pub fn search_url(&self) -> Url {
        let mut url = Url::parse(MAPS_SEARCH_URL).expect("maps search url is valid");
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(self.term.trim());
        }
        url
    }
}
