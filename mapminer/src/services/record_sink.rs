use std::error::Error;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{
    business::BusinessRecord,
    listing::BusinessListing,
    search_task::{Acceptance, SearchTask},
};

use super::PersistantData;

#[derive(Debug, PartialEq, Eq)]
pub enum Emission {
    Emitted(u32),
    Dropped,
}

/// Final stop for every record, whichever path it took.
///
/// Callers deduplicate. The sink only asks the task whether there is room left.
#[derive(Clone)]
pub struct RecordSink {
    pub sender: UnboundedSender<PersistantData>,
}

impl RecordSink {
    pub fn emit(&self, task: &SearchTask, record: BusinessRecord) -> Emission {
        let emitted = match task.try_accept() {
            Acceptance::Accepted(emitted) => emitted,
            Acceptance::Rejected => {
                log::debug!(
                    "Dropping {} for '{}', target of {} reached",
                    record.name,
                    task.term,
                    task.target
                );
                return Emission::Dropped;
            }
        };

        let listing = BusinessListing::from_record(record, &task.term, Utc::now());
        log::info!(
            "Emitted '{}' for '{}' ({}/{})",
            listing.business_name,
            task.term,
            emitted,
            task.target
        );
        if emitted == task.target {
            log::info!("Reached target of {} for '{}'", task.target, task.term);
        }

        for data in [
            PersistantData::Listing(listing),
            PersistantData::Progress {
                search_term: task.term.clone(),
            },
        ] {
            if let Err(e) = self.sender.send(data) {
                log::error!(
                    "Persistant data sender channel got an Error: {:?} | Source: {:?}",
                    e,
                    e.source(),
                );
            }
        }

        Emission::Emitted(emitted)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use tokio::sync::mpsc;

    use super::{Emission, RecordSink};
    use crate::{
        domain::{business::BusinessRecord, completeness::Requirements, search_task::SearchTask},
        services::PersistantData,
    };

    fn task(target: u32) -> SearchTask {
        SearchTask::new(
            "tacos in san antonio",
            target,
            Requirements {
                phone: false,
                website: false,
            },
        )
    }

    #[test]
    fn emits_listing_and_progress() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sink = RecordSink { sender };
        let task = task(3);

        let emission = sink.emit(
            &task,
            BusinessRecord::new("https://www.google.com/maps/place/a", "Taqueria A"),
        );

        assert_eq!(emission, Emission::Emitted(1));
        match receiver.try_recv() {
            Ok(PersistantData::Listing(listing)) => {
                assert_eq!(listing.business_name, "Taqueria A");
                assert_eq!(listing.search_term, "tacos in san antonio");
                assert_eq!(listing.source_url, "https://www.google.com/maps/place/a");
            }
            other => panic!("expected listing, got {:?}", other),
        }
        assert!(matches!(
            receiver.try_recv(),
            Ok(PersistantData::Progress { ref search_term }) if search_term == "tacos in san antonio"
        ));
    }

    #[test]
    fn drops_past_target_without_sending() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sink = RecordSink { sender };
        let task = task(1);

        sink.emit(&task, BusinessRecord::new("https://www.google.com/maps/place/a", "A"));
        let emission = sink.emit(&task, BusinessRecord::new("https://www.google.com/maps/place/b", "B"));

        assert_eq!(emission, Emission::Dropped);
        let mut sent = 0;
        while receiver.try_recv().is_ok() {
            sent += 1;
        }
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn concurrent_emitters_respect_target_and_keys_stay_unique() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sink = RecordSink { sender };
        let task = Arc::new(task(7));

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let sink = sink.clone();
                let task = task.clone();
                tokio::spawn(async move {
                    let record = BusinessRecord::new(
                        format!("https://www.google.com/maps/place/{i}"),
                        format!("Place {i}"),
                    );
                    sink.emit(&task, record)
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        drop(sink);

        let mut keys = HashSet::new();
        while let Some(data) = receiver.recv().await {
            if let PersistantData::Listing(listing) = data {
                assert!(keys.insert(listing.source_url));
            }
        }
        assert_eq!(keys.len(), 7);
        assert_eq!(task.emitted(), 7);
    }
}
