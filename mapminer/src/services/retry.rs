use std::{error::Error, future::Future, time::Duration};

use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::ScrapeError;

const BASE_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_MS: u64 = 1_000;

/// Retry count for the next attempt, or `None` once `max_retries` is spent.
pub fn next_attempt(retry_count: u8, max_retries: u8) -> Option<u8> {
    (retry_count < max_retries).then(|| retry_count + 1)
}

/// Exponential delay capped at 30s, plus up to 1s of jitter.
pub fn backoff(retry_count: u8) -> Duration {
    let exponential = BASE_DELAY_MS
        .saturating_mul(1 << retry_count.min(10))
        .min(MAX_DELAY_MS);
    let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
    Duration::from_millis(exponential + jitter)
}

/// Puts `request` back on its queue after a backoff.
pub fn requeue_later<T: Send + 'static>(sender: UnboundedSender<T>, request: T, retry_count: u8) {
    let delay = backoff(retry_count);
    log::info!("Retrying request #{} in {:?}", retry_count, delay);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = sender.send(request) {
            log::error!(
                "Retry sender channel got an Error: {:?} | Source: {:?}",
                e,
                e.source(),
            );
        }
    });
}

/// Runs one unit of work, failing it with `ScrapeError::Timeout` past `limit`.
pub async fn within_handler_timeout<T>(
    limit: Duration,
    unit: impl Future<Output = Result<T, ScrapeError>>,
) -> Result<T, ScrapeError> {
    tokio::time::timeout(limit, unit)
        .await
        .unwrap_or(Err(ScrapeError::Timeout(limit)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{backoff, next_attempt, within_handler_timeout};
    use crate::error::ScrapeError;

    #[test]
    fn retries_stop_at_max() {
        assert_eq!(next_attempt(0, 5), Some(1));
        assert_eq!(next_attempt(4, 5), Some(5));
        assert_eq!(next_attempt(5, 5), None);
        assert_eq!(next_attempt(0, 0), None);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let first = backoff(0);
        assert!(first >= Duration::from_millis(1_000) && first < Duration::from_millis(2_000));

        let third = backoff(2);
        assert!(third >= Duration::from_millis(4_000) && third < Duration::from_millis(5_000));

        let late = backoff(200);
        assert!(late >= Duration::from_millis(30_000) && late < Duration::from_millis(31_000));
    }

    #[tokio::test]
    async fn hung_unit_is_cut_off() {
        let result = within_handler_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ScrapeError>(())
        })
        .await;

        assert!(matches!(result, Err(ScrapeError::Timeout(limit)) if limit == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn finished_unit_keeps_its_result() {
        let result = within_handler_timeout(Duration::from_secs(5), async {
            Ok::<_, ScrapeError>(7)
        })
        .await;

        assert!(matches!(result, Ok(7)));
    }
}
