//! Retry policy for transient dispatch failures.
//!
//! Kept outside the dispatcher: only destinations whose last result was a
//! `TransientDispatchFailure` are re-sent, always with the original
//! `event_id` so the platform can fold duplicates. Accepted and rejected
//! destinations are never sent again.

use super::dispatcher::CapiDispatcher;
use super::{DestinationConfig, DispatchResult};
use crate::events::builder::ConversionEvent;
use log::info;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first; `0` disables retrying.
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 0,
        }
    }
}

/// Dispatches once, then re-sends transient failures according to `policy`.
/// Results stay in destination order and hold each destination's last outcome.
pub async fn dispatch_with_retry(
    dispatcher: &CapiDispatcher,
    event: &ConversionEvent,
    destinations: &[DestinationConfig],
    policy: &RetryPolicy,
) -> Vec<DispatchResult> {
    let mut results = dispatcher.dispatch(event, destinations).await;

    for attempt in 1..=policy.max_retries {
        let pending: Vec<DestinationConfig> = destinations
            .iter()
            .zip(&results)
            .filter(|(_, result)| result.is_transient())
            .map(|(destination, _)| destination.clone())
            .collect();
        if pending.is_empty() {
            break;
        }

        info!(
            "capi retry {}/{}: event_id={} destinations={}",
            attempt,
            policy.max_retries,
            event.event_id,
            pending.len()
        );
        tokio::time::sleep(Duration::from_millis(policy.backoff_ms)).await;

        for retried in dispatcher.dispatch(event, &pending).await {
            if let Some(slot) = results
                .iter_mut()
                .find(|r| r.destination_id == retried.destination_id)
            {
                *slot = retried;
            }
        }
    }

    results
}
