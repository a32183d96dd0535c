//! Runs conversion dispatch outside the request/response cycle.
//!
//! Tracking endpoints must answer the storefront without waiting on ad
//! platforms, and an aborted HTTP request must not abort a dispatch that has
//! already been accepted. Handlers therefore only enqueue.
//!
//! The main components are:
//! - `DispatchQueue`: a clonable handle injected into the Actix application
//!   state. Handlers push `DispatchJob`s through it.
//! - `DispatchJob`: one built event plus the destinations it goes to.
//! - `start_dispatch_worker`: a long-running task that drains the channel and
//!   runs each job on its own Tokio task, so a slow platform for one order
//!   never delays the next.

use crate::capi::dispatcher::CapiDispatcher;
use crate::capi::retry::{dispatch_with_retry, RetryPolicy};
use crate::capi::{DestinationConfig, DispatchResult};
use crate::events::builder::ConversionEvent;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct DispatchJob {
    pub(crate) event: ConversionEvent,
    pub(crate) destinations: Vec<DestinationConfig>,
}

impl DispatchJob {
    pub fn new(event: ConversionEvent, destinations: Vec<DestinationConfig>) -> Self {
        Self {
            event,
            destinations,
        }
    }
}

/// Sending half of the dispatch channel, shared across workers as `web::Data`.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<DispatchJob>,
}

impl DispatchQueue {
    pub fn new(tx: mpsc::Sender<DispatchJob>) -> Self {
        Self { tx }
    }

    /// Hands the job to the worker. Returns `false` when the queue is full or
    /// the worker is gone; the event is then dropped and logged, the caller's
    /// response is unaffected.
    pub fn enqueue(&self, job: DispatchJob) -> bool {
        let event_id = job.event.event_id.clone();
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("dispatch queue full, dropping event_id={}", event_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("dispatch worker stopped, dropping event_id={}", event_id);
                false
            }
        }
    }
}

/// Drains `rx` until every sender is dropped.
///
/// Each job is spawned on its own task; the worker waits for all in-flight
/// jobs before returning. At shutdown `drain_dispatch_worker` bounds that wait.
pub async fn start_dispatch_worker(
    dispatcher: Arc<CapiDispatcher>,
    policy: RetryPolicy,
    mut rx: mpsc::Receiver<DispatchJob>,
) {
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    while let Some(job) = rx.recv().await {
        in_flight.retain(|handle| !handle.is_finished());
        if job.destinations.is_empty() {
            info!(
                "no destinations for market {}, event_id={} not dispatched",
                job.event.market, job.event.event_id
            );
            continue;
        }
        let dispatcher = dispatcher.clone();
        let policy = policy.clone();
        in_flight.push(tokio::spawn(async move {
            let results =
                dispatch_with_retry(&dispatcher, &job.event, &job.destinations, &policy).await;
            log_summary(&job.event, &results);
        }));
    }
    for handle in in_flight {
        if let Err(e) = handle.await {
            error!("dispatch task failed: {}", e);
        }
    }
}

/// Waits for the worker to finish the jobs it already accepted. Call once the
/// HTTP server has stopped, so the last `DispatchQueue` is gone and the
/// channel closes. Returns `false` if `grace` ran out first.
pub async fn drain_dispatch_worker(worker: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, worker).await {
        Ok(Ok(())) => {
            info!("dispatch worker drained");
            true
        }
        Ok(Err(e)) => {
            error!("dispatch worker failed: {}", e);
            true
        }
        Err(_) => {
            warn!(
                "dispatches still in flight after {:?}, shutting down anyway",
                grace
            );
            false
        }
    }
}

fn log_summary(event: &ConversionEvent, results: &[DispatchResult]) {
    let accepted = results.iter().filter(|r| r.accepted()).count();
    info!(
        "dispatched {} event_id={}: {}/{} destinations accepted",
        event.event_name,
        event.event_id,
        accepted,
        results.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capi::dispatcher::tests::{meta_destination, Behavior, FakeTransport, META_OK};
    use crate::capi::platform::tests::sample_event;

    #[tokio::test]
    async fn worker_dispatches_every_queued_job() {
        let transport = Arc::new(
            FakeTransport::default()
                .on("http://a", vec![Behavior::Respond(200, META_OK)])
                .on("http://b", vec![Behavior::Respond(200, META_OK)]),
        );
        let (tx, rx) = mpsc::channel(8);
        let queue = DispatchQueue::new(tx);
        let worker = tokio::spawn(start_dispatch_worker(
            Arc::new(CapiDispatcher::new(transport.clone())),
            RetryPolicy::disabled(),
            rx,
        ));

        let mut second = sample_event();
        second.event_id = "1700000000001.def".into();
        assert!(queue.enqueue(DispatchJob::new(
            sample_event(),
            vec![meta_destination("a", "http://a", 500)],
        )));
        assert!(queue.enqueue(DispatchJob::new(
            second,
            vec![
                meta_destination("a", "http://a", 500),
                meta_destination("b", "http://b", 500),
            ],
        )));
        drop(queue);
        worker.await.unwrap();

        assert_eq!(transport.calls_to("http://a"), 2);
        assert_eq!(transport.calls_to("http://b"), 1);
    }

    #[tokio::test]
    async fn jobs_without_destinations_make_no_calls() {
        let transport = Arc::new(FakeTransport::default());
        let (tx, rx) = mpsc::channel(1);
        let queue = DispatchQueue::new(tx);
        let worker = tokio::spawn(start_dispatch_worker(
            Arc::new(CapiDispatcher::new(transport.clone())),
            RetryPolicy::disabled(),
            rx,
        ));

        assert!(queue.enqueue(DispatchJob::new(sample_event(), Vec::new())));
        drop(queue);
        worker.await.unwrap();
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_dispatch_after_queue_closes() {
        let transport = Arc::new(FakeTransport::default().on(
            "http://slow",
            vec![Behavior::Delay(Duration::from_millis(100), 200, META_OK)],
        ));
        let (tx, rx) = mpsc::channel(1);
        let queue = DispatchQueue::new(tx);
        let worker = tokio::spawn(start_dispatch_worker(
            Arc::new(CapiDispatcher::new(transport.clone())),
            RetryPolicy::disabled(),
            rx,
        ));

        assert!(queue.enqueue(DispatchJob::new(
            sample_event(),
            vec![meta_destination("slow", "http://slow", 2_000)],
        )));
        drop(queue);

        assert!(drain_dispatch_worker(worker, Duration::from_secs(5)).await);
        assert_eq!(transport.calls_to("http://slow"), 1);
    }

    #[tokio::test]
    async fn drain_gives_up_after_grace_period() {
        let transport = Arc::new(FakeTransport::default().on(
            "http://slow",
            vec![Behavior::Delay(Duration::from_secs(5), 200, META_OK)],
        ));
        let (tx, rx) = mpsc::channel(1);
        let queue = DispatchQueue::new(tx);
        let worker = tokio::spawn(start_dispatch_worker(
            Arc::new(CapiDispatcher::new(transport)),
            RetryPolicy::disabled(),
            rx,
        ));

        assert!(queue.enqueue(DispatchJob::new(
            sample_event(),
            vec![meta_destination("slow", "http://slow", 10_000)],
        )));
        drop(queue);

        assert!(!drain_dispatch_worker(worker, Duration::from_millis(50)).await);
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = DispatchQueue::new(tx);
        assert!(queue.enqueue(DispatchJob::new(sample_event(), Vec::new())));
        assert!(!queue.enqueue(DispatchJob::new(sample_event(), Vec::new())));
    }

    #[test]
    fn closed_queue_rejects() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let queue = DispatchQueue::new(tx);
        assert!(!queue.enqueue(DispatchJob::new(sample_event(), Vec::new())));
    }
}
