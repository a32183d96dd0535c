//! Concurrent fan-out of one event to many destinations.
//!
//! All destination calls are issued together and awaited together; each is
//! bounded by its own timeout, so the whole dispatch takes as long as the
//! slowest destination, never the sum. The event is shared read-only.

use super::transport::{CapiTransport, TransportError};
use super::{DestinationConfig, DispatchError, DispatchResult};
use crate::events::builder::ConversionEvent;
use futures_util::future::join_all;
use log::{info, warn};
use std::sync::Arc;

pub struct CapiDispatcher {
    transport: Arc<dyn CapiTransport>,
}

impl CapiDispatcher {
    pub fn new(transport: Arc<dyn CapiTransport>) -> Self {
        Self { transport }
    }

    /// One attempt per destination; results come back in destination order.
    pub async fn dispatch(
        &self,
        event: &ConversionEvent,
        destinations: &[DestinationConfig],
    ) -> Vec<DispatchResult> {
        join_all(destinations.iter().map(|d| self.dispatch_one(event, d))).await
    }

    async fn dispatch_one(
        &self,
        event: &ConversionEvent,
        destination: &DestinationConfig,
    ) -> DispatchResult {
        let outcome = match destination.credentials() {
            Err(missing) => Err(DispatchError::ConfigurationError(missing.to_string())),
            Ok((pixel_id, token)) => {
                let format = destination.platform.format();
                let request = format.encode(event, destination, pixel_id, token);
                let timeout = destination.timeout();
                match tokio::time::timeout(timeout, self.transport.post(&request, timeout)).await {
                    Ok(Ok(response)) => format.classify(&response),
                    Ok(Err(TransportError::Network(message))) => {
                        Err(DispatchError::TransientDispatchFailure(message))
                    }
                    Ok(Err(TransportError::Timeout)) | Err(_) => {
                        Err(DispatchError::TransientDispatchFailure(format!(
                            "no response within {} ms",
                            destination.timeout_ms
                        )))
                    }
                }
            }
        };

        let result = DispatchResult {
            destination_id: destination.id.clone(),
            event_id: event.event_id.clone(),
            outcome,
        };
        log_result(event, &result);
        result
    }
}

/// One line per destination, enough to reconcile against the platform's event
/// log. Contact data is never logged.
fn log_result(event: &ConversionEvent, result: &DispatchResult) {
    match &result.outcome {
        Ok(platform_id) => info!(
            "capi accepted: destination={} event={} event_id={} platform_id={}",
            result.destination_id, event.event_name, result.event_id, platform_id
        ),
        Err(DispatchError::ConfigurationError(missing)) => warn!(
            "capi skipped: destination={} event={} event_id={} missing={}",
            result.destination_id, event.event_name, result.event_id, missing
        ),
        Err(DispatchError::DestinationRejected { status, message }) => warn!(
            "capi rejected: destination={} event={} event_id={} status={} message={}",
            result.destination_id, event.event_name, result.event_id, status, message
        ),
        Err(DispatchError::TransientDispatchFailure(message)) => warn!(
            "capi transient failure: destination={} event={} event_id={} error={}",
            result.destination_id, event.event_name, result.event_id, message
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capi::platform::tests::sample_event;
    use crate::capi::platform::{Platform, WireRequest};
    use crate::capi::transport::TransportResponse;
    use crate::capi::AccessToken;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Clone)]
    pub(crate) enum Behavior {
        Respond(u16, &'static str),
        Delay(Duration, u16, &'static str),
        Fail(TransportError),
    }

    /// Answers by endpoint prefix and records every request it sees.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        behaviors: Mutex<Vec<(String, Vec<Behavior>)>>,
        pub(crate) calls: Mutex<Vec<WireRequest>>,
    }

    impl FakeTransport {
        /// Queues behaviors for `endpoint`; the last one repeats.
        pub(crate) fn on(self, endpoint: &str, behaviors: Vec<Behavior>) -> Self {
            self.behaviors
                .lock()
                .unwrap()
                .push((endpoint.to_string(), behaviors));
            self
        }

        pub(crate) fn calls_to(&self, endpoint: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url.starts_with(endpoint))
                .count()
        }
    }

    #[async_trait]
    impl CapiTransport for FakeTransport {
        async fn post(
            &self,
            request: &WireRequest,
            _timeout: Duration,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            let behavior = {
                let mut behaviors = self.behaviors.lock().unwrap();
                let (_, queue) = behaviors
                    .iter_mut()
                    .find(|(endpoint, _)| request.url.starts_with(endpoint.as_str()))
                    .expect("no behavior for endpoint");
                if queue.len() > 1 {
                    queue.remove(0)
                } else {
                    queue[0].clone()
                }
            };
            match behavior {
                Behavior::Respond(status, body) => Ok(TransportResponse {
                    status,
                    body: body.to_string(),
                }),
                Behavior::Delay(delay, status, body) => {
                    tokio::time::sleep(delay).await;
                    Ok(TransportResponse {
                        status,
                        body: body.to_string(),
                    })
                }
                Behavior::Fail(err) => Err(err),
            }
        }
    }

    pub(crate) const META_OK: &str = r#"{"events_received":1,"fbtrace_id":"trace"}"#;

    pub(crate) fn meta_destination(id: &str, endpoint: &str, timeout_ms: u64) -> DestinationConfig {
        let mut dest = DestinationConfig::new(id, Platform::Meta);
        dest.pixel_id = Some(format!("pixel-{id}"));
        dest.access_token = Some(AccessToken::new("token"));
        dest.endpoint = Some(endpoint.to_string());
        dest.timeout_ms = timeout_ms;
        dest
    }

    #[tokio::test]
    async fn slow_destination_times_out_without_holding_up_the_others() {
        let transport = Arc::new(
            FakeTransport::default()
                .on("http://a", vec![Behavior::Respond(200, META_OK)])
                .on(
                    "http://slow",
                    vec![Behavior::Delay(Duration::from_secs(5), 200, META_OK)],
                )
                .on("http://b", vec![Behavior::Respond(200, META_OK)]),
        );
        let dispatcher = CapiDispatcher::new(transport.clone());
        let destinations = vec![
            meta_destination("a", "http://a", 200),
            meta_destination("slow", "http://slow", 200),
            meta_destination("b", "http://b", 200),
        ];

        let started = Instant::now();
        let results = dispatcher.dispatch(&sample_event(), &destinations).await;
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 3);
        assert!(results[0].accepted());
        assert!(results[1].is_transient());
        assert!(results[2].accepted());
        assert_eq!(results[0].platform_event_id(), Some("trace"));
        assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn every_destination_receives_the_same_event_id() {
        let transport = Arc::new(
            FakeTransport::default()
                .on("http://a", vec![Behavior::Respond(200, META_OK)])
                .on("http://b", vec![Behavior::Respond(400, r#"{"error":{"message":"no"}}"#)]),
        );
        let dispatcher = CapiDispatcher::new(transport.clone());
        let event = sample_event();
        let results = dispatcher
            .dispatch(
                &event,
                &[
                    meta_destination("a", "http://a", 500),
                    meta_destination("b", "http://b", 500),
                ],
            )
            .await;

        assert!(results.iter().all(|r| r.event_id == event.event_id));
        let calls = transport.calls.lock().unwrap();
        assert!(calls
            .iter()
            .all(|c| c.body["data"][0]["event_id"] == event.event_id.as_str()));
        assert_eq!(
            results[1].outcome,
            Err(DispatchError::DestinationRejected {
                status: 400,
                message: "no".into()
            })
        );
    }

    #[tokio::test]
    async fn unconfigured_destination_is_skipped_without_a_call() {
        let transport = Arc::new(
            FakeTransport::default().on("http://a", vec![Behavior::Respond(200, META_OK)]),
        );
        let dispatcher = CapiDispatcher::new(transport.clone());
        let mut missing_token = meta_destination("x", "http://x", 500);
        missing_token.access_token = None;

        let results = dispatcher
            .dispatch(
                &sample_event(),
                &[missing_token, meta_destination("a", "http://a", 500)],
            )
            .await;

        assert_eq!(
            results[0].outcome,
            Err(DispatchError::ConfigurationError("access_token".into()))
        );
        assert!(results[1].accepted());
        assert_eq!(transport.calls_to("http://x"), 0);
    }

    #[tokio::test]
    async fn network_failures_are_transient() {
        let transport = Arc::new(FakeTransport::default().on(
            "http://down",
            vec![Behavior::Fail(TransportError::Network("refused".into()))],
        ));
        let dispatcher = CapiDispatcher::new(transport);
        let results = dispatcher
            .dispatch(&sample_event(), &[meta_destination("down", "http://down", 500)])
            .await;
        assert_eq!(
            results[0].outcome,
            Err(DispatchError::TransientDispatchFailure("refused".into()))
        );
    }
}
