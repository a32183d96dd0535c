//! # HTTP services
//!
//! Each sub-module owns one `/api/...` scope and exposes `configure_routes()`
//! for `main.rs` to mount. All handlers share one [`AppState`] injected as
//! `web::Data`.
//!
//! ## Sub-modules:
//! - `consent`: read and record the visitor's consent choice.
//! - `attribution`: page-load touch that captures campaign parameters.
//! - `events`: checkout and purchase tracking, handing events to dispatch.
//! - `pricing`: shipping quote for the storefront.
//! - `diagnostics`: token-protected operator report.

pub mod attribution;
pub mod consent;
pub mod diagnostics;
pub mod events;
pub mod pricing;

use crate::attribution::browser_id::BrowserIdStore;
use crate::attribution::capture::ParameterMapping;
use crate::attribution::click_id::ClickIdentifierStore;
use crate::attribution::store::AttributionStore;
use crate::capi::DestinationConfig;
use crate::config::Config;
use crate::consent::ConsentStore;
use crate::diagnostics::Diagnostics;
use crate::dispatch_controller::state::DispatchQueue;
use crate::error::ConfigError;
use crate::events::builder::EventBuilder;
use crate::storage::KeyValueStore;
use crate::visitor::VisitorId;
use common::model::consent::ConsentState;
use log::info;
use std::sync::Arc;

/// Everything the handlers need, built once at startup.
pub struct AppState {
    pub consent: Arc<ConsentStore>,
    pub attribution: Arc<AttributionStore>,
    pub clicks: Arc<ClickIdentifierStore>,
    pub browser_ids: Arc<BrowserIdStore>,
    pub builder: EventBuilder,
    pub destinations: Vec<DestinationConfig>,
    pub queue: DispatchQueue,
    pub diagnostics: Diagnostics,
    pub diagnostics_token: Option<String>,
    pub mapping: ParameterMapping,
}

impl AppState {
    /// Wires every store onto `kv` and validates the rate table and markets.
    pub fn new(
        config: &Config,
        kv: Arc<dyn KeyValueStore>,
        queue: DispatchQueue,
    ) -> Result<Self, ConfigError> {
        let consent = Arc::new(ConsentStore::new(kv.clone()));
        consent.subscribe(Box::new(|visitor: &VisitorId, state: &ConsentState| {
            info!(
                "consent updated for visitor {}: necessary={} marketing={}",
                visitor, state.necessary, state.marketing
            );
        }));

        let attribution = Arc::new(AttributionStore::new(kv.clone(), consent.clone()));
        let clicks = Arc::new(ClickIdentifierStore::new(kv.clone(), consent.clone()));
        let browser_ids = Arc::new(BrowserIdStore::new(kv, consent.clone()));

        let builder = EventBuilder::new(
            config.rate_table()?,
            config.markets_by_code()?,
            attribution.clone(),
            clicks.clone(),
            browser_ids.clone(),
        );
        let diagnostics = Diagnostics::new(
            consent.clone(),
            attribution.clone(),
            clicks.clone(),
            browser_ids.clone(),
            &config.destinations,
        );

        Ok(Self {
            consent,
            attribution,
            clicks,
            browser_ids,
            builder,
            destinations: config.destinations.clone(),
            queue,
            diagnostics,
            diagnostics_token: config.diagnostics_token.clone(),
            mapping: config.parameter_mapping.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dispatch_controller::state::DispatchJob;
    use crate::storage::MemoryKeyValueStore;
    use crate::visitor::VISITOR_COOKIE;
    use actix_web::cookie::Cookie;
    use actix_web::dev::ServiceResponse;
    use actix_web::web;
    use tokio::sync::mpsc;

    /// In-memory state; the receiver exposes what handlers enqueued.
    pub(crate) fn test_state(config: &Config) -> (web::Data<AppState>, mpsc::Receiver<DispatchJob>) {
        let (tx, rx) = mpsc::channel(16);
        let state = AppState::new(
            config,
            Arc::new(MemoryKeyValueStore::new()),
            DispatchQueue::new(tx),
        )
        .unwrap();
        (web::Data::new(state), rx)
    }

    pub(crate) fn visitor_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
        resp.response()
            .cookies()
            .find(|c| c.name() == VISITOR_COOKIE)
            .map(|c| c.into_owned())
    }

    #[test]
    fn state_rejects_invalid_rate_table() {
        let mut config = Config::default();
        config.rates.clear();
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            AppState::new(&config, Arc::new(MemoryKeyValueStore::new()), DispatchQueue::new(tx)),
            Err(ConfigError::MissingRate(_))
        ));
    }
}
