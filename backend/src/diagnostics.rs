//! Read-only operator view of one visitor's tracking state.
//!
//! Replaces ad-hoc debug hooks: everything a support engineer needs to answer
//! "why did this order not attribute?" without exposing raw identifiers.

use crate::attribution::browser_id::BrowserIdStore;
use crate::attribution::click_id::ClickIdentifierStore;
use crate::attribution::store::AttributionStore;
use crate::capi::platform::Platform;
use crate::capi::DestinationConfig;
use crate::consent::ConsentStore;
use crate::error::StoreError;
use crate::visitor::VisitorId;
use common::model::attribution::AttributionRecord;
use common::model::consent::ConsentState;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationSummary {
    pub id: String,
    pub platform: Platform,
    pub configured: bool,
    pub markets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub visitor: String,
    pub consent: Option<ConsentState>,
    pub requires_explicit_consent: bool,
    /// What is stored, regardless of consent, with identifiers redacted.
    pub attribution: AttributionRecord,
    pub click_identifier_present: bool,
    pub browser_id_present: bool,
    pub destinations: Vec<DestinationSummary>,
}

pub struct Diagnostics {
    consent: Arc<ConsentStore>,
    attribution: Arc<AttributionStore>,
    clicks: Arc<ClickIdentifierStore>,
    browser_ids: Arc<BrowserIdStore>,
    destinations: Vec<DestinationSummary>,
}

impl Diagnostics {
    pub fn new(
        consent: Arc<ConsentStore>,
        attribution: Arc<AttributionStore>,
        clicks: Arc<ClickIdentifierStore>,
        browser_ids: Arc<BrowserIdStore>,
        destinations: &[DestinationConfig],
    ) -> Self {
        let destinations = destinations
            .iter()
            .map(|d| DestinationSummary {
                id: d.id.clone(),
                platform: d.platform,
                configured: d.is_configured(),
                markets: d.markets.clone(),
            })
            .collect();
        Self {
            consent,
            attribution,
            clicks,
            browser_ids,
            destinations,
        }
    }

    pub fn report(&self, visitor: &VisitorId) -> Result<DiagnosticsReport, StoreError> {
        let consent = self.consent.get(visitor)?;
        Ok(DiagnosticsReport {
            visitor: visitor.to_string(),
            requires_explicit_consent: consent.is_some(),
            consent,
            attribution: self.attribution.stored(visitor)?.redacted(),
            click_identifier_present: self.clicks.is_stored(visitor)?,
            browser_id_present: self.browser_ids.is_stored(visitor)?,
            destinations: self.destinations.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capi::AccessToken;
    use crate::storage::{KeyValueStore, MemoryKeyValueStore};
    use common::model::attribution::AttributionUpdate;

    struct Setup {
        diagnostics: Diagnostics,
        consent: Arc<ConsentStore>,
        attribution: Arc<AttributionStore>,
        clicks: Arc<ClickIdentifierStore>,
        kv: Arc<dyn KeyValueStore>,
    }

    fn setup() -> Setup {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let consent = Arc::new(ConsentStore::new(kv.clone()));
        let attribution = Arc::new(AttributionStore::new(kv.clone(), consent.clone()));
        let clicks = Arc::new(ClickIdentifierStore::new(kv.clone(), consent.clone()));
        let browser_ids = Arc::new(BrowserIdStore::new(kv.clone(), consent.clone()));

        let mut meta = DestinationConfig::new("meta-cz", Platform::Meta);
        meta.pixel_id = Some("123".into());
        meta.access_token = Some(AccessToken::new("secret"));
        meta.markets = vec!["cz".into()];
        let tiktok = DestinationConfig::new("tiktok", Platform::Tiktok);

        Setup {
            diagnostics: Diagnostics::new(
                consent.clone(),
                attribution.clone(),
                clicks.clone(),
                browser_ids,
                &[meta, tiktok],
            ),
            consent,
            attribution,
            clicks,
            kv,
        }
    }

    #[test]
    fn fresh_visitor_has_empty_report() {
        let s = setup();
        let report = s.diagnostics.report(&VisitorId::generate()).unwrap();
        assert_eq!(report.consent, None);
        assert!(!report.requires_explicit_consent);
        assert_eq!(report.attribution, AttributionRecord::default());
        assert!(!report.click_identifier_present);
        assert!(!report.browser_id_present);
    }

    #[test]
    fn identifiers_are_redacted_and_presence_reported() {
        let s = setup();
        let visitor = VisitorId::generate();
        s.attribution
            .merge(
                &visitor,
                &AttributionUpdate {
                    campaign_id: Some("spring-sale-2024".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        s.clicks.initialize(&visitor, Some("abc123xyz")).unwrap();

        let report = s.diagnostics.report(&visitor).unwrap();
        assert_eq!(report.attribution.campaign_id.as_deref(), Some("spri***"));
        assert!(report.click_identifier_present);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("spring-sale-2024"));
        assert!(!json.contains("abc123xyz"));
    }

    #[test]
    fn report_shows_stored_data_even_after_refusal() {
        let s = setup();
        let visitor = VisitorId::generate();
        s.clicks.initialize(&visitor, Some("abc123")).unwrap();
        s.consent
            .set(
                &visitor,
                ConsentState {
                    necessary: true,
                    marketing: false,
                },
            )
            .unwrap();

        let report = s.diagnostics.report(&visitor).unwrap();
        assert!(report.requires_explicit_consent);
        assert_eq!(report.consent.map(|c| c.marketing), Some(false));
        assert!(report.click_identifier_present);
    }

    #[test]
    fn report_does_not_write() {
        let s = setup();
        let visitor = VisitorId::generate();
        s.diagnostics.report(&visitor).unwrap();
        assert_eq!(
            s.kv.get(&crate::storage::visitor_key("consent", &visitor)).unwrap(),
            None
        );
        assert!(!s.diagnostics.report(&visitor).unwrap().browser_id_present);
    }

    #[test]
    fn destinations_show_configuration_without_secrets() {
        let s = setup();
        let report = s.diagnostics.report(&VisitorId::generate()).unwrap();
        assert_eq!(
            report.destinations,
            vec![
                DestinationSummary {
                    id: "meta-cz".into(),
                    platform: Platform::Meta,
                    configured: true,
                    markets: vec!["cz".into()],
                },
                DestinationSummary {
                    id: "tiktok".into(),
                    platform: Platform::Tiktok,
                    configured: false,
                    markets: vec![],
                },
            ]
        );
        assert!(!serde_json::to_string(&report).unwrap().contains("secret"));
    }
}
