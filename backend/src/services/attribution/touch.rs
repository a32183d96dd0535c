//! # Attribution Touch Service
//!
//! `POST /api/attribution/touch`, called by the storefront on every page load.
//!
//! ## Workflow:
//!
//! 1.  **Visitor**: the `vid` cookie is read, or a new visitor is issued and the
//!     cookie is set on the response.
//!
//! 2.  **Capture**: campaign parameters are extracted from `page_url`, with the
//!     referrer filling any field the page did not carry.
//!
//! 3.  **Merge**: the captured fields are merged into the stored record. Under
//!     refused marketing consent nothing is written.
//!
//! 4.  **Identifiers**: the click identifier is initialized from the click
//!     token (idempotent per token) and the browser id is created if missing.
//!
//! 5.  **Response**: the record as the event builder would see it, with the
//!     raw click token redacted, plus whether consent blocked the write.

use crate::attribution::capture::capture_from_urls;
use crate::error::StoreError;
use crate::services::AppState;
use crate::visitor::{self, VisitorId};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use common::model::attribution::{redact, AttributionRecord};
use common::requests::{TouchRequest, TouchResponse};
use log::{debug, error};

pub async fn process(
    req: HttpRequest,
    payload: web::Json<TouchRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let (visitor, issued) = visitor::resolve(&req);
    match touch(&state, &visitor, &payload) {
        Ok(body) => {
            let mut response = HttpResponse::Ok();
            if issued {
                response.cookie(visitor::cookie(&visitor));
            }
            response.json(body)
        }
        Err(e) => {
            error!("attribution touch failed for visitor {}: {}", visitor, e);
            HttpResponse::ServiceUnavailable().body(format!("Error recording attribution: {}", e))
        }
    }
}

fn touch(
    state: &AppState,
    visitor: &VisitorId,
    payload: &TouchRequest,
) -> Result<TouchResponse, StoreError> {
    let update = capture_from_urls(&payload.page_url, payload.referrer.as_deref(), &state.mapping);
    debug!(
        "touch for visitor {}: parameters observed={} click token={}",
        visitor,
        !update.is_empty(),
        update.click_id.is_some()
    );

    let consent_blocked = state.attribution.merge(visitor, &update)?.is_blocked();
    state.clicks.initialize(visitor, update.click_id.as_deref())?;
    state.browser_ids.ensure(visitor)?;

    let record = state.attribution.load(visitor)?;
    Ok(TouchResponse {
        attribution: AttributionRecord {
            click_id: record.click_id.as_deref().map(redact),
            ..record
        },
        consent_blocked,
    })
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::services::tests::{test_state, visitor_cookie};
    use crate::visitor::{VisitorId, VISITOR_COOKIE};
    use actix_web::cookie::Cookie;
    use actix_web::{test, App};
    use common::model::attribution::DEFAULT_MEDIUM;
    use common::model::consent::ConsentState;
    use common::requests::TouchResponse;
    use serde_json::json;

    #[actix_web::test]
    async fn landing_with_campaign_parameters_is_recorded() {
        let (state, _rx) = test_state(&Config::default());
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(super::super::configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/attribution/touch")
            .set_json(json!({
                "page_url": "https://shop.example/cz/?utm_campaign=spring&utm_medium=cpc&fbclid=abc123xyz",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let visitor = VisitorId::parse(visitor_cookie(&resp).unwrap().value()).unwrap();
        let body: TouchResponse = test::read_body_json(resp).await;

        assert!(!body.consent_blocked);
        assert_eq!(body.attribution.campaign_id.as_deref(), Some("spring"));
        assert_eq!(body.attribution.medium, "cpc");
        assert_eq!(body.attribution.click_id.as_deref(), Some("abc1***"));

        let click = state.clicks.get(&visitor).unwrap().unwrap();
        assert_eq!(click.raw_token, "abc123xyz");
        assert!(state.browser_ids.get(&visitor).unwrap().is_some());
    }

    #[actix_web::test]
    async fn refused_consent_stores_nothing() {
        let (state, _rx) = test_state(&Config::default());
        let visitor = VisitorId::generate();
        state
            .consent
            .set(
                &visitor,
                ConsentState {
                    necessary: true,
                    marketing: false,
                },
            )
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(super::super::configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/attribution/touch")
            .cookie(Cookie::new(VISITOR_COOKIE, visitor.to_string()))
            .set_json(json!({"page_url": "/?utm_campaign=spring&fbclid=abc123"}))
            .to_request();
        let body: TouchResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.consent_blocked);
        assert_eq!(body.attribution.campaign_id, None);
        assert_eq!(body.attribution.medium, DEFAULT_MEDIUM);
        assert!(!state.clicks.is_stored(&visitor).unwrap());
        assert!(!state.browser_ids.is_stored(&visitor).unwrap());
        assert_eq!(state.attribution.stored(&visitor).unwrap().campaign_id, None);
    }

    #[actix_web::test]
    async fn later_touch_without_parameters_keeps_attribution() {
        let (state, _rx) = test_state(&Config::default());
        let visitor = VisitorId::generate();
        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(super::super::configure_routes()),
        )
        .await;

        for page in ["/?utm_campaign=spring", "/cz/beds"] {
            let req = test::TestRequest::post()
                .uri("/api/attribution/touch")
                .cookie(Cookie::new(VISITOR_COOKIE, visitor.to_string()))
                .set_json(json!({"page_url": page, "referrer": "https://www.google.com/"}))
                .to_request();
            let body: TouchResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body.attribution.campaign_id.as_deref(), Some("spring"));
        }
    }
}
