//! `POST /api/consent`.
//!
//! Issues the visitor cookie when the request has none, persists the choice,
//! and lets subscribers react before the response is sent.

use crate::services::AppState;
use crate::visitor;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use common::model::consent::ConsentState;
use common::requests::{ConsentResponse, UpdateConsentRequest};
use log::error;

pub async fn process(
    req: HttpRequest,
    payload: web::Json<UpdateConsentRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let (visitor, issued) = visitor::resolve(&req);
    let choice = ConsentState::from(payload.into_inner());
    match state.consent.set(&visitor, choice) {
        Ok(()) => {
            let mut response = HttpResponse::Ok();
            if issued {
                response.cookie(visitor::cookie(&visitor));
            }
            response.json(ConsentResponse {
                consent: Some(choice),
                requires_explicit_consent: true,
            })
        }
        Err(e) => {
            error!("failed to store consent for visitor {}: {}", visitor, e);
            HttpResponse::ServiceUnavailable().body(format!("Error saving consent: {}", e))
        }
    }
}
