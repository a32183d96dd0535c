//! `GET /api/consent`.
//!
//! A request without a visitor cookie has never been seen, so it gets the
//! implied-consent answer without creating anything.

use crate::services::AppState;
use crate::visitor;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use common::requests::ConsentResponse;
use log::error;

pub async fn process(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let Some(visitor) = visitor::existing(&req) else {
        return HttpResponse::Ok().json(ConsentResponse {
            consent: None,
            requires_explicit_consent: false,
        });
    };
    match state.consent.get(&visitor) {
        Ok(consent) => HttpResponse::Ok().json(ConsentResponse {
            requires_explicit_consent: consent.is_some(),
            consent,
        }),
        Err(e) => {
            error!("failed to read consent for visitor {}: {}", visitor, e);
            HttpResponse::ServiceUnavailable().body(format!("Error reading consent: {}", e))
        }
    }
}
