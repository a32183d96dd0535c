//! # Diagnostics Report Service
//!
//! `GET /api/diagnostics[?visitor=<id>]`, for support engineers.
//!
//! The route answers `404` unless a diagnostics token is configured, and
//! `401` unless the request carries it in `X-Diagnostics-Token`. The visitor
//! is taken from the `visitor` query parameter, falling back to the caller's
//! own `vid` cookie. The report never writes and never shows raw identifiers.

use crate::services::AppState;
use crate::visitor::{self, VisitorId};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, warn};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const TOKEN_HEADER: &str = "X-Diagnostics-Token";

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub visitor: Option<String>,
}

pub async fn process(
    req: HttpRequest,
    query: web::Query<ReportQuery>,
    state: web::Data<AppState>,
) -> impl Responder {
    let Some(expected) = state.diagnostics_token.as_deref() else {
        return HttpResponse::NotFound().finish();
    };
    let supplied = req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if !token_matches(supplied, expected) {
        warn!("diagnostics request rejected: bad or missing token");
        return HttpResponse::Unauthorized().finish();
    }

    let visitor = match query.visitor.as_deref() {
        Some(raw) => VisitorId::parse(raw),
        None => visitor::existing(&req),
    };
    let Some(visitor) = visitor else {
        return HttpResponse::BadRequest().body("No valid visitor id supplied");
    };

    match state.diagnostics.report(&visitor) {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            error!("diagnostics failed for visitor {}: {}", visitor, e);
            HttpResponse::ServiceUnavailable().body(format!("Error building report: {}", e))
        }
    }
}

/// Compares SHA-256 digests in constant time, so neither the token's
/// contents nor its length leak through response timing.
fn token_matches(supplied: Option<&str>, expected: &str) -> bool {
    let Some(supplied) = supplied else {
        return false;
    };
    let supplied = Sha256::digest(supplied.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    supplied.as_slice().ct_eq(expected.as_slice()).into()
}


#[cfg(test)]
mod token_tests {
    use super::token_matches;

    #[test]
    fn token_comparison_requires_exact_match() {
        assert!(token_matches(Some("ops-secret"), "ops-secret"));
        assert!(!token_matches(Some("ops-secreT"), "ops-secret"));
        assert!(!token_matches(Some("ops"), "ops-secret"));
        assert!(!token_matches(Some(""), "ops-secret"));
        assert!(!token_matches(None, "ops-secret"));
    }
}
