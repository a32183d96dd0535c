//! # Conversion Tracking Service
//!
//! Handlers for `POST /api/events/checkout` and `POST /api/events/purchase`.
//!
//! ## Workflow:
//!
//! 1.  **Request Context**: client IP (from `X-Forwarded-For`/`Forwarded` or
//!     the peer address), `User-Agent` and `Referer` are read from the request.
//!     `Referer` is only used when the body carries no `source_url`. The
//!     visitor comes from the `vid` cookie; none is issued here.
//!
//! 2.  **Build**: the `EventBuilder` validates the order, computes the value in
//!     the market currency and snapshots the visitor's attribution. A build
//!     failure answers `422 Unprocessable Entity` naming the field.
//!
//! 3.  **Dispatch**: the server event is handed to the dispatch worker together
//!     with the destinations serving the market. The response never waits on
//!     the ad platforms and never reports their outcome.
//!
//! 4.  **Response**: the `PixelEvent` for the browser pixel.

use crate::capi::destinations_for;
use crate::dispatch_controller::state::DispatchJob;
use crate::error::EventError;
use crate::events::builder::{OrderContext, RequestContext};
use crate::services::AppState;
use crate::visitor;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use common::model::event::EventName;
use common::requests::OrderRequest;
use log::{info, warn};
use std::net::{IpAddr, SocketAddr};

pub async fn checkout(
    req: HttpRequest,
    payload: web::Json<OrderRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    track(&req, payload.into_inner(), &state, EventName::InitiateCheckout)
}

pub async fn purchase(
    req: HttpRequest,
    payload: web::Json<OrderRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    track(&req, payload.into_inner(), &state, EventName::Purchase)
}

fn track(
    req: &HttpRequest,
    mut order: OrderRequest,
    state: &AppState,
    route_event: EventName,
) -> HttpResponse {
    match order.event_name {
        Some(name) if name != route_event => {
            return unprocessable(EventError::InvalidField("event_name"));
        }
        _ => order.event_name = Some(route_event),
    }

    let ctx = OrderContext {
        order,
        visitor: visitor::existing(req),
        context: request_context(req),
    };
    match state.builder.build(ctx) {
        Ok(built) => {
            let destinations = destinations_for(&state.destinations, &built.event.market);
            info!(
                "tracked {} event_id={} market={} destinations={}",
                built.event.event_name,
                built.event.event_id,
                built.event.market,
                destinations.len()
            );
            state.queue.enqueue(DispatchJob::new(built.event, destinations));
            HttpResponse::Ok().json(built.pixel)
        }
        Err(e) => unprocessable(e),
    }
}

fn unprocessable(e: EventError) -> HttpResponse {
    warn!("event rejected: {}", e);
    HttpResponse::UnprocessableEntity().body(format!("Error building event: {}", e))
}

fn request_context(req: &HttpRequest) -> RequestContext {
    let header_value = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    RequestContext {
        client_ip: req.connection_info().realip_remote_addr().and_then(client_ip),
        user_agent: header_value(header::USER_AGENT),
        source_url: header_value(header::REFERER),
    }
}

/// Accepts `ip`, `ip:port` and `[v6]:port`; anything else is dropped.
fn client_ip(raw: &str) -> Option<String> {
    let raw = raw.trim();
    raw.parse::<SocketAddr>()
        .map(|addr| addr.ip())
        .or_else(|_| raw.parse::<IpAddr>())
        .ok()
        .map(|ip| ip.to_string())
}
