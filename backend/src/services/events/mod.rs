//! # Event Tracking Service Module
//!
//! Routes under `/api/events`. The storefront calls these when the customer
//! starts checkout or completes an order, then fires its browser pixel with
//! the returned `PixelEvent`, so both channels carry one `event_id`.

mod track;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/events";

/// Configures and returns the Actix `Scope` for event routes.
///
/// # Registered Routes:
///
/// *   **`POST /checkout`**: `track::checkout`, an `InitiateCheckout` event.
/// *   **`POST /purchase`**: `track::purchase`, a `Purchase` event.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/checkout", post().to(track::checkout))
        .route("/purchase", post().to(track::purchase))
}
