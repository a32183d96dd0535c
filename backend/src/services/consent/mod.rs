//! # Consent Service Module
//!
//! Routes under `/api/consent`. The consent banner reads the stored choice on
//! page load and writes it back when the visitor answers.
//!
//! ## Sub-modules:
//! - `get`: returns the stored choice and whether the prompt was answered.
//! - `save`: persists a new choice and notifies consent subscribers.

mod get;
mod save;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/consent";

/// Configures and returns the Actix `Scope` for consent routes.
///
/// # Registered Routes:
///
/// *   **`GET /`**: `get::process`, current choice or `null`.
/// *   **`POST /`**: `save::process`, records `{necessary, marketing}`.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(get::process))
        .route("", post().to(save::process))
}
