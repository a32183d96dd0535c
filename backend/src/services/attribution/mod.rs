mod touch;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/attribution";

/// Configures and returns the Actix `Scope` for attribution routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/touch", post().to(touch::process))
}
