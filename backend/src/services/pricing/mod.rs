mod shipping;

use actix_web::web::{get, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/pricing";

/// Configures and returns the Actix `Scope` for pricing routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/shipping", get().to(shipping::process))
}
