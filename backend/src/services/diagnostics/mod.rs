mod report;

use actix_web::web::{get, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/diagnostics";

/// Configures and returns the Actix `Scope` for the operator report.
pub fn configure_routes() -> Scope {
    scope(API_PATH).route("", get().to(report::process))
}
