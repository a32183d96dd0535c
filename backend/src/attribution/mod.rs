//! Attribution capture and the consent-gated stores that remember it.
//!
//! - `capture`: pure extraction of campaign fields and the click token from
//!   request URLs.
//! - `store`: per-visitor [`AttributionRecord`](common::model::attribution::AttributionRecord)
//!   with non-destructive merging.
//! - `click_id`: the platform click identifier derived from the raw click token.
//! - `browser_id`: the per-browser identifier sent alongside it.
//!
//! Every write is suppressed while the visitor has refused marketing consent,
//! and every read then comes back empty.

pub mod browser_id;
pub mod capture;
pub mod click_id;
pub mod store;

use std::time::Duration;

/// Lifetime of stored attribution data, matching the platforms' cookie window.
pub const ATTRIBUTION_TTL: Duration = Duration::from_secs(90 * 24 * 60 * 60);
