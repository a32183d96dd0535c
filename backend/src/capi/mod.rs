//! # Conversions API (CAPI) dispatch
//!
//! Sends built conversion events to ad-platform server-side ingestion
//! endpoints. Each configured destination (one pixel on one platform) is
//! attempted independently: there is no transaction across destinations and
//! one failing destination never prevents the others from being tried.
//!
//! ## Sub-modules:
//! - `platform`: per-platform wire encoding and response classification.
//! - `transport`: the outbound HTTP seam (`reqwest` in production).
//! - `dispatcher`: concurrent fan-out with a bounded timeout per destination.
//! - `retry`: the optional retry policy layered outside the dispatcher.
//!
//! ## Outcomes
//!
//! Every destination yields exactly one [`DispatchResult`]:
//! - accepted, carrying the platform's trace/request id;
//! - `ConfigurationError`: pixel or token missing, nothing was sent;
//! - `DestinationRejected`: the platform understood and declined, never retried;
//! - `TransientDispatchFailure`: network error, timeout, 429 or 5xx.

pub mod dispatcher;
pub mod platform;
pub mod retry;
pub mod transport;

use platform::Platform;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_META_API_VERSION: &str = "v19.0";

/// Platform access token. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// One pixel on one platform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DestinationConfig {
    pub id: String,
    pub platform: Platform,
    #[serde(default)]
    pub pixel_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    /// Overrides the platform's public endpoint (proxies, tests).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Market codes served by this pixel; empty serves every market.
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default)]
    pub test_event_code: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_version() -> String {
    DEFAULT_META_API_VERSION.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl DestinationConfig {
    pub fn new(id: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: id.into(),
            platform,
            pixel_id: None,
            access_token: None,
            endpoint: None,
            api_version: default_api_version(),
            markets: Vec::new(),
            test_event_code: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(self.platform.default_endpoint())
            .trim_end_matches('/')
    }

    pub fn serves_market(&self, market: &str) -> bool {
        self.markets.is_empty() || self.markets.iter().any(|m| m == market)
    }

    /// Pixel id and token when both are present and non-blank, otherwise the
    /// name of the first missing setting.
    pub fn credentials(&self) -> Result<(&str, &AccessToken), &'static str> {
        let pixel_id = self
            .pixel_id
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or("pixel_id")?;
        let token = self
            .access_token
            .as_ref()
            .filter(|t| !t.expose().trim().is_empty())
            .ok_or("access_token")?;
        Ok((pixel_id, token))
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }
}

/// Destinations whose market filter matches `market`.
pub fn destinations_for(all: &[DestinationConfig], market: &str) -> Vec<DestinationConfig> {
    all.iter()
        .filter(|d| d.serves_market(market))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("destination not configured: missing {0}")]
    ConfigurationError(String),
    #[error("rejected by platform (status {status}): {message}")]
    DestinationRejected { status: u16, message: String },
    #[error("transient failure: {0}")]
    TransientDispatchFailure(String),
}

/// Outcome of sending one event to one destination. Only logged, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub destination_id: String,
    pub event_id: String,
    /// The platform's trace or request id when accepted.
    pub outcome: Result<String, DispatchError>,
}

impl DispatchResult {
    pub fn accepted(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self.outcome,
            Err(DispatchError::TransientDispatchFailure(_))
        )
    }

    pub fn platform_event_id(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_parses_with_defaults() {
        let dest: DestinationConfig = serde_json::from_str(
            r#"{"id":"meta-cz","platform":"meta","pixel_id":"123","access_token":"secret"}"#,
        )
        .unwrap();
        assert_eq!(dest.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(dest.api_version, DEFAULT_META_API_VERSION);
        assert_eq!(dest.endpoint(), "https://graph.facebook.com");
        assert!(dest.is_configured());
        assert!(!format!("{dest:?}").contains("secret"));
    }

    #[test]
    fn credentials_name_the_missing_setting() {
        let mut dest = DestinationConfig::new("d", Platform::Meta);
        assert_eq!(dest.credentials().unwrap_err(), "pixel_id");
        dest.pixel_id = Some("123".into());
        dest.access_token = Some(AccessToken::new("  "));
        assert_eq!(dest.credentials().unwrap_err(), "access_token");
    }

    #[test]
    fn market_filter_selects_destinations() {
        let mut cz = DestinationConfig::new("cz", Platform::Meta);
        cz.markets = vec!["cz".into()];
        let global = DestinationConfig::new("all", Platform::Tiktok);
        let all = vec![cz, global];

        let ids = |market: &str| -> Vec<String> {
            destinations_for(&all, market)
                .into_iter()
                .map(|d| d.id)
                .collect()
        };
        assert_eq!(ids("cz"), vec!["cz", "all"]);
        assert_eq!(ids("sk"), vec!["all"]);
    }
}
