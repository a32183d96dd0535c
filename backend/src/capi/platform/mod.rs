//! Wire formats of the supported ad platforms.
//!
//! Each platform implements [`WireFormat`]: it turns a [`ConversionEvent`]
//! into the HTTP request its ingestion API expects and classifies the
//! response. The schemas are owned and versioned by the platforms.

pub mod meta;
pub mod tiktok;

use super::transport::TransportResponse;
use super::{AccessToken, DestinationConfig, DispatchError};
use crate::events::builder::ConversionEvent;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest platform error message kept for logs.
const MAX_MESSAGE_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meta,
    Tiktok,
}

impl Platform {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Platform::Meta => "https://graph.facebook.com",
            Platform::Tiktok => "https://business-api.tiktok.com",
        }
    }

    pub fn format(self) -> &'static dyn WireFormat {
        match self {
            Platform::Meta => &meta::MetaFormat,
            Platform::Tiktok => &tiktok::TiktokFormat,
        }
    }
}

/// A fully encoded outbound call. Not `Debug`: URL, headers and body may carry
/// the access token.
#[derive(Clone)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

pub trait WireFormat: Send + Sync {
    fn encode(
        &self,
        event: &ConversionEvent,
        destination: &DestinationConfig,
        pixel_id: &str,
        token: &AccessToken,
    ) -> WireRequest;

    /// Accepted responses yield the platform's trace/request id.
    fn classify(&self, response: &TransportResponse) -> Result<String, DispatchError>;
}

pub(crate) fn money(amount: Decimal) -> Value {
    Value::from(amount.to_f64().unwrap_or_default())
}

pub(crate) fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::from(value));
    }
}

/// Status-based classification shared by the platforms: 429 and 5xx are
/// worth retrying, any other non-2xx is a rejection.
pub(crate) fn classify_status(
    status: u16,
    message: impl FnOnce() -> String,
) -> Option<DispatchError> {
    match status {
        200..=299 => None,
        429 | 500..=599 => Some(DispatchError::TransientDispatchFailure(format!(
            "status {}: {}",
            status,
            message()
        ))),
        _ => Some(DispatchError::DestinationRejected {
            status,
            message: message(),
        }),
    }
}

pub(crate) fn truncate(message: &str) -> String {
    message.chars().take(MAX_MESSAGE_CHARS).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::events::builder::{ConversionEvent, RequestContext};
    use crate::events::hashing::{sha256_hex, HashedCustomer};
    use common::model::attribution::AttributionRecord;
    use common::model::event::{EventName, LineItem};
    use common::model::market::Currency;
    use rust_decimal::Decimal;

    pub(crate) fn sample_event() -> ConversionEvent {
        ConversionEvent {
            event_id: "1700000000000.abc".into(),
            event_name: EventName::Purchase,
            event_time: 1_700_000_000,
            market: "cz".into(),
            currency: Currency::Czk,
            value: Decimal::new(489050, 2),
            line_items: vec![LineItem {
                sku: "BED-1".into(),
                name: "Bed".into(),
                quantity: 2,
                unit_price: Decimal::new(2250, 0),
            }],
            customer: HashedCustomer {
                email: Some(sha256_hex("jane@example.com")),
                phone: Some(sha256_hex("420777123456")),
                external_id: Some(sha256_hex("visitor")),
                ..Default::default()
            },
            attribution: AttributionRecord {
                campaign_id: Some("spring".into()),
                ..Default::default()
            },
            click_id: Some("fb.1.1700000000000.abc123".into()),
            browser_id: Some("fb.1.1700000000000.1234567890".into()),
            context: RequestContext {
                client_ip: Some("203.0.113.7".into()),
                user_agent: Some("Mozilla/5.0".into()),
                source_url: Some("https://shop.example/cz/checkout".into()),
            },
        }
    }
}
