//! TikTok Events API.
//!
//! `POST {endpoint}/open_api/v1.3/event/track/` authenticated by the
//! `Access-Token` header. The API answers 200 for most outcomes and reports
//! failure through a non-zero `code`.

use super::{classify_status, insert_opt, money, truncate, WireFormat, WireRequest};
use crate::capi::transport::TransportResponse;
use crate::capi::{AccessToken, DestinationConfig, DispatchError};
use crate::events::builder::ConversionEvent;
use common::model::event::EventName;
use serde_json::{json, Map, Value};

/// Business-level code TikTok uses for rate limiting.
const RATE_LIMITED: i64 = 40100;
/// Codes at or above this are TikTok-side failures.
const SERVER_ERROR_FLOOR: i64 = 50000;

pub struct TiktokFormat;

fn event_name(name: EventName) -> &'static str {
    match name {
        EventName::InitiateCheckout => "InitiateCheckout",
        EventName::Purchase => "CompletePayment",
    }
}

impl WireFormat for TiktokFormat {
    fn encode(
        &self,
        event: &ConversionEvent,
        destination: &DestinationConfig,
        pixel_id: &str,
        token: &AccessToken,
    ) -> WireRequest {
        let mut user = Map::new();
        insert_opt(&mut user, "email", event.customer.email.as_deref());
        insert_opt(&mut user, "phone", event.customer.phone.as_deref());
        insert_opt(&mut user, "external_id", event.customer.external_id.as_deref());
        insert_opt(&mut user, "ip", event.context.client_ip.as_deref());
        insert_opt(&mut user, "user_agent", event.context.user_agent.as_deref());

        let contents: Vec<Value> = event
            .line_items
            .iter()
            .map(|item| {
                json!({
                    "content_id": item.sku,
                    "content_name": item.name,
                    "quantity": item.quantity,
                    "price": money(item.unit_price),
                })
            })
            .collect();

        let mut data = json!({
            "event": event_name(event.event_name),
            "event_time": event.event_time,
            "event_id": event.event_id,
            "user": Value::Object(user),
            "properties": {
                "currency": event.currency.code(),
                "value": money(event.value),
                "content_type": "product",
                "contents": contents,
            },
        });
        if let Some(url) = event.context.source_url.as_deref() {
            data["page"] = json!({ "url": url });
        }

        let mut body = json!({
            "event_source": "web",
            "event_source_id": pixel_id,
            "data": [data],
        });
        if let Some(code) = destination.test_event_code.as_deref() {
            body["test_event_code"] = Value::from(code);
        }

        WireRequest {
            url: format!("{}/open_api/v1.3/event/track/", destination.endpoint()),
            headers: vec![("Access-Token".to_string(), token.expose().to_string())],
            body,
        }
    }

    fn classify(&self, response: &TransportResponse) -> Result<String, DispatchError> {
        let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
        let message = || {
            parsed
                .as_ref()
                .and_then(|v| v.get("message"))
                .and_then(Value::as_str)
                .map(truncate)
                .unwrap_or_else(|| truncate(&response.body))
        };
        if let Some(err) = classify_status(response.status, message) {
            return Err(err);
        }

        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(Value::as_i64);
        match code {
            Some(0) => Ok(parsed
                .as_ref()
                .and_then(|v| v.get("request_id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()),
            Some(code) if code == RATE_LIMITED || code >= SERVER_ERROR_FLOOR => Err(
                DispatchError::TransientDispatchFailure(format!("code {}: {}", code, message())),
            ),
            Some(code) => Err(DispatchError::DestinationRejected {
                status: response.status,
                message: format!("code {}: {}", code, message()),
            }),
            None => Err(DispatchError::DestinationRejected {
                status: response.status,
                message: format!("unreadable response: {}", message()),
            }),
        }
    }
}
