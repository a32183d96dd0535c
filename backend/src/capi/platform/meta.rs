//! Meta Conversions API.
//!
//! `POST {endpoint}/{api_version}/{pixel_id}/events` with the access token in
//! the body. A 2xx response reports `events_received`; errors carry
//! `error.message`.

use super::{classify_status, insert_opt, money, truncate, WireFormat, WireRequest};
use crate::capi::transport::TransportResponse;
use crate::capi::{AccessToken, DestinationConfig, DispatchError};
use crate::events::builder::ConversionEvent;
use serde_json::{json, Map, Value};

pub struct MetaFormat;

impl WireFormat for MetaFormat {
    fn encode(
        &self,
        event: &ConversionEvent,
        destination: &DestinationConfig,
        pixel_id: &str,
        token: &AccessToken,
    ) -> WireRequest {
        let customer = &event.customer;
        let mut user_data = Map::new();
        // Meta expects hashed identifiers as single-element arrays.
        for (key, hash) in [
            ("em", &customer.email),
            ("ph", &customer.phone),
            ("fn", &customer.first_name),
            ("ln", &customer.last_name),
            ("ct", &customer.city),
            ("zp", &customer.zip),
            ("country", &customer.country),
            ("external_id", &customer.external_id),
        ] {
            if let Some(hash) = hash {
                user_data.insert(key.to_string(), json!([hash]));
            }
        }
        insert_opt(&mut user_data, "client_ip_address", event.context.client_ip.as_deref());
        insert_opt(&mut user_data, "client_user_agent", event.context.user_agent.as_deref());
        insert_opt(&mut user_data, "fbc", event.click_id.as_deref());
        insert_opt(&mut user_data, "fbp", event.browser_id.as_deref());

        let mut custom_data = Map::new();
        custom_data.insert("currency".into(), Value::from(event.currency.code()));
        custom_data.insert("value".into(), money(event.value));
        custom_data.insert("content_type".into(), Value::from("product"));
        custom_data.insert(
            "contents".into(),
            Value::Array(
                event
                    .line_items
                    .iter()
                    .map(|item| {
                        json!({
                            "id": item.sku,
                            "quantity": item.quantity,
                            "item_price": money(item.unit_price),
                        })
                    })
                    .collect(),
            ),
        );
        custom_data.insert(
            "num_items".into(),
            Value::from(event.line_items.iter().map(|i| u64::from(i.quantity)).sum::<u64>()),
        );
        let attribution = &event.attribution;
        insert_opt(&mut custom_data, "campaign_id", attribution.campaign_id.as_deref());
        insert_opt(&mut custom_data, "adset_id", attribution.adset_id.as_deref());
        insert_opt(&mut custom_data, "ad_id", attribution.ad_id.as_deref());
        insert_opt(&mut custom_data, "affiliate_id", attribution.affiliate_id.as_deref());
        custom_data.insert("medium".into(), Value::from(attribution.medium.as_str()));

        let mut data = Map::new();
        data.insert("event_name".into(), Value::from(event.event_name.as_str()));
        data.insert("event_time".into(), Value::from(event.event_time));
        data.insert("event_id".into(), Value::from(event.event_id.as_str()));
        data.insert("action_source".into(), Value::from("website"));
        insert_opt(&mut data, "event_source_url", event.context.source_url.as_deref());
        data.insert("user_data".into(), Value::Object(user_data));
        data.insert("custom_data".into(), Value::Object(custom_data));

        let mut body = Map::new();
        body.insert("data".into(), Value::Array(vec![Value::Object(data)]));
        body.insert("access_token".into(), Value::from(token.expose()));
        insert_opt(&mut body, "test_event_code", destination.test_event_code.as_deref());

        WireRequest {
            url: format!(
                "{}/{}/{}/events",
                destination.endpoint(),
                destination.api_version,
                pixel_id
            ),
            headers: Vec::new(),
            body: Value::Object(body),
        }
    }

    fn classify(&self, response: &TransportResponse) -> Result<String, DispatchError> {
        let parsed: Option<Value> = serde_json::from_str(&response.body).ok();
        let message = || {
            parsed
                .as_ref()
                .and_then(|v| v.pointer("/error/message"))
                .and_then(Value::as_str)
                .map(truncate)
                .unwrap_or_else(|| truncate(&response.body))
        };
        if let Some(err) = classify_status(response.status, message) {
            return Err(err);
        }

        let received = parsed
            .as_ref()
            .and_then(|v| v.get("events_received"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if received == 0 {
            return Err(DispatchError::DestinationRejected {
                status: response.status,
                message: "no events received".to_string(),
            });
        }
        Ok(parsed
            .as_ref()
            .and_then(|v| v.get("fbtrace_id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}
