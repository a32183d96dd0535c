use crate::model::attribution::AttributionRecord;
use crate::model::consent::ConsentState;
use crate::model::event::{EventName, LineItem};
use crate::model::market::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload of `POST /api/consent`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct UpdateConsentRequest {
    pub necessary: bool,
    pub marketing: bool,
}

impl From<UpdateConsentRequest> for ConsentState {
    fn from(req: UpdateConsentRequest) -> Self {
        ConsentState {
            necessary: req.necessary,
            marketing: req.marketing,
        }
    }
}

/// Response of the consent endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsentResponse {
    pub consent: Option<ConsentState>,
    pub requires_explicit_consent: bool,
}

/// Payload of `POST /api/attribution/touch`, sent by the page on load.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TouchRequest {
    pub page_url: String,
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Response of `POST /api/attribution/touch`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TouchResponse {
    pub attribution: AttributionRecord,
    pub consent_blocked: bool,
}

/// Raw contact details typed by the customer at checkout.
///
/// These values are hashed before they leave the backend; `Debug` never
/// prints them.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct CustomerInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl fmt::Debug for CustomerInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |v: &Option<String>| if v.is_some() { "<set>" } else { "<none>" };
        f.debug_struct("CustomerInput")
            .field("email", &mark(&self.email))
            .field("phone", &mark(&self.phone))
            .field("first_name", &mark(&self.first_name))
            .field("last_name", &mark(&self.last_name))
            .field("city", &mark(&self.city))
            .field("zip", &mark(&self.zip))
            .field("country", &mark(&self.country))
            .finish()
    }
}

/// Payload of `POST /api/events/checkout` and `POST /api/events/purchase`.
///
/// `event_id` should be generated by the browser when the customer acts, so
/// the same id reaches both the pixel and the server. When omitted the
/// backend generates one and returns it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_name: Option<EventName>,
    pub market: String,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerInput>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Response of `GET /api/pricing/shipping`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShippingQuote {
    pub market: String,
    pub courier: String,
    pub currency: Currency,
    pub shipping_cost: Decimal,
    pub amount_to_free_shipping: Decimal,
}
