use crate::model::market::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversion events the storefront reports to ad platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    InitiateCheckout,
    Purchase,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::InitiateCheckout => "InitiateCheckout",
            EventName::Purchase => "Purchase",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cart line as supplied by the order intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    /// `None` when the product does not fit a `Decimal`.
    pub fn total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// A line of the pixel payload, priced in the event currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelContent {
    pub id: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub item_price: Decimal,
}

/// The browser-side half of a conversion.
///
/// The client passes `event_id` to its pixel call verbatim so the platform can
/// fold it together with the server-side event carrying the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelEvent {
    pub event_name: EventName,
    pub event_id: String,
    pub currency: Currency,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    pub contents: Vec<PixelContent>,
}
