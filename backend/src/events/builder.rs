//! # Conversion Event Builder
//!
//! Turns order data from the order intake into a platform-agnostic
//! [`ConversionEvent`] plus the matching [`PixelEvent`] for the browser.
//!
//! ## Steps
//!
//! 1.  **Validation**: `event_name`, `currency` and either an explicit `value`
//!     or at least one line item are mandatory; an incomplete order fails with
//!     `MissingRequiredField` and no event exists. Negative amounts and totals
//!     too large to represent fail with `InvalidField`.
//!
//! 2.  **Value**: the order total (plus courier shipping when no explicit value
//!     is given) is converted into the market currency and rounded with the
//!     storefront rule, so the pixel and the server report the same number.
//!
//! 3.  **Event id**: the browser's id is reused verbatim when supplied;
//!     otherwise one is generated from the current time and a random UUID.
//!
//! 4.  **Snapshot**: attribution, click identifier and browser id are copied
//!     from the consent-gated stores as they are at build time.
//!
//! 5.  **Hashing**: contact fields are normalized and hashed; raw values never
//!     enter the event.

use crate::attribution::browser_id::BrowserIdStore;
use crate::attribution::click_id::ClickIdentifierStore;
use crate::attribution::store::AttributionStore;
use crate::error::EventError;
use crate::events::hashing::HashedCustomer;
use crate::pricing::{round_money, shipping_cost, RateTable};
use crate::storage::unix_now_ms;
use crate::visitor::VisitorId;
use common::model::attribution::AttributionRecord;
use common::model::event::{EventName, LineItem, PixelContent, PixelEvent};
use common::model::market::{Currency, Market};
use common::requests::OrderRequest;
use log::warn;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

const EVENT_ID_PATTERN: &str = r"^[A-Za-z0-9._:-]{1,128}$";

/// Request metadata forwarded to the platforms for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub source_url: Option<String>,
}

/// Everything the builder needs for one triggering action.
#[derive(Debug, Clone)]
pub struct OrderContext {
    pub order: OrderRequest,
    pub visitor: Option<VisitorId>,
    pub context: RequestContext,
}

/// A server-side conversion event. Amounts are in `currency`, the market's
/// currency; line item prices are converted the same way as `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub event_id: String,
    pub event_name: EventName,
    pub event_time: i64,
    pub market: String,
    pub currency: Currency,
    pub value: Decimal,
    pub line_items: Vec<LineItem>,
    pub customer: HashedCustomer,
    pub attribution: AttributionRecord,
    pub click_id: Option<String>,
    pub browser_id: Option<String>,
    pub context: RequestContext,
}

/// The two representations of one logical conversion.
#[derive(Debug, Clone)]
pub struct BuiltEvent {
    pub event: ConversionEvent,
    pub pixel: PixelEvent,
}

pub fn generate_event_id(now_ms: i64) -> String {
    format!("{}.{}", now_ms, Uuid::new_v4().simple())
}

fn is_valid_event_id(id: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(EVENT_ID_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(id))
}

pub struct EventBuilder {
    rates: RateTable,
    markets: HashMap<String, Market>,
    attribution: Arc<AttributionStore>,
    clicks: Arc<ClickIdentifierStore>,
    browser_ids: Arc<BrowserIdStore>,
}

impl EventBuilder {
    pub fn new(
        rates: RateTable,
        markets: HashMap<String, Market>,
        attribution: Arc<AttributionStore>,
        clicks: Arc<ClickIdentifierStore>,
        browser_ids: Arc<BrowserIdStore>,
    ) -> Self {
        Self {
            rates,
            markets,
            attribution,
            clicks,
            browser_ids,
        }
    }

    pub fn build(&self, ctx: OrderContext) -> Result<BuiltEvent, EventError> {
        let OrderContext {
            order,
            visitor,
            context,
        } = ctx;

        let event_name = order
            .event_name
            .ok_or(EventError::MissingRequiredField("event_name"))?;
        let currency = order
            .currency
            .ok_or(EventError::MissingRequiredField("currency"))?;
        if order.value.is_none() && order.line_items.is_empty() {
            return Err(EventError::MissingRequiredField("value"));
        }
        if order.value.is_some_and(|v| v < Decimal::ZERO) {
            return Err(EventError::InvalidField("value"));
        }
        if order
            .line_items
            .iter()
            .any(|item| item.unit_price < Decimal::ZERO)
        {
            return Err(EventError::InvalidField("line_items"));
        }
        let market = self
            .markets
            .get(&order.market)
            .ok_or_else(|| EventError::UnknownMarket(order.market.clone()))?;

        let value = self.event_value(&order, currency, market)?;
        let line_items = order
            .line_items
            .iter()
            .map(|item| {
                let price = self
                    .rates
                    .convert(item.unit_price, currency, market.currency)
                    .ok_or(EventError::InvalidField("line_items"))?;
                Ok(LineItem {
                    unit_price: round_money(price, market.currency),
                    ..item.clone()
                })
            })
            .collect::<Result<Vec<LineItem>, EventError>>()?;

        let now_ms = unix_now_ms();
        let event_id = match order.event_id.as_deref().map(str::trim) {
            Some(id) if is_valid_event_id(id) => id.to_string(),
            Some(_) => return Err(EventError::InvalidField("event_id")),
            None => generate_event_id(now_ms),
        };

        let (attribution, click_id, browser_id) = self.snapshot(visitor.as_ref());
        let customer = HashedCustomer::from_input(
            order.customer.as_ref(),
            visitor.as_ref().map(VisitorId::as_str),
        );

        let pixel = PixelEvent {
            event_name,
            event_id: event_id.clone(),
            currency: market.currency,
            value,
            contents: line_items
                .iter()
                .map(|item| PixelContent {
                    id: item.sku.clone(),
                    quantity: item.quantity,
                    item_price: item.unit_price,
                })
                .collect(),
        };

        let event = ConversionEvent {
            event_id,
            event_name,
            event_time: now_ms / 1000,
            market: market.code.clone(),
            currency: market.currency,
            value,
            line_items,
            customer,
            attribution,
            click_id,
            browser_id,
            context: RequestContext {
                source_url: order.source_url.or(context.source_url),
                ..context
            },
        };

        Ok(BuiltEvent { event, pixel })
    }

    pub fn market(&self, code: &str) -> Option<&Market> {
        self.markets.get(code)
    }

    fn event_value(
        &self,
        order: &OrderRequest,
        currency: Currency,
        market: &Market,
    ) -> Result<Decimal, EventError> {
        let native = market.currency;
        let overflow = EventError::InvalidField("line_items");
        let amount = match order.value {
            Some(value) => self
                .rates
                .convert(value, currency, native)
                .ok_or(EventError::InvalidField("value"))?,
            None => {
                let items = order
                    .line_items
                    .iter()
                    .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.total()?))
                    .ok_or(overflow.clone())?;
                let subtotal = self
                    .rates
                    .convert(items, currency, native)
                    .ok_or(overflow.clone())?;
                let shipping = match order.courier.as_deref() {
                    Some(id) => {
                        let courier =
                            market
                                .courier(id)
                                .ok_or_else(|| EventError::UnknownCourier {
                                    market: market.code.clone(),
                                    courier: id.to_string(),
                                })?;
                        shipping_cost(subtotal, courier, market)
                    }
                    None => Decimal::ZERO,
                };
                subtotal.checked_add(shipping).ok_or(overflow)?
            }
        };
        Ok(round_money(amount, native))
    }

    /// Store failures degrade to an unattributed event rather than failing
    /// the build.
    fn snapshot(
        &self,
        visitor: Option<&VisitorId>,
    ) -> (AttributionRecord, Option<String>, Option<String>) {
        let Some(visitor) = visitor else {
            return (AttributionRecord::default(), None, None);
        };
        let attribution = self.attribution.load(visitor).unwrap_or_else(|e| {
            warn!("attribution unavailable for visitor {}: {}", visitor, e);
            AttributionRecord::default()
        });
        let click_id = match self.clicks.get(visitor) {
            Ok(id) => id.map(|c| c.value),
            Err(e) => {
                warn!("click identifier unavailable for visitor {}: {}", visitor, e);
                None
            }
        };
        let browser_id = self.browser_ids.get(visitor).unwrap_or_else(|e| {
            warn!("browser id unavailable for visitor {}: {}", visitor, e);
            None
        });
        (attribution, click_id, browser_id)
    }
}
