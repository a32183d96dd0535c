//! Currency conversion and shipping rules.
//!
//! Pure functions over a static rate snapshot and the market configuration.
//! Event values are computed here so the browser pixel and the server event
//! report identical amounts.

use crate::error::ConfigError;
use common::model::market::{Courier, Currency, Market};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

/// Exchange rates relative to a base currency: one unit of base buys
/// `rate(c)` units of `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    base: Currency,
    rates: [Decimal; Currency::COUNT],
}

impl RateTable {
    /// Builds a table that covers every supported currency. Gaps are rejected
    /// at startup so [`RateTable::convert`] only fails on overflow.
    pub fn new(base: Currency, rates: &HashMap<Currency, Decimal>) -> Result<Self, ConfigError> {
        let mut table = [Decimal::ONE; Currency::COUNT];
        for currency in Currency::ALL {
            let rate = if currency == base {
                rates.get(&currency).copied().unwrap_or(Decimal::ONE)
            } else {
                *rates.get(&currency).ok_or(ConfigError::MissingRate(currency))?
            };
            if rate <= Decimal::ZERO {
                return Err(ConfigError::NonPositiveRate(currency));
            }
            table[currency.index()] = rate;
        }
        Ok(Self { base, rates: table })
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    pub fn rate(&self, currency: Currency) -> Decimal {
        self.rates[currency.index()]
    }

    /// Converts through the base currency. The result is not rounded; `None`
    /// when it does not fit a `Decimal`.
    pub fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Option<Decimal> {
        if from == to {
            return Some(amount);
        }
        amount
            .checked_div(self.rate(from))?
            .checked_mul(self.rate(to))
    }
}

/// Rounds to the currency's minor units, midpoint away from zero, the same
/// rule the storefront applies in the browser.
pub fn round_money(amount: Decimal, currency: Currency) -> Decimal {
    amount.round_dp_with_strategy(currency.minor_units(), RoundingStrategy::MidpointAwayFromZero)
}

/// Zero once the order reaches the market's free-shipping threshold,
/// otherwise the courier's flat cost.
pub fn shipping_cost(order_total: Decimal, courier: &Courier, market: &Market) -> Decimal {
    if order_total >= market.free_shipping_threshold {
        Decimal::ZERO
    } else {
        courier.flat_cost
    }
}

pub fn amount_to_free_shipping(order_total: Decimal, market: &Market) -> Decimal {
    (market.free_shipping_threshold - order_total).max(Decimal::ZERO)
}
