use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO 4217 currencies the storefront sells in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Czk,
    Eur,
    Pln,
    Huf,
    Ron,
    Usd,
}

impl Currency {
    pub const COUNT: usize = 6;

    pub const ALL: [Currency; Currency::COUNT] = [
        Currency::Czk,
        Currency::Eur,
        Currency::Pln,
        Currency::Huf,
        Currency::Ron,
        Currency::Usd,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Czk => "CZK",
            Currency::Eur => "EUR",
            Currency::Pln => "PLN",
            Currency::Huf => "HUF",
            Currency::Ron => "RON",
            Currency::Usd => "USD",
        }
    }

    /// Decimal places used when an amount is reported in this currency.
    pub fn minor_units(self) -> u32 {
        match self {
            Currency::Huf => 0,
            _ => 2,
        }
    }

    /// Position of the currency in [`Currency::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A delivery option with a flat price in its market's currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Courier {
    pub id: String,
    pub flat_cost: Decimal,
}

/// Per-country storefront configuration.
///
/// `free_shipping_threshold` and every courier cost are denominated in
/// `currency`, which is also the currency conversion events are reported in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub code: String,
    pub currency: Currency,
    pub free_shipping_threshold: Decimal,
    #[serde(default)]
    pub couriers: Vec<Courier>,
}

impl Market {
    pub fn courier(&self, id: &str) -> Option<&Courier> {
        self.couriers.iter().find(|c| c.id == id)
    }
}
