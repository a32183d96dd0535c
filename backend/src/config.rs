//! Startup configuration.
//!
//! Loaded once from a JSON file (path in `ATTRIBUTION_CONFIG`, default
//! `attribution.json`; a missing file means built-in defaults), then
//! overridden from the environment. Access tokens are normally supplied only
//! through `CAPI_TOKEN_<DESTINATION_ID>` so secrets stay out of the file.

use crate::attribution::capture::ParameterMapping;
use crate::capi::retry::RetryPolicy;
use crate::capi::{AccessToken, DestinationConfig};
use crate::error::ConfigError;
use crate::pricing::RateTable;
use common::model::market::{Courier, Currency, Market};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const CONFIG_PATH_VAR: &str = "ATTRIBUTION_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "attribution.json";
const TOKEN_VAR_PREFIX: &str = "CAPI_TOKEN_";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// `GET /api/diagnostics` is disabled while this is unset.
    pub diagnostics_token: Option<String>,
    pub base_currency: Currency,
    pub rates: HashMap<Currency, Decimal>,
    pub markets: Vec<Market>,
    pub destinations: Vec<DestinationConfig>,
    pub retry: RetryPolicy,
    pub parameter_mapping: ParameterMapping,
    pub dispatch_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: "attribution.sqlite".to_string(),
            diagnostics_token: None,
            base_currency: Currency::Czk,
            rates: default_rates(),
            markets: default_markets(),
            destinations: Vec::new(),
            retry: RetryPolicy::default(),
            parameter_mapping: ParameterMapping::default(),
            dispatch_queue_capacity: 100,
        }
    }
}

fn default_rates() -> HashMap<Currency, Decimal> {
    HashMap::from([
        (Currency::Czk, Decimal::ONE),
        (Currency::Eur, Decimal::new(4, 2)),
        (Currency::Pln, Decimal::new(17, 2)),
        (Currency::Huf, Decimal::new(156, 1)),
        (Currency::Ron, Decimal::new(2, 1)),
        (Currency::Usd, Decimal::new(43, 3)),
    ])
}

fn market(code: &str, currency: Currency, threshold: i64, couriers: &[(&str, i64)]) -> Market {
    Market {
        code: code.to_string(),
        currency,
        free_shipping_threshold: Decimal::from(threshold),
        couriers: couriers
            .iter()
            .map(|(id, cost)| Courier {
                id: id.to_string(),
                flat_cost: Decimal::from(*cost),
            })
            .collect(),
    }
}

fn default_markets() -> Vec<Market> {
    vec![
        market("cz", Currency::Czk, 5000, &[("ppl", 390), ("zasilkovna", 89)]),
        market("sk", Currency::Eur, 200, &[("ppl", 16), ("packeta", 4)]),
        market("pl", Currency::Pln, 850, &[("inpost", 69)]),
        market("hu", Currency::Huf, 78000, &[("gls", 6000)]),
        market("ro", Currency::Ron, 1000, &[("fan", 80)]),
    ]
}

impl Config {
    /// Reads the config file named by `ATTRIBUTION_CONFIG` and applies the
    /// process environment on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env_string(CONFIG_PATH_VAR).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_overrides(env_string)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Applies `HOST`, `PORT`, `ATTRIBUTION_DB`, `DIAGNOSTICS_TOKEN` and one
    /// `CAPI_TOKEN_<ID>` per destination, as resolved by `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT".to_string(),
                value: port,
            })?;
        }
        if let Some(path) = lookup("ATTRIBUTION_DB") {
            self.database_path = path;
        }
        if let Some(token) = lookup("DIAGNOSTICS_TOKEN") {
            self.diagnostics_token = Some(token);
        }
        for destination in &mut self.destinations {
            if let Some(token) = lookup(&token_var(&destination.id)) {
                destination.access_token = Some(AccessToken::new(token));
            }
        }
        Ok(())
    }

    pub fn rate_table(&self) -> Result<RateTable, ConfigError> {
        RateTable::new(self.base_currency, &self.rates)
    }

    pub fn markets_by_code(&self) -> Result<HashMap<String, Market>, ConfigError> {
        let mut markets = HashMap::with_capacity(self.markets.len());
        for market in &self.markets {
            if markets
                .insert(market.code.clone(), market.clone())
                .is_some()
            {
                return Err(ConfigError::DuplicateMarket(market.code.clone()));
            }
        }
        Ok(markets)
    }
}

/// `meta-cz` reads its token from `CAPI_TOKEN_META_CZ`.
pub fn token_var(destination_id: &str) -> String {
    let suffix: String = destination_id
        .chars()
        .map(|c| match c {
            '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    format!("{TOKEN_VAR_PREFIX}{suffix}")
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
