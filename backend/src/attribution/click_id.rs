//! Click identifier derived from the ad platform's click token.
//!
//! The raw token arrives once in the landing URL (`fbclid=…`). It is turned
//! into `fb.1.{first_seen_ms}.{token}` and stored; later visits only need the
//! stored value. Writes are idempotent on the token: the same token never
//! rewrites the identifier, a different token replaces it.

use super::ATTRIBUTION_TTL;
use crate::consent::ConsentStore;
use crate::error::StoreError;
use crate::storage::{get_json, put_json, unix_now_ms, visitor_key, KeyValueStore};
use crate::visitor::VisitorId;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const NAMESPACE: &str = "click_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickIdentifier {
    pub raw_token: String,
    pub value: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickInit {
    Written(ClickIdentifier),
    Unchanged(ClickIdentifier),
    NoToken,
    ConsentBlocked,
}

pub fn derive_click_identifier(raw_token: &str, now_ms: i64) -> String {
    format!("fb.1.{}.{}", now_ms, raw_token)
}

pub struct ClickIdentifierStore {
    kv: Arc<dyn KeyValueStore>,
    consent: Arc<ConsentStore>,
}

impl ClickIdentifierStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, consent: Arc<ConsentStore>) -> Self {
        Self { kv, consent }
    }

    pub fn initialize(
        &self,
        visitor: &VisitorId,
        raw_token: Option<&str>,
    ) -> Result<ClickInit, StoreError> {
        let Some(raw_token) = raw_token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(ClickInit::NoToken);
        };
        if !self.consent.marketing_allowed(visitor)? {
            debug!("click identifier suppressed for visitor {}: no marketing consent", visitor);
            return Ok(ClickInit::ConsentBlocked);
        }

        let key = visitor_key(NAMESPACE, visitor);
        if let Some(existing) = get_json::<ClickIdentifier>(self.kv.as_ref(), &key)? {
            if existing.raw_token == raw_token {
                return Ok(ClickInit::Unchanged(existing));
            }
        }

        let now_ms = unix_now_ms();
        let identifier = ClickIdentifier {
            raw_token: raw_token.to_string(),
            value: derive_click_identifier(raw_token, now_ms),
            created_at_ms: now_ms,
        };
        put_json(self.kv.as_ref(), &key, &identifier, Some(ATTRIBUTION_TTL))?;
        Ok(ClickInit::Written(identifier))
    }

    /// The stored identifier, hidden while marketing consent is refused.
    pub fn get(&self, visitor: &VisitorId) -> Result<Option<ClickIdentifier>, StoreError> {
        if !self.consent.marketing_allowed(visitor)? {
            return Ok(None);
        }
        get_json(self.kv.as_ref(), &visitor_key(NAMESPACE, visitor))
    }

    pub(crate) fn is_stored(&self, visitor: &VisitorId) -> Result<bool, StoreError> {
        Ok(self.kv.get(&visitor_key(NAMESPACE, visitor))?.is_some())
    }
}
