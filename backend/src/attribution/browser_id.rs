//! Per-browser identifier sent with server events (`fbp`-style).
//!
//! Created once, on the first marketing-consented touch, as
//! `fb.1.{created_ms}.{10 random digits}` and reused afterwards.

use super::ATTRIBUTION_TTL;
use crate::consent::{ConsentStore, GateOutcome};
use crate::error::StoreError;
use crate::storage::{unix_now_ms, visitor_key, KeyValueStore};
use crate::visitor::VisitorId;
use rand::Rng;
use std::sync::Arc;

const NAMESPACE: &str = "browser_id";

pub fn generate_browser_id(now_ms: i64) -> String {
    let random: u64 = rand::thread_rng().gen_range(1_000_000_000..10_000_000_000);
    format!("fb.1.{}.{}", now_ms, random)
}

pub struct BrowserIdStore {
    kv: Arc<dyn KeyValueStore>,
    consent: Arc<ConsentStore>,
}

impl BrowserIdStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, consent: Arc<ConsentStore>) -> Self {
        Self { kv, consent }
    }

    /// Returns the visitor's browser id, creating it if needed.
    pub fn ensure(&self, visitor: &VisitorId) -> Result<GateOutcome<Option<String>>, StoreError> {
        if !self.consent.marketing_allowed(visitor)? {
            return Ok(GateOutcome::ConsentBlocked(None));
        }
        let key = visitor_key(NAMESPACE, visitor);
        if let Some(existing) = self.kv.get(&key)? {
            return Ok(GateOutcome::Applied(Some(existing)));
        }
        let id = generate_browser_id(unix_now_ms());
        self.kv.put(&key, &id, Some(ATTRIBUTION_TTL))?;
        Ok(GateOutcome::Applied(Some(id)))
    }

    /// The stored browser id, hidden while marketing consent is refused.
    pub fn get(&self, visitor: &VisitorId) -> Result<Option<String>, StoreError> {
        if !self.consent.marketing_allowed(visitor)? {
            return Ok(None);
        }
        self.kv.get(&visitor_key(NAMESPACE, visitor))
    }

    pub(crate) fn is_stored(&self, visitor: &VisitorId) -> Result<bool, StoreError> {
        Ok(self.kv.get(&visitor_key(NAMESPACE, visitor))?.is_some())
    }
}
