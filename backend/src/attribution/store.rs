use super::ATTRIBUTION_TTL;
use crate::consent::{ConsentStore, GateOutcome};
use crate::error::StoreError;
use crate::storage::{get_json, put_json, visitor_key, KeyValueStore};
use crate::visitor::VisitorId;
use common::model::attribution::{AttributionRecord, AttributionUpdate};
use log::debug;
use std::sync::Arc;

const NAMESPACE: &str = "attribution";

/// Per-visitor attribution record, persisted subject to marketing consent.
pub struct AttributionStore {
    kv: Arc<dyn KeyValueStore>,
    consent: Arc<ConsentStore>,
}

impl AttributionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, consent: Arc<ConsentStore>) -> Self {
        Self { kv, consent }
    }

    /// The visitor's current record, or the default record when nothing is
    /// stored or marketing consent has been refused.
    pub fn load(&self, visitor: &VisitorId) -> Result<AttributionRecord, StoreError> {
        if !self.consent.marketing_allowed(visitor)? {
            return Ok(AttributionRecord::default());
        }
        self.stored(visitor)
    }

    /// Merges `update` over the stored record and persists the result.
    ///
    /// Under refused marketing consent nothing is written and the stored
    /// record comes back unchanged as `ConsentBlocked`.
    pub fn merge(
        &self,
        visitor: &VisitorId,
        update: &AttributionUpdate,
    ) -> Result<GateOutcome<AttributionRecord>, StoreError> {
        let current = self.stored(visitor)?;
        if !self.consent.marketing_allowed(visitor)? {
            debug!("attribution merge suppressed for visitor {}: no marketing consent", visitor);
            return Ok(GateOutcome::ConsentBlocked(current));
        }
        if update.is_empty() {
            return Ok(GateOutcome::Applied(current));
        }

        let merged = current.merged(update);
        put_json(
            self.kv.as_ref(),
            &visitor_key(NAMESPACE, visitor),
            &merged,
            Some(ATTRIBUTION_TTL),
        )?;
        Ok(GateOutcome::Applied(merged))
    }

    /// Raw stored record regardless of consent. Only for operator diagnostics,
    /// which redact it before display.
    pub(crate) fn stored(&self, visitor: &VisitorId) -> Result<AttributionRecord, StoreError> {
        Ok(get_json(self.kv.as_ref(), &visitor_key(NAMESPACE, visitor))?.unwrap_or_default())
    }
}
