//! Consent store.
//!
//! Persists each visitor's [`ConsentState`] through the key-value port and
//! fans every change out to subscribers synchronously, before `set` returns,
//! so dependents re-evaluate gating in the same turn.
//!
//! Policy: a visitor without a record has not been asked yet and is treated as
//! having implied marketing consent. Once a record exists its `marketing` flag
//! decides.

use crate::error::StoreError;
use crate::storage::{get_json, put_json, visitor_key, KeyValueStore};
use crate::visitor::VisitorId;
use common::model::consent::ConsentState;
use std::sync::{Arc, RwLock};
use std::time::Duration;

const NAMESPACE: &str = "consent";
pub const CONSENT_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub type ConsentListener = Box<dyn Fn(&VisitorId, &ConsentState) + Send + Sync>;

/// Result of a consent-gated write.
///
/// `ConsentBlocked` is not an error: the data was seen but may not be kept.
/// Both variants carry the state the caller should continue with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<T> {
    Applied(T),
    ConsentBlocked(T),
}

impl<T> GateOutcome<T> {
    pub fn is_blocked(&self) -> bool {
        matches!(self, GateOutcome::ConsentBlocked(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            GateOutcome::Applied(v) | GateOutcome::ConsentBlocked(v) => v,
        }
    }
}

pub struct ConsentStore {
    kv: Arc<dyn KeyValueStore>,
    listeners: RwLock<Vec<ConsentListener>>,
}

impl ConsentStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn get(&self, visitor: &VisitorId) -> Result<Option<ConsentState>, StoreError> {
        get_json(self.kv.as_ref(), &visitor_key(NAMESPACE, visitor))
    }

    /// Persists `state`, then notifies every subscriber in registration order.
    pub fn set(&self, visitor: &VisitorId, state: ConsentState) -> Result<(), StoreError> {
        put_json(
            self.kv.as_ref(),
            &visitor_key(NAMESPACE, visitor),
            &state,
            Some(CONSENT_TTL),
        )?;

        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(visitor, &state);
        }
        Ok(())
    }

    /// True iff the visitor has already answered the prompt once.
    pub fn requires_explicit_consent(&self, visitor: &VisitorId) -> Result<bool, StoreError> {
        Ok(self.get(visitor)?.is_some())
    }

    pub fn marketing_allowed(&self, visitor: &VisitorId) -> Result<bool, StoreError> {
        Ok(ConsentState::marketing_allowed(self.get(visitor)?.as_ref()))
    }

    pub fn subscribe(&self, listener: ConsentListener) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use std::sync::Mutex;

    fn store() -> ConsentStore {
        ConsentStore::new(Arc::new(MemoryKeyValueStore::new()))
    }

    const DENY: ConsentState = ConsentState {
        necessary: true,
        marketing: false,
    };

    #[test]
    fn absent_record_is_implied_consent() {
        let consent = store();
        let visitor = VisitorId::generate();
        assert_eq!(consent.get(&visitor).unwrap(), None);
        assert!(consent.marketing_allowed(&visitor).unwrap());
        assert!(!consent.requires_explicit_consent(&visitor).unwrap());
    }

    #[test]
    fn recorded_refusal_blocks_marketing() {
        let consent = store();
        let visitor = VisitorId::generate();
        consent.set(&visitor, DENY).unwrap();
        assert_eq!(consent.get(&visitor).unwrap(), Some(DENY));
        assert!(!consent.marketing_allowed(&visitor).unwrap());
        assert!(consent.requires_explicit_consent(&visitor).unwrap());
    }

    #[test]
    fn set_notifies_subscribers_before_returning() {
        let consent = store();
        let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        consent.subscribe(Box::new(move |visitor: &VisitorId, state: &ConsentState| {
            sink.lock()
                .unwrap()
                .push((visitor.as_str().to_string(), state.marketing));
        }));

        let visitor = VisitorId::generate();
        consent.set(&visitor, DENY).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(visitor.as_str().to_string(), false)]);
    }

    #[test]
    fn subscribers_observe_persisted_state() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let consent = ConsentStore::new(kv.clone());
        let observed = Arc::new(Mutex::new(None));
        let sink = observed.clone();
        consent.subscribe(Box::new(move |visitor: &VisitorId, _: &ConsentState| {
            let stored: Option<ConsentState> =
                get_json(kv.as_ref(), &visitor_key(NAMESPACE, visitor)).unwrap();
            *sink.lock().unwrap() = stored;
        }));

        let visitor = VisitorId::generate();
        consent.set(&visitor, DENY).unwrap();
        assert_eq!(*observed.lock().unwrap(), Some(DENY));
    }

    #[test]
    fn visitors_are_isolated() {
        let consent = store();
        let a = VisitorId::generate();
        let b = VisitorId::generate();
        consent.set(&a, DENY).unwrap();
        assert!(consent.marketing_allowed(&b).unwrap());
    }
}
