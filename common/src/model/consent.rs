use serde::{Deserialize, Serialize};

/// A visitor's recorded answer to the consent prompt.
///
/// Absence of a `ConsentState` means the visitor has not been asked yet,
/// which is different from a recorded refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentState {
    pub necessary: bool,
    pub marketing: bool,
}

impl ConsentState {
    /// Resolves the marketing verdict for a possibly absent record.
    ///
    /// No record means implied consent; once a record exists its `marketing`
    /// flag is authoritative.
    pub fn marketing_allowed(state: Option<&ConsentState>) -> bool {
        state.is_none_or(|s| s.marketing)
    }
}
