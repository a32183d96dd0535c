use serde::{Deserialize, Serialize};

/// Medium recorded for direct or otherwise unattributed traffic.
pub const DEFAULT_MEDIUM: &str = "website";

/// Number of leading characters kept when an identifier is redacted.
const REDACTED_PREFIX_LEN: usize = 4;

/// The campaign and ad identifiers remembered for a visitor.
///
/// `medium` is never empty: it starts at [`DEFAULT_MEDIUM`] and only changes
/// when a later visit carries an explicit medium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionRecord {
    pub campaign_id: Option<String>,
    pub adset_id: Option<String>,
    pub ad_id: Option<String>,
    pub affiliate_id: Option<String>,
    pub medium: String,
    pub click_id: Option<String>,
}

impl Default for AttributionRecord {
    fn default() -> Self {
        Self {
            campaign_id: None,
            adset_id: None,
            ad_id: None,
            affiliate_id: None,
            medium: DEFAULT_MEDIUM.to_string(),
            click_id: None,
        }
    }
}

/// The attribution fields observed on a single request.
///
/// `None` means "not observed on this request", so merging it never erases a
/// previously stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionUpdate {
    pub campaign_id: Option<String>,
    pub adset_id: Option<String>,
    pub ad_id: Option<String>,
    pub affiliate_id: Option<String>,
    pub medium: Option<String>,
    pub click_id: Option<String>,
}

impl AttributionUpdate {
    pub fn is_empty(&self) -> bool {
        self.campaign_id.is_none()
            && self.adset_id.is_none()
            && self.ad_id.is_none()
            && self.affiliate_id.is_none()
            && self.medium.is_none()
            && self.click_id.is_none()
    }

    /// Fills the fields this update did not observe from a lower-priority
    /// source (e.g. the referrer URL under the page URL).
    pub fn or(self, fallback: AttributionUpdate) -> AttributionUpdate {
        AttributionUpdate {
            campaign_id: self.campaign_id.or(fallback.campaign_id),
            adset_id: self.adset_id.or(fallback.adset_id),
            ad_id: self.ad_id.or(fallback.ad_id),
            affiliate_id: self.affiliate_id.or(fallback.affiliate_id),
            medium: self.medium.or(fallback.medium),
            click_id: self.click_id.or(fallback.click_id),
        }
    }
}

impl AttributionRecord {
    /// Applies an update: observed fields overwrite, unobserved fields keep
    /// their stored value.
    pub fn merged(&self, update: &AttributionUpdate) -> AttributionRecord {
        AttributionRecord {
            campaign_id: update.campaign_id.clone().or_else(|| self.campaign_id.clone()),
            adset_id: update.adset_id.clone().or_else(|| self.adset_id.clone()),
            ad_id: update.ad_id.clone().or_else(|| self.ad_id.clone()),
            affiliate_id: update
                .affiliate_id
                .clone()
                .or_else(|| self.affiliate_id.clone()),
            medium: update.medium.clone().unwrap_or_else(|| self.medium.clone()),
            click_id: update.click_id.clone().or_else(|| self.click_id.clone()),
        }
    }

    /// Copy safe to print in operator diagnostics: identifiers are cut to a
    /// short prefix.
    pub fn redacted(&self) -> AttributionRecord {
        AttributionRecord {
            campaign_id: self.campaign_id.as_deref().map(redact),
            adset_id: self.adset_id.as_deref().map(redact),
            ad_id: self.ad_id.as_deref().map(redact),
            affiliate_id: self.affiliate_id.as_deref().map(redact),
            medium: self.medium.clone(),
            click_id: self.click_id.as_deref().map(redact),
        }
    }
}

/// Keeps the first few characters of an identifier and masks the rest.
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(REDACTED_PREFIX_LEN).collect();
    if value.chars().count() <= REDACTED_PREFIX_LEN {
        "***".to_string()
    } else {
        format!("{prefix}***")
    }
}
