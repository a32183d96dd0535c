//! Extraction of attribution fields from inbound request parameters.
//!
//! Capture is a pure function of its input. Missing, empty or malformed
//! parameters are treated as not observed; nothing here ever fails.

use common::model::attribution::AttributionUpdate;
use serde::{Deserialize, Serialize};
use url::Url;

const MAX_VALUE_CHARS: usize = 256;

/// Which query parameters feed which attribution field. For each field the
/// first listed parameter that is present with a usable value wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterMapping {
    pub campaign_id: Vec<String>,
    pub adset_id: Vec<String>,
    pub ad_id: Vec<String>,
    pub affiliate_id: Vec<String>,
    pub medium: Vec<String>,
    pub click_token: Vec<String>,
}

impl Default for ParameterMapping {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            campaign_id: names(&["utm_campaign", "campaign_id"]),
            adset_id: names(&["utm_term", "adset_id"]),
            ad_id: names(&["utm_content", "ad_id"]),
            affiliate_id: names(&["aff", "affiliate_id"]),
            medium: names(&["utm_medium"]),
            click_token: names(&["fbclid"]),
        }
    }
}

/// Builds a partial record from decoded query pairs.
pub fn capture(params: &[(String, String)], mapping: &ParameterMapping) -> AttributionUpdate {
    AttributionUpdate {
        campaign_id: first_value(params, &mapping.campaign_id),
        adset_id: first_value(params, &mapping.adset_id),
        ad_id: first_value(params, &mapping.ad_id),
        affiliate_id: first_value(params, &mapping.affiliate_id),
        medium: first_value(params, &mapping.medium),
        click_id: first_value(params, &mapping.click_token),
    }
}

/// Captures from the landing page URL, falling back to the referrer URL for
/// fields the page did not carry. Either URL may be relative.
pub fn capture_from_urls(
    page_url: &str,
    referrer: Option<&str>,
    mapping: &ParameterMapping,
) -> AttributionUpdate {
    let page = capture(&query_pairs(page_url), mapping);
    match referrer {
        Some(referrer) => page.or(capture(&query_pairs(referrer), mapping)),
        None => page,
    }
}

fn query_pairs(raw: &str) -> Vec<(String, String)> {
    let parsed = Url::parse(raw).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(raw))
    });
    match parsed {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(_) => Vec::new(),
    }
}

fn first_value(params: &[(String, String)], names: &[String]) -> Option<String> {
    names.iter().find_map(|name| {
        params
            .iter()
            .filter(|(key, _)| key == name)
            .find_map(|(_, value)| clean(value))
    })
}

fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_VALUE_CHARS).collect())
}
