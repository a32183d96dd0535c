//! Normalization and one-way hashing of customer contact fields.
//!
//! Server events only ever carry the SHA-256 (lowercase hex) of the
//! normalized value. Normalization follows the platforms' matching rules so
//! the hashes line up with their own.

use common::requests::CustomerInput;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hashed contact fields ready for a server event. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashedCustomer {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub external_id: Option<String>,
}

impl HashedCustomer {
    pub fn from_input(input: Option<&CustomerInput>, external_id: Option<&str>) -> Self {
        let field = |value: Option<&String>, normalize: fn(&str) -> String| {
            value
                .map(|v| normalize(v))
                .filter(|v| !v.is_empty())
                .map(|v| sha256_hex(&v))
        };
        let input = input.cloned().unwrap_or_default();
        HashedCustomer {
            email: field(input.email.as_ref(), normalize_email),
            phone: field(input.phone.as_ref(), normalize_phone),
            first_name: field(input.first_name.as_ref(), normalize_name),
            last_name: field(input.last_name.as_ref(), normalize_name),
            city: field(input.city.as_ref(), normalize_name),
            zip: field(input.zip.as_ref(), normalize_zip),
            country: field(input.country.as_ref(), normalize_country),
            external_id: external_id
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(sha256_hex),
        }
    }
}

pub fn sha256_hex(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Digits only, including the country code, without leading zeros.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.trim_start_matches('0').to_string()
}

/// Lowercase letters and digits only; whitespace and punctuation removed.
pub fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn normalize_zip(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn normalize_country(raw: &str) -> String {
    let code = raw.trim().to_lowercase();
    if code.chars().count() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        code
    } else {
        String::new()
    }
}
