//! Conversion event assembly.
//!
//! - `builder`: validates order data and produces the server event and its
//!   browser-side twin sharing one `event_id`.
//! - `hashing`: normalization and SHA-256 hashing of contact fields.

pub mod builder;
pub mod hashing;
