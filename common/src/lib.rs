//! Data model shared between the attribution backend and browser clients.
//!
//! Everything in this crate is plain serde data plus the pure rules that
//! belong to the data itself (attribution merging, currency metadata). No I/O
//! happens here.

pub mod model;
pub mod requests;
