//! First-party visitor identity.
//!
//! A browser instance is identified by a UUID carried in the `vid` cookie. It
//! is the key every per-visitor store persists under.

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use std::fmt;
use uuid::Uuid;

pub const VISITOR_COOKIE: &str = "vid";
const VISITOR_COOKIE_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitorId(String);

impl VisitorId {
    pub fn generate() -> Self {
        VisitorId(Uuid::new_v4().to_string())
    }

    /// Accepts only well-formed UUIDs so cookie values can never inject into
    /// storage keys.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim())
            .ok()
            .map(|id| VisitorId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the request's visitor, issuing a fresh id when the cookie is
/// missing or malformed. The flag is `true` when the id was just issued and
/// the response must set the cookie.
pub fn resolve(req: &HttpRequest) -> (VisitorId, bool) {
    match req
        .cookie(VISITOR_COOKIE)
        .and_then(|c| VisitorId::parse(c.value()))
    {
        Some(visitor) => (visitor, false),
        None => (VisitorId::generate(), true),
    }
}

/// Returns the visitor only if the request already carries one.
pub fn existing(req: &HttpRequest) -> Option<VisitorId> {
    req.cookie(VISITOR_COOKIE)
        .and_then(|c| VisitorId::parse(c.value()))
}

pub fn cookie(visitor: &VisitorId) -> Cookie<'static> {
    Cookie::build(VISITOR_COOKIE, visitor.as_str().to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(VISITOR_COOKIE_DAYS))
        .finish()
}
