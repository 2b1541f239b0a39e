//! Persistence seams for consent state.
//!
//! Two independent channels, mirroring what a browsing context offers:
//!
//! ```text
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │      KeyValueStore       │      │        CookieJar         │
//! │  "cookieConsent" → JSON  │      │  cookieConsent=accepted  │
//! │  "visitorVisits" → JSON  │      │  path=/  expires=...     │
//! └──────────────────────────┘      └──────────────────────────┘
//! ```
//!
//! Either channel may be cleared, blocked or full independently of the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StorageResult;

mod file;
mod memory;

pub use file::{FileCookieJar, FileStore};
pub use memory::{MemoryCookieJar, MemoryStore};

/// String key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Cookie-style persistence with path scoping and explicit expiry.
///
/// Jars hand back whatever they hold; expiry is judged by the caller against
/// its own clock.
pub trait CookieJar: Send + Sync {
    fn get(&self, name: &str, path: &str) -> StorageResult<Option<Cookie>>;

    /// Insert or replace the cookie with the same name and path.
    fn set(&self, cookie: Cookie) -> StorageResult<()>;

    fn remove(&self, name: &str, path: &str) -> StorageResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires: DateTime<Utc>,
    #[serde(default)]
    pub same_site: SameSite,
}

impl Cookie {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    /// `Set-Cookie` header value, with the expiry as an IMF-fixdate.
    pub fn to_set_cookie(&self) -> String {
        format!(
            "{}={}; expires={}; path={}; SameSite={}",
            self.name,
            self.value,
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
            self.path,
            self.same_site.as_str()
        )
    }
}
