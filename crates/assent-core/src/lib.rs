//! Client-held consent lifecycle with frequent-visitor renewal.
//!
//! Decides, without any server round-trip, whether a consent notice must be
//! (re)shown, and silently renews consent for visitors who come back often.
//!
//! This governs presentation state only. It is not a security control and
//! makes no claim of tamper resistance.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use assent_core::{ConsentConfig, ConsentManager, MemoryCookieJar, MemoryStore};
//!
//! let manager = ConsentManager::new(
//!     ConsentConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryCookieJar::new()),
//! );
//!
//! // First visit: the notice is shown.
//! assert!(manager.on_page_load().should_show());
//!
//! manager.accept();
//! assert!(!manager.evaluate().should_show());
//! assert!(manager.has_consented());
//! ```
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ConsentStore`] | versioned record + authoritative flag with TTL |
//! | [`VisitLedger`] | visit timestamps pruned to the retention window |
//! | [`ConsentPolicy`] | show/suppress decision, silent renewal |
//! | [`ConsentManager`] | page-load flow, accept/reset, notifications |

pub mod config;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod manager;
pub mod policy;
pub mod storage;
pub mod store;

pub use config::{ConsentConfig, NoticeCopy, StorageKeys};
pub use errors::{ConfigError, StorageError, StorageResult};
pub use events::{ConsentEvent, ConsentEvents, SubscriptionId};
pub use ledger::VisitLedger;
pub use manager::ConsentManager;
pub use policy::{ConsentPolicy, Decision, DecisionReason, Verdict};
pub use storage::{
    Cookie, CookieJar, FileCookieJar, FileStore, KeyValueStore, MemoryCookieJar, MemoryStore,
    SameSite,
};
pub use store::{ConsentRecord, ConsentStore, FLAG_ACCEPTED};
