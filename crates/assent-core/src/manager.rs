//! ConsentManager: the facade presentation code talks to.
//!
//! Wires one [`ConsentStore`], [`VisitLedger`] and [`ConsentPolicy`] over the
//! same injected backends and owns the notification registry.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::ConsentConfig;
use crate::events::{ConsentEvent, ConsentEvents, SubscriptionId};
use crate::ledger::VisitLedger;
use crate::policy::{ConsentPolicy, Decision};
use crate::storage::{CookieJar, FileCookieJar, FileStore, KeyValueStore};
use crate::store::{ConsentStore, FLAG_ACCEPTED};

pub struct ConsentManager {
    config: Arc<ConsentConfig>,
    store: ConsentStore,
    ledger: VisitLedger,
    policy: ConsentPolicy,
    events: ConsentEvents,
}

impl ConsentManager {
    pub fn new(
        config: ConsentConfig,
        values: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieJar>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            store: ConsentStore::new(values.clone(), cookies, config.clone()),
            ledger: VisitLedger::new(values, config.clone()),
            policy: ConsentPolicy::new(config.clone()),
            events: ConsentEvents::new(),
            config,
        }
    }

    /// Manager over the file backends in `state_dir`.
    pub fn open(config: ConsentConfig, state_dir: &Path) -> Self {
        Self::new(
            config,
            Arc::new(FileStore::new(state_dir)),
            Arc::new(FileCookieJar::new(state_dir)),
        )
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    pub fn store(&self) -> &ConsentStore {
        &self.store
    }

    pub fn ledger(&self) -> &VisitLedger {
        &self.ledger
    }

    pub fn events(&self) -> &ConsentEvents {
        &self.events
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ConsentEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Page-load flow: record the visit, then evaluate.
    pub fn on_page_load(&self) -> Decision {
        self.on_page_load_at(Utc::now())
    }

    pub fn on_page_load_at(&self, now: DateTime<Utc>) -> Decision {
        self.ledger.record_visit_at(now);
        self.evaluate_at(now)
    }

    pub fn evaluate(&self) -> Decision {
        self.evaluate_at(Utc::now())
    }

    pub fn evaluate_at(&self, now: DateTime<Utc>) -> Decision {
        self.policy.evaluate_at(&self.store, &self.ledger, now)
    }

    /// Explicit acceptance: record, flag, then notify subscribers.
    pub fn accept(&self) {
        self.accept_at(Utc::now());
    }

    pub fn accept_at(&self, now: DateTime<Utc>) {
        self.store.set_record_at(true, now);
        self.store
            .set_flag_at(FLAG_ACCEPTED, self.config.flag_ttl_days, now);
        info!(version = %self.config.policy_version, "consent accepted");
        self.events.emit(&ConsentEvent::Accepted {
            at: now,
            version: self.config.policy_version.clone(),
        });
    }

    /// Explicit settings action: forget the decision on both channels.
    pub fn reset(&self) {
        self.reset_at(Utc::now());
    }

    pub fn reset_at(&self, now: DateTime<Utc>) {
        self.store.clear_flag();
        self.store.clear_record();
        info!("consent reset");
        self.events.emit(&ConsentEvent::Reset { at: now });
    }

    /// Flag says accepted, or the record does.
    pub fn has_consented(&self) -> bool {
        self.has_consented_at(Utc::now())
    }

    pub fn has_consented_at(&self, now: DateTime<Utc>) -> bool {
        if self.store.get_flag_at(now).as_deref() == Some(FLAG_ACCEPTED) {
            return true;
        }
        self.store.get_record().is_some_and(|r| r.accepted)
    }
}
