//! ConsentStore: the versioned consent record and the authoritative flag.
//!
//! The two live in independent channels and may diverge. Nothing here ever
//! fails outward: a fault on read is "absent", a fault on write is a no-op,
//! and both are logged.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

use crate::config::ConsentConfig;
use crate::errors::StorageError;
use crate::storage::{Cookie, CookieJar, KeyValueStore, SameSite};

/// Flag value written by accept and silent renewal.
pub const FLAG_ACCEPTED: &str = "accepted";

/// The last explicit consent decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub accepted: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub date: DateTime<Utc>,
    pub version: String,
}

/// Same shape as a browser's `Date.toISOString()`.
fn serialize_millis<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub struct ConsentStore {
    values: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn CookieJar>,
    config: Arc<ConsentConfig>,
}

impl ConsentStore {
    pub fn new(
        values: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieJar>,
        config: Arc<ConsentConfig>,
    ) -> Self {
        Self {
            values,
            cookies,
            config,
        }
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    /// Last persisted record, or `None` if missing, unreadable or unparseable.
    pub fn get_record(&self) -> Option<ConsentRecord> {
        let key = self.config.keys.record.as_str();
        let raw = match self.values.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                report("read record", key, &err);
                return None;
            }
        };
        match serde_json::from_str::<ConsentRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                report("read record", key, &StorageError::malformed(key, e.to_string()));
                None
            }
        }
    }

    /// Write `{accepted, date: now, version: current}`.
    pub fn set_record(&self, accepted: bool) {
        self.set_record_at(accepted, Utc::now());
    }

    pub fn set_record_at(&self, accepted: bool, now: DateTime<Utc>) {
        let key = self.config.keys.record.as_str();
        let record = ConsentRecord {
            accepted,
            date: now,
            version: self.config.policy_version.clone(),
        };
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                report("write record", key, &StorageError::malformed(key, e.to_string()));
                return;
            }
        };
        match self.values.set(key, &json) {
            Ok(()) => debug!(accepted, version = %record.version, "consent record saved"),
            Err(err) => report("write record", key, &err),
        }
    }

    pub fn clear_record(&self) {
        let key = self.config.keys.record.as_str();
        if let Err(err) = self.values.remove(key) {
            report("clear record", key, &err);
        }
    }

    /// Flag token if present and unexpired.
    pub fn get_flag(&self) -> Option<String> {
        self.get_flag_at(Utc::now())
    }

    pub fn get_flag_at(&self, now: DateTime<Utc>) -> Option<String> {
        self.flag_cookie_at(now).map(|c| c.value)
    }

    /// The unexpired flag cookie itself, for callers that need its expiry.
    pub fn flag_cookie_at(&self, now: DateTime<Utc>) -> Option<Cookie> {
        let keys = &self.config.keys;
        let cookie = match self.cookies.get(&keys.flag_name, &keys.flag_path) {
            Ok(cookie) => cookie?,
            Err(err) => {
                report("read flag", &keys.flag_name, &err);
                return None;
            }
        };
        if cookie.is_expired_at(now) {
            debug!(expires = %cookie.expires, "consent flag expired");
            return None;
        }
        Some(cookie)
    }

    pub fn set_flag(&self, token: &str, ttl_days: u32) {
        self.set_flag_at(token, ttl_days, Utc::now());
    }

    pub fn set_flag_at(&self, token: &str, ttl_days: u32, now: DateTime<Utc>) {
        let keys = &self.config.keys;
        let Some(expires) = now.checked_add_signed(Duration::days(i64::from(ttl_days))) else {
            let err = StorageError::malformed(
                keys.flag_name.as_str(),
                format!("flag expiry {ttl_days} days after {now} is out of range"),
            );
            report("write flag", &keys.flag_name, &err);
            return;
        };
        let cookie = Cookie {
            name: keys.flag_name.clone(),
            value: token.to_string(),
            path: keys.flag_path.clone(),
            expires,
            same_site: SameSite::Lax,
        };
        match self.cookies.set(cookie) {
            Ok(()) => debug!(token, %expires, "consent flag set"),
            Err(err) => report("write flag", &keys.flag_name, &err),
        }
    }

    pub fn clear_flag(&self) {
        let keys = &self.config.keys;
        if let Err(err) = self.cookies.remove(&keys.flag_name, &keys.flag_path) {
            report("clear flag", &keys.flag_name, &err);
        }
    }
}

fn report(op: &'static str, key: &str, err: &StorageError) {
    warn!(op, key, kind = err.kind(), error = %err, "consent storage degraded");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryCookieJar, MemoryStore};
    use chrono::{SubsecRound, TimeZone};

    fn fixture(config: ConsentConfig) -> (ConsentStore, MemoryStore, MemoryCookieJar) {
        let values = MemoryStore::new();
        let cookies = MemoryCookieJar::new();
        let store = ConsentStore::new(
            Arc::new(values.clone()),
            Arc::new(cookies.clone()),
            Arc::new(config),
        );
        (store, values, cookies)
    }

    #[test]
    fn test_record_roundtrip_within_call_window() {
        let (store, _, _) = fixture(ConsentConfig::default());
        let before = Utc::now().trunc_subsecs(3);
        store.set_record(true);
        let after = Utc::now();

        let record = store.get_record().unwrap();
        assert!(record.accepted);
        assert_eq!(record.version, "1.0");
        assert!(record.date >= before && record.date <= after);
    }

    #[test]
    fn test_record_wire_format() {
        let (store, values, _) = fixture(ConsentConfig::default());
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store.set_record_at(false, now);

        let raw: serde_json::Value =
            serde_json::from_str(&values.raw("cookieConsent").unwrap()).unwrap();
        assert_eq!(raw["accepted"], false);
        assert_eq!(raw["version"], "1.0");
        assert_eq!(raw["date"], "2026-03-01T12:00:00.000Z");
    }

    #[test]
    fn test_record_date_is_written_with_millisecond_precision() {
        let (store, values, _) = fixture(ConsentConfig::default());
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
            + Duration::nanoseconds(123_456_789);
        store.set_record_at(true, now);

        let raw: serde_json::Value =
            serde_json::from_str(&values.raw("cookieConsent").unwrap()).unwrap();
        assert_eq!(raw["date"], "2026-03-01T12:00:00.123Z");
        assert_eq!(store.get_record().unwrap().date, now.trunc_subsecs(3));
    }

    #[test]
    fn test_record_accepts_javascript_iso_dates() {
        let (store, values, _) = fixture(ConsentConfig::default());
        values.insert_raw(
            "cookieConsent",
            r#"{"accepted":true,"date":"2025-11-02T09:15:30.123Z","version":"1.0"}"#,
        );
        let record = store.get_record().unwrap();
        assert_eq!(
            record.date,
            Utc.with_ymd_and_hms(2025, 11, 2, 9, 15, 30).unwrap()
                + Duration::milliseconds(123)
        );
    }

    #[test]
    fn test_malformed_record_reads_absent() {
        let (store, values, _) = fixture(ConsentConfig::default());
        values.insert_raw("cookieConsent", "{not json");
        assert!(store.get_record().is_none());

        values.insert_raw("cookieConsent", r#"{"accepted":"yes"}"#);
        assert!(store.get_record().is_none());
    }

    #[test]
    fn test_disabled_storage_degrades_silently() {
        let (store, values, cookies) = fixture(ConsentConfig::default());
        values.set_disabled(true);
        cookies.set_disabled(true);

        store.set_record(true);
        store.set_flag(FLAG_ACCEPTED, 183);
        store.clear_record();
        store.clear_flag();
        assert!(store.get_record().is_none());
        assert!(store.get_flag().is_none());

        values.set_disabled(false);
        assert!(values.is_empty());
    }

    #[test]
    fn test_quota_exceeded_write_is_noop() {
        let values = MemoryStore::with_quota(16);
        let store = ConsentStore::new(
            Arc::new(values.clone()),
            Arc::new(MemoryCookieJar::new()),
            Arc::new(ConsentConfig::default()),
        );
        store.set_record(true);
        assert!(store.get_record().is_none());
        assert!(values.is_empty());
    }

    #[test]
    fn test_flag_expiry_semantics() {
        let (store, _, cookies) = fixture(ConsentConfig::default());
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        store.set_flag_at(FLAG_ACCEPTED, 183, now);

        let held = cookies.cookies();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].path, "/");
        assert_eq!(held[0].same_site, SameSite::Lax);
        assert_eq!(held[0].expires, now + Duration::days(183));

        assert_eq!(
            store.get_flag_at(now + Duration::days(182)).as_deref(),
            Some(FLAG_ACCEPTED)
        );
        assert!(store.get_flag_at(now + Duration::days(183)).is_none());
    }

    #[test]
    fn test_unrepresentable_flag_expiry_is_a_degraded_write() {
        let (store, _, cookies) = fixture(ConsentConfig::default());
        let near_max = DateTime::<Utc>::MAX_UTC - Duration::days(10);

        store.set_flag_at(FLAG_ACCEPTED, 183, near_max);
        store.set_flag_at(FLAG_ACCEPTED, u32::MAX, Utc::now());

        assert!(cookies.cookies().is_empty());
        assert!(store.get_flag().is_none());
    }

    #[test]
    fn test_clear_flag_leaves_record() {
        let (store, _, _) = fixture(ConsentConfig::default());
        store.set_record(true);
        store.set_flag(FLAG_ACCEPTED, 1);
        store.clear_flag();
        assert!(store.get_flag().is_none());
        assert!(store.get_record().is_some());

        store.clear_record();
        assert!(store.get_record().is_none());
    }

    #[test]
    fn test_custom_keys_are_honored() {
        let mut config = ConsentConfig::default();
        config.keys.record = "consent_v2".to_string();
        config.keys.flag_name = "c2".to_string();
        config.keys.flag_path = "/app".to_string();
        let (store, values, cookies) = fixture(config);

        store.set_record(true);
        store.set_flag(FLAG_ACCEPTED, 5);
        assert!(values.raw("consent_v2").is_some());
        assert!(values.raw("cookieConsent").is_none());
        assert_eq!(cookies.cookies()[0].name, "c2");
        assert_eq!(cookies.cookies()[0].path, "/app");
    }
}
