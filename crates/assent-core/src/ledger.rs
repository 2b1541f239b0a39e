//! VisitLedger: a pruned log of visit timestamps.
//!
//! Only used to classify a visitor as frequent. Reads that fail count as "no
//! visits", which keeps the notice showing.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::config::ConsentConfig;
use crate::errors::StorageError;
use crate::storage::KeyValueStore;

pub struct VisitLedger {
    values: Arc<dyn KeyValueStore>,
    config: Arc<ConsentConfig>,
}

impl VisitLedger {
    pub fn new(values: Arc<dyn KeyValueStore>, config: Arc<ConsentConfig>) -> Self {
        Self { values, config }
    }

    /// Append now, prune to the retention window, persist in one write.
    pub fn record_visit(&self) {
        self.record_visit_at(Utc::now());
    }

    pub fn record_visit_at(&self, now: DateTime<Utc>) {
        let key = self.config.keys.visits.as_str();
        // A broken ledger is replaced rather than blocking the append.
        let mut visits = self.load().unwrap_or_default();
        visits.push(now);
        let before = visits.len();
        let visits = prune(visits, now, self.config.retention_months);
        let pruned = before - visits.len();

        let encoded: Vec<String> = visits
            .iter()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .collect();
        let json = match serde_json::to_string(&encoded) {
            Ok(json) => json,
            Err(e) => {
                report("write visits", key, &StorageError::malformed(key, e.to_string()));
                return;
            }
        };
        match self.values.set(key, &json) {
            Ok(()) => debug!(retained = visits.len(), pruned, "visit recorded"),
            Err(err) => report("write visits", key, &err),
        }
    }

    /// Retained visits, oldest first.
    pub fn visits(&self) -> Vec<DateTime<Utc>> {
        self.visits_at(Utc::now())
    }

    pub fn visits_at(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut visits = prune(
            self.load().unwrap_or_default(),
            now,
            self.config.retention_months,
        );
        visits.sort();
        visits
    }

    pub fn is_frequent_visitor(&self) -> bool {
        self.is_frequent_visitor_at(Utc::now())
    }

    pub fn is_frequent_visitor_at(&self, now: DateTime<Utc>) -> bool {
        let visits = match self.load() {
            Some(visits) => prune(visits, now, self.config.retention_months),
            None => return false,
        };
        is_frequent(&visits, self.config.frequent_visits_per_month)
    }

    /// Drop the whole ledger.
    pub fn clear(&self) {
        let key = self.config.keys.visits.as_str();
        if let Err(err) = self.values.remove(key) {
            report("clear visits", key, &err);
        }
    }

    /// `None` when storage fails or the stored value is not a JSON array of
    /// strings. Individual unparseable timestamps are skipped.
    fn load(&self) -> Option<Vec<DateTime<Utc>>> {
        let key = self.config.keys.visits.as_str();
        let raw = match self.values.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Some(Vec::new()),
            Err(err) => {
                report("read visits", key, &err);
                return None;
            }
        };
        let entries: Vec<String> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                report("read visits", key, &StorageError::malformed(key, e.to_string()));
                return None;
            }
        };
        let total = entries.len();
        let visits: Vec<DateTime<Utc>> = entries
            .iter()
            .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .collect();
        if visits.len() != total {
            warn!(key, skipped = total - visits.len(), "skipped unparseable visit timestamps");
        }
        Some(visits)
    }
}

/// Oldest instant still inside a `months`-long window ending at `now`.
pub fn retention_cutoff(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Keep visits inside `[now - months, now]`. Entries after `now` (clock skew,
/// edited storage) are dropped so they cannot stretch the month span.
fn prune(visits: Vec<DateTime<Utc>>, now: DateTime<Utc>, months: u32) -> Vec<DateTime<Utc>> {
    let cutoff = retention_cutoff(now, months);
    visits
        .into_iter()
        .filter(|t| *t >= cutoff && *t <= now)
        .collect()
}

/// Inclusive calendar-month span between the earliest and latest visit.
pub fn month_span(first: DateTime<Utc>, last: DateTime<Utc>) -> u32 {
    let months = (i64::from(last.year()) - i64::from(first.year())) * 12
        + (i64::from(last.month()) - i64::from(first.month()))
        + 1;
    months.max(1) as u32
}

/// Average visits per calendar month strictly above `threshold`.
pub fn is_frequent(visits: &[DateTime<Utc>], threshold: f64) -> bool {
    if visits.len() < 2 {
        return false;
    }
    let (Some(first), Some(last)) = (visits.iter().min(), visits.iter().max()) else {
        return false;
    };
    let span = month_span(*first, *last);
    let average = visits.len() as f64 / f64::from(span);
    average > threshold
}

fn report(op: &'static str, key: &str, err: &StorageError) {
    warn!(op, key, kind = err.kind(), error = %err, "visit ledger degraded");
}
