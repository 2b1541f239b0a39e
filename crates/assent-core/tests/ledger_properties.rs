//! Property tests for visit retention, frequency classification and
//! version invalidation.

use std::sync::Arc;

use assent_core::ledger::{is_frequent, month_span, retention_cutoff};
use assent_core::{
    ConsentConfig, ConsentManager, DecisionReason, MemoryCookieJar, MemoryStore, VisitLedger,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Instants between 2024-01-01 and roughly 2029.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..(5 * 365 * 24 * 3600)).prop_map(|secs| base() + Duration::seconds(secs))
}

fn arb_version() -> impl Strategy<Value = String> {
    "[0-9]{1,2}\\.[0-9]{1,2}"
}

proptest! {
    #[test]
    fn recorded_ledger_never_holds_entries_older_than_window(
        mut visits in proptest::collection::vec(arb_instant(), 0..40),
        months in 1u32..36,
    ) {
        visits.sort();
        let mut config = ConsentConfig::default();
        config.retention_months = months;
        let ledger = VisitLedger::new(Arc::new(MemoryStore::new()), Arc::new(config));

        for t in &visits {
            ledger.record_visit_at(*t);
        }

        let now = visits.last().copied().unwrap_or_else(base);
        let cutoff = retention_cutoff(now, months);
        let kept = ledger.visits_at(now);
        prop_assert!(kept.iter().all(|t| *t >= cutoff));
        // Every in-window visit survives: pruning never drops fresh entries.
        let expected = visits.iter().filter(|t| **t >= cutoff).count();
        prop_assert_eq!(kept.len(), expected);
    }

    #[test]
    fn frequency_matches_average_over_month_span(
        visits in proptest::collection::vec(arb_instant(), 2..30),
    ) {
        let first = *visits.iter().min().unwrap();
        let last = *visits.iter().max().unwrap();
        let span = month_span(first, last);
        prop_assert!(span >= 1);
        let expected = visits.len() as f64 / f64::from(span) > 1.0;
        prop_assert_eq!(is_frequent(&visits, 1.0), expected);
    }

    #[test]
    fn visits_within_one_month_are_always_frequent(
        start in arb_instant(),
        extra in proptest::collection::vec(0i64..(24 * 3600), 1..10),
    ) {
        let mut visits = vec![start];
        visits.extend(extra.iter().map(|s| start + Duration::seconds(*s)));
        // Stay inside the calendar month of the first visit.
        visits.retain(|t| month_span(start, *t) == 1);
        prop_assume!(visits.len() >= 2);
        prop_assert!(is_frequent(&visits, 1.0));
    }

    #[test]
    fn stale_version_without_flag_always_shows(
        stored in arb_version(),
        current in arb_version(),
        accepted in any::<bool>(),
    ) {
        prop_assume!(stored != current);
        let values = MemoryStore::new();
        values.insert_raw(
            "cookieConsent",
            &serde_json::json!({
                "accepted": accepted,
                "date": "2026-01-01T00:00:00Z",
                "version": stored,
            })
            .to_string(),
        );
        let mut config = ConsentConfig::default();
        config.policy_version = current;
        let m = ConsentManager::new(config, Arc::new(values), Arc::new(MemoryCookieJar::new()));

        for _ in 0..3 {
            m.ledger().record_visit_at(base());
        }
        let d = m.evaluate_at(base());
        prop_assert!(d.should_show());
        prop_assert_eq!(d.reason, DecisionReason::VersionMismatch);
    }
}
