//! ConsentPolicy: show or suppress the notice.
//!
//! Rules, first match wins:
//! 1. Valid flag → suppress (record not consulted, unless a stale record
//!    revokes the flag, see [`ConsentConfig::version_bump_revokes_flag`])
//! 2. No record → show
//! 3. Record from another policy version → show
//! 4. Accepted record + frequent visitor → renew flag and record, suppress
//! 5. Accepted record, infrequent visitor → show
//! 6. Anything else → show

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConsentConfig;
use crate::ledger::VisitLedger;
use crate::store::{ConsentStore, FLAG_ACCEPTED};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Show,
    Suppress,
}

/// Which rule produced the verdict.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    FlagValid,
    FirstVisit,
    VersionMismatch,
    RenewedSilently,
    InfrequentVisitor,
    NotAccepted,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlagValid => "flag_valid",
            Self::FirstVisit => "first_visit",
            Self::VersionMismatch => "version_mismatch",
            Self::RenewedSilently => "renewed_silently",
            Self::InfrequentVisitor => "infrequent_visitor",
            Self::NotAccepted => "not_accepted",
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            Self::FlagValid | Self::RenewedSilently => Verdict::Suppress,
            Self::FirstVisit
            | Self::VersionMismatch
            | Self::InfrequentVisitor
            | Self::NotAccepted => Verdict::Show,
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: DecisionReason,
}

impl Decision {
    fn from_reason(reason: DecisionReason) -> Self {
        Self {
            verdict: reason.verdict(),
            reason,
        }
    }

    pub fn should_show(&self) -> bool {
        self.verdict == Verdict::Show
    }

    /// True when this evaluation silently renewed a frequent visitor's consent.
    pub fn renewed(&self) -> bool {
        self.reason == DecisionReason::RenewedSilently
    }
}

pub struct ConsentPolicy {
    config: Arc<ConsentConfig>,
}

impl ConsentPolicy {
    pub fn new(config: Arc<ConsentConfig>) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, store: &ConsentStore, ledger: &VisitLedger) -> Decision {
        self.evaluate_at(store, ledger, Utc::now())
    }

    /// Like [`evaluate`](Self::evaluate) with an explicit `now`.
    pub fn evaluate_at(
        &self,
        store: &ConsentStore,
        ledger: &VisitLedger,
        now: DateTime<Utc>,
    ) -> Decision {
        let reason = self.decide(store, ledger, now);
        let decision = Decision::from_reason(reason);
        debug!(
            verdict = ?decision.verdict,
            reason = %decision.reason,
            "consent evaluated"
        );
        decision
    }

    fn decide(
        &self,
        store: &ConsentStore,
        ledger: &VisitLedger,
        now: DateTime<Utc>,
    ) -> DecisionReason {
        let current = self.config.policy_version.as_str();

        if store.get_flag_at(now).is_some() {
            if !self.config.version_bump_revokes_flag {
                return DecisionReason::FlagValid;
            }
            match store.get_record() {
                Some(record) if record.version != current => {
                    info!(
                        stored = %record.version,
                        current,
                        "policy version changed, revoking consent flag"
                    );
                    store.clear_flag();
                    return DecisionReason::VersionMismatch;
                }
                _ => return DecisionReason::FlagValid,
            }
        }

        let Some(record) = store.get_record() else {
            return DecisionReason::FirstVisit;
        };

        if record.version != current {
            debug!(stored = %record.version, current, "consent record version mismatch");
            return DecisionReason::VersionMismatch;
        }

        if !record.accepted {
            return DecisionReason::NotAccepted;
        }

        if ledger.is_frequent_visitor_at(now) {
            store.set_flag_at(FLAG_ACCEPTED, self.config.flag_ttl_days, now);
            store.set_record_at(true, now);
            info!(
                ttl_days = self.config.flag_ttl_days,
                "frequent visitor, consent renewed silently"
            );
            return DecisionReason::RenewedSilently;
        }

        DecisionReason::InfrequentVisitor
    }
}
