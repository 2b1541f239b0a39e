use std::io::Write;

use assent_core::{ConsentManager, ConsentRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::write_json;
use crate::cli::args::OutputFormat;
use crate::exit_codes;

#[derive(Serialize)]
struct StatusReport {
    has_consented: bool,
    policy_version: String,
    record: Option<ConsentRecord>,
    flag: Option<FlagStatus>,
    visits: usize,
    frequent_visitor: bool,
}

#[derive(Serialize)]
struct FlagStatus {
    value: String,
    expires: DateTime<Utc>,
    set_cookie: String,
}

/// Snapshot of stored state. Read-only apart from storage self-healing.
pub fn run(
    manager: &ConsentManager,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let now = Utc::now();
    let report = StatusReport {
        has_consented: manager.has_consented_at(now),
        policy_version: manager.config().policy_version.clone(),
        record: manager.store().get_record(),
        flag: manager.store().flag_cookie_at(now).map(|c| FlagStatus {
            set_cookie: c.to_set_cookie(),
            value: c.value,
            expires: c.expires,
        }),
        visits: manager.ledger().visits_at(now).len(),
        frequent_visitor: manager.ledger().is_frequent_visitor_at(now),
    };

    match format {
        OutputFormat::Json => write_json(out, &report)?,
        OutputFormat::Text => write_text(&report, out)?,
    }
    Ok(exit_codes::SUCCESS)
}

fn write_text(report: &StatusReport, out: &mut dyn Write) -> std::io::Result<()> {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    writeln!(out, "has consented:    {}", yes_no(report.has_consented))?;
    writeln!(out, "policy version:   {}", report.policy_version)?;
    match &report.record {
        Some(r) => writeln!(
            out,
            "record:           accepted={} version={} date={}",
            r.accepted,
            r.version,
            r.date.to_rfc3339()
        )?,
        None => writeln!(out, "record:           (none)")?,
    }
    match &report.flag {
        Some(f) => writeln!(out, "flag:             {}", f.set_cookie)?,
        None => writeln!(out, "flag:             (none)")?,
    }
    writeln!(
        out,
        "visits:           {} ({})",
        report.visits,
        if report.frequent_visitor { "frequent" } else { "infrequent" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assent_core::ConsentConfig;
    use tempfile::TempDir;

    #[test]
    fn empty_state() {
        let dir = TempDir::new().unwrap();
        let m = ConsentManager::open(ConsentConfig::default(), dir.path());
        let mut out = Vec::new();

        run(&m, OutputFormat::Text, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("has consented:    no"));
        assert!(text.contains("record:           (none)"));
        assert!(text.contains("visits:           0 (infrequent)"));
    }

    #[test]
    fn accepted_state_in_json() {
        let dir = TempDir::new().unwrap();
        let m = ConsentManager::open(ConsentConfig::default(), dir.path());
        m.on_page_load();
        m.on_page_load();
        m.accept();
        let mut out = Vec::new();

        run(&m, OutputFormat::Json, &mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["has_consented"], true);
        assert_eq!(json["record"]["version"], "1.0");
        assert_eq!(json["flag"]["value"], "accepted");
        let set_cookie = json["flag"]["set_cookie"].as_str().unwrap();
        assert!(set_cookie.starts_with("cookieConsent=accepted; expires="));
        assert!(set_cookie.ends_with("; path=/; SameSite=Lax"));
        assert_eq!(json["visits"], 2);
        assert_eq!(json["frequent_visitor"], true);
    }
}
