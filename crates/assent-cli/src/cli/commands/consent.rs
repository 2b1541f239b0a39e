//! Commands that change stored consent state.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use assent_core::{ConsentEvent, ConsentManager};
use serde_json::json;

use super::write_json;
use crate::cli::args::OutputFormat;
use crate::exit_codes;

pub fn accept(
    manager: &ConsentManager,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let events = capture(manager, || manager.accept());
    print_events(&events, format, out)?;
    Ok(exit_codes::SUCCESS)
}

pub fn reset(
    manager: &ConsentManager,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let events = capture(manager, || manager.reset());
    print_events(&events, format, out)?;
    Ok(exit_codes::SUCCESS)
}

/// Drop the visit ledger. Consent itself is untouched.
pub fn forget(
    manager: &ConsentManager,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    manager.ledger().clear();
    match format {
        OutputFormat::Json => write_json(out, &json!({ "visits_cleared": true }))?,
        OutputFormat::Text => writeln!(out, "visit ledger cleared")?,
    }
    Ok(exit_codes::SUCCESS)
}

/// Run `action` with a temporary subscriber and return what it emitted.
fn capture<F: FnOnce()>(manager: &ConsentManager, action: F) -> Vec<ConsentEvent> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = manager.subscribe(move |event| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    });
    action();
    manager.unsubscribe(id);
    let events = std::mem::take(&mut *seen.lock().unwrap_or_else(PoisonError::into_inner));
    events
}

fn print_events(
    events: &[ConsentEvent],
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    for event in events {
        match format {
            OutputFormat::Json => write_json(out, event)?,
            OutputFormat::Text => match event {
                ConsentEvent::Accepted { at, version } => {
                    writeln!(out, "accepted policy version {version} at {}", at.to_rfc3339())?;
                }
                ConsentEvent::Reset { at } => {
                    writeln!(out, "consent reset at {}", at.to_rfc3339())?;
                }
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assent_core::ConsentConfig;
    use tempfile::TempDir;

    #[test]
    fn accept_prints_the_emitted_event() {
        let dir = TempDir::new().unwrap();
        let m = ConsentManager::open(ConsentConfig::default(), dir.path());
        let mut out = Vec::new();

        assert_eq!(accept(&m, OutputFormat::Json, &mut out).unwrap(), exit_codes::SUCCESS);

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["event"], "accepted");
        assert_eq!(json["version"], "1.0");
        assert!(m.has_consented());
        assert_eq!(m.events().subscriber_count(), 0, "temporary subscriber removed");
    }

    #[test]
    fn reset_clears_consent() {
        let dir = TempDir::new().unwrap();
        let m = ConsentManager::open(ConsentConfig::default(), dir.path());
        m.accept();
        let mut out = Vec::new();

        reset(&m, OutputFormat::Text, &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().starts_with("consent reset at "));
        assert!(!m.has_consented());
    }

    #[test]
    fn forget_keeps_consent_but_drops_visits() {
        let dir = TempDir::new().unwrap();
        let m = ConsentManager::open(ConsentConfig::default(), dir.path());
        m.on_page_load();
        m.accept();
        let mut out = Vec::new();

        forget(&m, OutputFormat::Text, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "visit ledger cleared\n");
        assert!(m.ledger().visits_at(chrono::Utc::now()).is_empty());
        assert!(m.has_consented());
    }
}
