use std::io::Write;

use assent_core::{ConsentManager, Decision, DecisionReason, NoticeCopy, Verdict};
use serde::Serialize;

use super::write_json;
use crate::cli::args::OutputFormat;
use crate::exit_codes;

#[derive(Serialize)]
struct DecisionReport<'a> {
    verdict: Verdict,
    reason: DecisionReason,
    renewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'a NoticeCopy>,
}

/// Page-load flow: record the visit, then decide.
pub fn load(
    manager: &ConsentManager,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let decision = manager.on_page_load();
    report(manager, decision, format, out)
}

pub fn evaluate(
    manager: &ConsentManager,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let decision = manager.evaluate();
    report(manager, decision, format, out)
}

fn report(
    manager: &ConsentManager,
    decision: Decision,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let notice = decision.should_show().then(|| &manager.config().notice);
    match format {
        OutputFormat::Json => write_json(
            out,
            &DecisionReport {
                verdict: decision.verdict,
                reason: decision.reason,
                renewed: decision.renewed(),
                notice,
            },
        )?,
        OutputFormat::Text => {
            let verdict = match decision.verdict {
                Verdict::Show => "show",
                Verdict::Suppress => "suppress",
            };
            writeln!(out, "{verdict} ({})", decision.reason)?;
            if let Some(copy) = notice {
                writeln!(out)?;
                writeln!(out, "{}", copy.text)?;
                writeln!(
                    out,
                    "[{}] [{}] {}",
                    copy.accept_label, copy.details_label, copy.policy_link
                )?;
            }
        }
    }

    Ok(if decision.should_show() {
        exit_codes::NOTICE_SHOWN
    } else {
        exit_codes::SUCCESS
    })
}
