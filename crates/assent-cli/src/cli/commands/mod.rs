use std::io::{self, Write};

use anyhow::Context;
use assent_core::{ConsentConfig, ConsentManager};
use serde::Serialize;

use super::args::*;

pub mod consent;
pub mod decide;
pub mod status;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = ConsentConfig::load(cli.global.config.as_deref())
        .context("failed to load consent config")?;
    tracing::debug!(
        state_dir = %cli.global.state_dir.display(),
        policy_version = %config.policy_version,
        "opening consent state"
    );
    let manager = ConsentManager::open(config, &cli.global.state_dir);
    let mut out = io::stdout().lock();
    run(&manager, &cli.cmd, cli.global.format, &mut out)
}

/// Execute one subcommand against an already-built manager.
pub fn run(
    manager: &ConsentManager,
    cmd: &Command,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    match cmd {
        Command::Load => decide::load(manager, format, out),
        Command::Evaluate => decide::evaluate(manager, format, out),
        Command::Accept => consent::accept(manager, format, out),
        Command::Reset => consent::reset(manager, format, out),
        Command::Forget => consent::forget(manager, format, out),
        Command::Status => status::run(manager, format, out),
    }
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to encode output")?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        let cli = Cli::try_parse_from([
            "assent",
            "status",
            "--state-dir",
            dir.path().to_str().unwrap(),
            "--config",
            missing.to_str().unwrap(),
        ])
        .unwrap();

        let err = dispatch(cli).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load consent config"));
    }

    #[test]
    fn invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("consent.yaml");
        std::fs::write(&path, "flag_ttl_days: 0\n").unwrap();
        let cli = Cli::try_parse_from([
            "assent",
            "evaluate",
            "--state-dir",
            dir.path().to_str().unwrap(),
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();

        assert!(dispatch(cli).is_err());
    }
}
