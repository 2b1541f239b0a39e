use super::*;
use clap::CommandFactory;
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_debug_assert() {
    Cli::command().debug_assert();
}

#[test]
fn global_flags_parse_after_subcommand() {
    let cli = Cli::try_parse_from([
        "assent",
        "status",
        "--state-dir",
        "/tmp/site",
        "--format",
        "json",
    ])
    .expect("parse should succeed");

    assert!(matches!(cli.cmd, Command::Status));
    assert_eq!(cli.global.state_dir, PathBuf::from("/tmp/site"));
    assert_eq!(cli.global.format, OutputFormat::Json);
    assert_eq!(cli.global.config, None);
}

#[test]
fn defaults_to_text_output() {
    let cli = Cli::try_parse_from(["assent", "--config", "consent.yaml", "load"])
        .expect("parse should succeed");

    assert!(matches!(cli.cmd, Command::Load));
    assert_eq!(cli.global.format, OutputFormat::Text);
    assert_eq!(cli.global.config, Some(PathBuf::from("consent.yaml")));
}

#[test]
fn unknown_format_is_rejected() {
    assert!(Cli::try_parse_from(["assent", "evaluate", "--format", "xml"]).is_err());
}
