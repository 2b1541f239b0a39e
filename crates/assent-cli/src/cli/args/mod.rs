use clap::{Parser, Subcommand};

pub mod common;
pub use common::*;

#[derive(Parser, Debug)]
#[command(
    name = "assent",
    version,
    about = "Consent notice lifecycle with frequent-visitor renewal"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Page load: record a visit, then decide whether to show the notice
    Load,
    /// Decide whether to show the notice without recording a visit
    Evaluate,
    /// Accept the current policy version
    Accept,
    /// Forget the consent decision (flag and record)
    Reset,
    /// Clear the visit ledger
    Forget,
    /// Show stored consent state
    Status,
}

#[cfg(test)]
mod tests;
