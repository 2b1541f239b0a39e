//! Arguments shared by every subcommand.

use std::path::PathBuf;

use clap::ValueEnum;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the persisted record, visit ledger and cookie jar
    #[arg(long, global = true, env = "ASSENT_STATE_DIR", default_value = ".assent")]
    pub state_dir: PathBuf,

    /// YAML config file (policy version, TTL, retention, notice copy)
    #[arg(long, global = true, env = "ASSENT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
