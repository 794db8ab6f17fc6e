//! Command-line interface argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Research Crew - scheduled multi-agent research with Telegram delivery
///
/// Runs a researcher, an analyst and a report writer over the latest work
/// on a topic and posts the resulting report to a Telegram chat.
///
/// Examples:
///   research-crew test
///   research-crew once
///   research-crew schedule --config-dir ./config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// What to do
    #[arg(value_enum, default_value_t = Mode::Once)]
    pub mode: Mode,

    /// Directory holding agents.toml and tasks.toml
    #[arg(long, default_value = "config", env = "CONFIG_DIR", value_name = "DIR")]
    pub config_dir: PathBuf,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Check the Telegram connection and exit
    Test,
    /// Run the research once and send the report
    #[default]
    Once,
    /// Run on the configured schedule until interrupted
    Schedule,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref env_file) = self.env_file {
            if !env_file.is_file() {
                return Err(format!("Env file does not exist: {}", env_file.display()));
            }
        }

        // The connection test does not need the crew definitions.
        if self.mode != Mode::Test && !self.config_dir.is_dir() {
            return Err(format!(
                "Config directory does not exist: {}",
                self.config_dir.display()
            ));
        }

        Ok(())
    }
}
