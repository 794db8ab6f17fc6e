//! Research Crew - scheduled multi-agent research with Telegram delivery
//!
//! A researcher, an analyst and a report writer run in sequence against
//! Gemini and web search; the final report is posted to a Telegram chat.
//!
//! Exit codes:
//!   0 - Success (including a crew failure that was reported to the chat)
//!   1 - Configuration error, failed connection test or failed delivery

mod agent;
mod cli;
mod config;
mod crew;
mod error;
mod logging;
mod models;
mod notifier;
mod pipeline;
mod scheduler;
mod settings;

use agent::{GeminiClient, SerperSearchTool, ToolRegistry};
use anyhow::{Context, Result};
use cli::{Args, Mode};
use config::CrewConfig;
use crew::{Crew, CrewExecutor};
use notifier::{Notifier, TelegramTransport};
use pipeline::ResearchPipeline;
use settings::Settings;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = load_env(args.env_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    logging::init(&Settings::log_from_env(), args.verbose)?;

    info!("Research Crew v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("\n❌ {}", e);
            std::process::exit(1);
        }
    };

    match run(&args, settings).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Research crew failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Load variables from `--env-file`, or from `./.env` when present.
/// Variables already set in the process environment win.
fn load_env(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            ignore_missing(dotenvy::dotenv()).context("Failed to load .env")?;
        }
    }
    Ok(())
}

/// An absent optional env file is fine; an unreadable or malformed one is not.
fn ignore_missing<T>(result: dotenvy::Result<T>) -> Result<(), dotenvy::Error> {
    match result {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Dispatch the selected mode. Returns the process exit code.
async fn run(args: &Args, settings: Settings) -> Result<i32> {
    match args.mode {
        Mode::Test => {
            println!("🔌 Testing Telegram connection...");
            let notifier = build_notifier(&settings)?;
            match notifier.test_connection().await {
                Ok(me) => {
                    println!(
                        "✅ Connected as @{}",
                        me.username.as_deref().unwrap_or(&me.first_name)
                    );
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("❌ Telegram connection test failed: {}", e);
                    Ok(1)
                }
            }
        }
        Mode::Once => {
            let pipeline = build_pipeline(&args.config_dir, &settings)?;

            println!("🔬 Running research crew...");
            match pipeline.run_once().await {
                Ok(result) => {
                    println!(
                        "✅ Run {} finished ({}) in {:.1}s, report sent",
                        result.execution_id,
                        result.status(),
                        result.execution_time_seconds
                    );
                    Ok(0)
                }
                Err(e) => {
                    error!("Failed to deliver the report: {}", e);
                    eprintln!("❌ Failed to deliver the report: {}", e);
                    Ok(1)
                }
            }
        }
        Mode::Schedule => {
            let pipeline = build_pipeline(&args.config_dir, &settings)?;

            println!("⏰ Starting scheduler (Ctrl-C to stop)...");
            scheduler::start(&settings.schedule, Arc::new(pipeline))
                .await
                .context("Scheduler failed")?;
            Ok(0)
        }
    }
}

fn build_notifier(settings: &Settings) -> Result<Notifier> {
    let transport =
        TelegramTransport::new(&settings.telegram).context("Failed to create Telegram client")?;
    Ok(Notifier::new(Arc::new(transport)))
}

/// Wire the model, tools, crew and notifier together.
fn build_pipeline(config_dir: &Path, settings: &Settings) -> Result<ResearchPipeline> {
    let crew_config = CrewConfig::load(config_dir).with_context(|| {
        format!("Failed to load crew definitions from {}", config_dir.display())
    })?;

    let llm = GeminiClient::new(&settings.llm).context("Failed to create Gemini client")?;
    info!("Using model: {}", settings.llm.model);

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(
        SerperSearchTool::new(&settings.search, settings.llm.timeout())
            .context("Failed to create search client")?,
    ));

    let crew = Crew::assemble(&crew_config, Arc::new(llm), &tools, settings.llm.temperature)
        .context("Failed to assemble crew")?;

    Ok(ResearchPipeline::new(
        CrewExecutor::new(Arc::new(crew)),
        build_notifier(settings)?,
        crew_config.title,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let result = dotenvy::from_path(dir.path().join(".env"));

        assert!(ignore_missing(result).is_ok());
    }

    #[test]
    fn test_malformed_env_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "NOT A VALID LINE\n").unwrap();

        let err = ignore_missing(dotenvy::from_path(&path)).unwrap_err();
        assert!(matches!(err, dotenvy::Error::LineParse(..)));

        assert!(load_env(Some(&path)).is_err());
        assert!(load_env(Some(&dir.path().join("absent.env"))).is_err());
    }
}
