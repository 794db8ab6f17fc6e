//! Execution wrapper.
//!
//! Runs the orchestrator once, times it and turns every outcome (success,
//! error or panic) into a [`CrewExecutionResult`]. Callers never see an
//! error from this path.

use crate::crew::{CrewOutput, Orchestrator};
use crate::models::CrewExecutionResult;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs a crew and normalizes the outcome.
#[derive(Clone)]
pub struct CrewExecutor {
    engine: Arc<dyn Orchestrator>,
}

impl CrewExecutor {
    pub fn new(engine: Arc<dyn Orchestrator>) -> Self {
        Self { engine }
    }

    /// Run the crew once.
    pub async fn execute(&self) -> CrewExecutionResult {
        let execution_id = new_execution_id();
        let start = Instant::now();

        info!("Starting crew execution: {}", execution_id);

        let engine = Arc::clone(&self.engine);
        let joined = tokio::spawn(async move { engine.kickoff().await }).await;

        let outcome = match joined {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(join_error) => Err(format!("crew run aborted: {join_error}")),
        };

        finish(execution_id, start, outcome)
    }

    /// Run the crew once on a private runtime.
    ///
    /// Must not be called from inside a tokio runtime.
    #[allow(dead_code)]
    pub fn execute_blocking(&self) -> CrewExecutionResult {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.execute()),
            Err(e) => {
                let message = format!("Crew execution failed: could not start runtime: {e}");
                error!("{}", message);
                CrewExecutionResult::failure(new_execution_id(), message, 0.0)
            }
        }
    }
}

fn new_execution_id() -> String {
    format!("exec_{}", Utc::now().timestamp())
}

fn finish(
    execution_id: String,
    start: Instant,
    outcome: Result<CrewOutput, String>,
) -> CrewExecutionResult {
    let seconds = start.elapsed().as_secs_f64();

    match outcome {
        Ok(output) => {
            let report = output.report().trim().to_string();
            if report.is_empty() {
                let warning = "Crew finished without producing a report".to_string();
                warn!("{} ({:.2}s)", warning, seconds);
                CrewExecutionResult::partial(execution_id, report, warning, seconds)
            } else {
                info!("Crew execution completed in {:.2}s", seconds);
                CrewExecutionResult::success(execution_id, report, seconds)
            }
        }
        Err(e) => {
            let message = format!("Crew execution failed: {}", e);
            error!("{}", message);
            CrewExecutionResult::failure(execution_id, message, seconds)
        }
    }
}
