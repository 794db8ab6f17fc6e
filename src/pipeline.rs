//! One research run: execute the crew, then deliver the outcome.

use crate::crew::CrewExecutor;
use crate::error::NotifyError;
use crate::models::{CrewExecutionResult, ExecutionStatus};
use crate::notifier::Notifier;
use crate::scheduler::Job;
use async_trait::async_trait;
use tracing::{error, info, warn};

pub struct ResearchPipeline {
    executor: CrewExecutor,
    notifier: Notifier,
    title: String,
}

impl ResearchPipeline {
    pub fn new(executor: CrewExecutor, notifier: Notifier, title: impl Into<String>) -> Self {
        Self {
            executor,
            notifier,
            title: title.into(),
        }
    }

    /// Run the crew and send its report or error.
    ///
    /// Crew failures are delivered as error messages and are not errors
    /// here; only a failed delivery is.
    pub async fn run_once(&self) -> Result<CrewExecutionResult, NotifyError> {
        let result = self.executor.execute().await;

        match result.status() {
            ExecutionStatus::Success => info!(
                "Research completed in {:.2}s",
                result.execution_time_seconds
            ),
            ExecutionStatus::Partial => warn!(
                "Research finished with an incomplete result in {:.2}s",
                result.execution_time_seconds
            ),
            ExecutionStatus::Failure => error!(
                "Research failed: {}",
                result.error().unwrap_or("unknown error")
            ),
        }

        self.notifier.send_outcome(&self.title, &result).await?;
        info!(
            "Notification for {} sent ({})",
            result.execution_id,
            result.status()
        );
        Ok(result)
    }
}

#[async_trait]
impl Job for ResearchPipeline {
    async fn run(&self) {
        if let Err(e) = self.run_once().await {
            error!("Failed to deliver research notification: {}", e);
        }
    }
}
