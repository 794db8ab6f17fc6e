//! Crew orchestration.
//!
//! A crew is a set of agents and tasks with explicit dependencies, run
//! sequentially in dependency order:
//! - `assembler`: builds and validates the crew from definition files
//! - `process`: the sequential process with its planning pass
//! - `executor`: the execution wrapper producing [`CrewExecutionResult`]s
//!
//! [`CrewExecutionResult`]: crate::models::CrewExecutionResult

pub mod assembler;
pub mod executor;
pub mod process;

pub use assembler::{Crew, Task};
pub use executor::CrewExecutor;

use crate::error::CrewError;
use crate::models::{AnalysisResult, ResearchResult, ResearchSource};
use async_trait::async_trait;

/// Something that can run the whole pipeline once.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn kickoff(&self) -> Result<CrewOutput, CrewError>;
}

/// Output of one task.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub key: String,
    pub agent_role: String,
    pub text: String,
    pub sources: Vec<ResearchSource>,
}

/// Output of a whole crew run. Tasks are in execution order.
#[derive(Debug, Clone)]
pub struct CrewOutput {
    pub tasks: Vec<TaskOutput>,
}

impl CrewOutput {
    /// The final report: output of the last task.
    pub fn report(&self) -> &str {
        self.tasks.last().map(|t| t.text.as_str()).unwrap_or("")
    }

    /// Research record: the first task's answer plus every source any task
    /// surfaced, deduplicated by URL.
    pub fn research(&self) -> ResearchResult {
        let mut sources: Vec<ResearchSource> = Vec::new();
        for source in self.tasks.iter().flat_map(|t| &t.sources) {
            if !sources.iter().any(|s| s.url == source.url) {
                sources.push(source.clone());
            }
        }

        let summary = self.tasks.first().map(|t| t.text.clone()).unwrap_or_default();
        ResearchResult::new(summary, sources)
    }

    /// Analysis record: the answer of the task just before the report,
    /// when there is one distinct from the research task.
    pub fn analysis(&self) -> Option<AnalysisResult> {
        if self.tasks.len() < 3 {
            return None;
        }
        let task = &self.tasks[self.tasks.len() - 2];
        Some(AnalysisResult::from_text(&task.text))
    }
}
