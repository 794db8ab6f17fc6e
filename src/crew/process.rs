//! Sequential crew process.
//!
//! Tasks run one at a time in dependency order. With planning enabled, a
//! single model call first drafts a step plan for every task; each plan is
//! added to its task's prompt.

use crate::agent::llm::{ChatMessage, ModelRequest};
use crate::crew::assembler::{Crew, Task};
use crate::crew::{CrewOutput, Orchestrator, TaskOutput};
use crate::error::CrewError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct PlanResponse {
    #[serde(default)]
    plans: Vec<TaskPlan>,
}

#[derive(Debug, Deserialize)]
struct TaskPlan {
    task: String,
    plan: String,
}

impl Crew {
    /// Run every task in order and collect their outputs.
    pub async fn run(&self) -> Result<CrewOutput, CrewError> {
        if self.tasks.is_empty() {
            return Err(CrewError::NoTasks);
        }

        let plans = if self.planning {
            self.plan().await?
        } else {
            HashMap::new()
        };

        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());

        for (index, task) in self.tasks.iter().enumerate() {
            let Some(agent) = self.agents.get(&task.agent) else {
                return Err(crate::error::ConfigError::Crew(format!(
                    "task '{}' references unknown agent '{}'",
                    task.key, task.agent
                ))
                .into());
            };

            info!(
                "Task {}/{} '{}' started by {}",
                index + 1,
                self.tasks.len(),
                task.key,
                agent.role()
            );
            let started = Instant::now();

            let prompt = task_prompt(task, plans.get(&task.key).map(String::as_str), &outputs);
            let output = agent
                .perform(self.llm.as_ref(), prompt, self.temperature)
                .await
                .map_err(|source| CrewError::Task {
                    task: task.key.clone(),
                    source,
                })?;

            info!(
                "Task '{}' finished in {:.1}s ({} model calls, {} sources)",
                task.key,
                started.elapsed().as_secs_f64(),
                output.iterations,
                output.sources.len()
            );

            outputs.push(TaskOutput {
                key: task.key.clone(),
                agent_role: agent.role().to_string(),
                text: output.text,
                sources: output.sources,
            });
        }

        let crew_output = CrewOutput { tasks: outputs };

        let research = crew_output.research();
        match crew_output.analysis() {
            Some(analysis) => info!(
                "Crew finished: {} sources, {} trends, {} recommendations",
                research.sources.len(),
                analysis.trends.len(),
                analysis.recommendations.len()
            ),
            None => info!("Crew finished: {} sources", research.sources.len()),
        }

        Ok(crew_output)
    }

    /// Ask the model for a step plan per task.
    async fn plan(&self) -> Result<HashMap<String, String>, CrewError> {
        info!("Planning {} tasks with {}", self.tasks.len(), self.llm.name());

        let request = ModelRequest {
            system: Some(PLANNER_SYSTEM_PROMPT.to_string()),
            messages: vec![ChatMessage::user_text(self.planning_prompt())],
            tools: Vec::new(),
            temperature: self.temperature,
        };

        let response = self
            .llm
            .generate(&request)
            .await
            .map_err(CrewError::Planning)?;

        let plans = parse_plans(&response.joined_text());
        if plans.is_empty() {
            warn!("Planner returned no usable plans; continuing without them");
        } else {
            debug!("Planner produced plans for {} tasks", plans.len());
        }

        Ok(plans)
    }

    fn planning_prompt(&self) -> String {
        let mut prompt = String::from("Create a step-by-step plan for each of these tasks.\n\n");

        for (i, task) in self.tasks.iter().enumerate() {
            let role = self
                .agents
                .get(&task.agent)
                .map(|a| a.role())
                .unwrap_or(task.agent.as_str());
            let tools: Vec<String> = self
                .agents
                .get(&task.agent)
                .map(|a| a.tools.iter().map(|t| t.definition().name).collect())
                .unwrap_or_default();

            prompt.push_str(&format!("### Task {}: {}\n", i + 1, task.key));
            prompt.push_str(&format!("Agent: {}\n", role));
            if !tools.is_empty() {
                prompt.push_str(&format!("Tools: {}\n", tools.join(", ")));
            }
            prompt.push_str(&format!("Description: {}\n", task.description.trim()));
            prompt.push_str(&format!("Expected output: {}\n\n", task.expected_output.trim()));
        }

        prompt.push_str(
            r#"Respond with only a JSON object of the form {"plans": [{"task": "<task key>", "plan": "<numbered steps>"}]}"#,
        );
        prompt
    }
}

#[async_trait]
impl Orchestrator for Crew {
    async fn kickoff(&self) -> Result<CrewOutput, CrewError> {
        self.run().await
    }
}

/// Build the prompt for one task from its definition, plan and the
/// outputs of the tasks it depends on.
fn task_prompt(task: &Task, plan: Option<&str>, completed: &[TaskOutput]) -> String {
    let mut prompt = String::new();

    prompt.push_str(task.description.trim());
    prompt.push_str("\n\nThis is the expected criteria for your final answer: ");
    prompt.push_str(task.expected_output.trim());
    prompt.push_str(
        "\nYou MUST return the actual complete content as the final answer, not a summary.",
    );

    if let Some(plan) = plan {
        prompt.push_str("\n\nFollow this plan:\n");
        prompt.push_str(plan.trim());
    }

    let context: Vec<&TaskOutput> = task
        .context
        .iter()
        .filter_map(|dep| completed.iter().find(|o| &o.key == dep))
        .collect();

    if !context.is_empty() {
        prompt.push_str("\n\nThis is the context you're working with:");
        for output in context {
            prompt.push_str(&format!(
                "\n\n### {} ({})\n{}",
                output.key, output.agent_role, output.text
            ));
        }
    }

    prompt
}

/// Extract plans from the planner's reply. Tolerates code fences and
/// surrounding prose; returns an empty map when nothing parses.
fn parse_plans(text: &str) -> HashMap<String, String> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return HashMap::new();
    };
    if end < start {
        return HashMap::new();
    }

    match serde_json::from_str::<PlanResponse>(&text[start..=end]) {
        Ok(parsed) => parsed
            .plans
            .into_iter()
            .filter(|p| !p.plan.trim().is_empty())
            .map(|p| (p.task, p.plan))
            .collect(),
        Err(e) => {
            debug!("Failed to parse planner output: {}", e);
            HashMap::new()
        }
    }
}

const PLANNER_SYSTEM_PROMPT: &str = "You are a planning assistant for a team of AI agents. \
You write short, concrete, numbered plans that the assigned agent can follow.";
