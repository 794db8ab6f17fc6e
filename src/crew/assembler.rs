//! Crew assembly and validation.
//!
//! Tasks carry an explicit list of the tasks they depend on. Assembly
//! rejects unknown agents, unknown or duplicate tasks and dependency
//! cycles, then fixes the execution order.

use crate::agent::{Agent, LanguageModel, ToolRegistry};
use crate::config::CrewConfig;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// A unit of work bound to one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub key: String,
    pub description: String,
    pub expected_output: String,
    /// Key of the agent that performs the task.
    pub agent: String,
    /// Keys of the tasks whose output this task receives, in order.
    pub context: Vec<String>,
}

/// Agents, tasks and process settings ready to run.
pub struct Crew {
    pub(crate) agents: HashMap<String, Agent>,
    /// Tasks in execution order.
    pub(crate) tasks: Vec<Task>,
    pub(crate) llm: Arc<dyn LanguageModel>,
    pub(crate) planning: bool,
    pub(crate) temperature: f32,
}

impl Crew {
    /// Build a crew from definitions, resolving agent tools from the registry.
    pub fn assemble(
        config: &CrewConfig,
        llm: Arc<dyn LanguageModel>,
        tools: &ToolRegistry,
        temperature: f32,
    ) -> Result<Self, ConfigError> {
        let mut agents = HashMap::new();
        for (key, definition) in &config.agents {
            let agent_tools = tools.resolve(key, &definition.tools)?;
            agents.insert(
                key.clone(),
                Agent::new(key.clone(), definition.clone(), agent_tools),
            );
        }

        let tasks: Vec<Task> = config
            .tasks
            .iter()
            .map(|named| Task {
                key: named.key.clone(),
                description: named.task.description.clone(),
                expected_output: named.task.expected_output.clone(),
                agent: named.task.agent.clone(),
                context: named.task.context.clone(),
            })
            .collect();

        for task in &tasks {
            if !agents.contains_key(&task.agent) {
                return Err(ConfigError::Crew(format!(
                    "task '{}' references unknown agent '{}'",
                    task.key, task.agent
                )));
            }
        }

        let tasks = execution_order(tasks)?;

        info!(
            "Crew assembled: {} agents, {} tasks ({})",
            agents.len(),
            tasks.len(),
            tasks
                .iter()
                .map(|t| t.key.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Self {
            agents,
            tasks,
            llm,
            planning: config.planning,
            temperature,
        })
    }

    #[allow(dead_code)]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[allow(dead_code)]
    pub fn agent(&self, key: &str) -> Option<&Agent> {
        self.agents.get(key)
    }
}

/// Order tasks so every task comes after its dependencies. Among tasks
/// that are ready at the same time, declaration order wins.
pub fn execution_order(tasks: Vec<Task>) -> Result<Vec<Task>, ConfigError> {
    let mut seen = HashSet::new();
    for task in &tasks {
        if !seen.insert(task.key.as_str()) {
            return Err(ConfigError::Crew(format!("duplicate task '{}'", task.key)));
        }
    }

    for task in &tasks {
        for dep in &task.context {
            if !seen.contains(dep.as_str()) {
                return Err(ConfigError::Crew(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.key, dep
                )));
            }
            if dep == &task.key {
                return Err(ConfigError::Crew(format!(
                    "task '{}' depends on itself",
                    task.key
                )));
            }
        }
    }

    let mut done: HashSet<String> = HashSet::new();
    let mut pending = tasks;
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let Some(index) = pending
            .iter()
            .position(|t| t.context.iter().all(|d| done.contains(d)))
        else {
            let stuck: Vec<&str> = pending.iter().map(|t| t.key.as_str()).collect();
            return Err(ConfigError::Crew(format!(
                "dependency cycle among tasks: {}",
                stuck.join(", ")
            )));
        };

        let task = pending.remove(index);
        done.insert(task.key.clone());
        ordered.push(task);
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;

    fn task(key: &str, context: &[&str]) -> Task {
        Task {
            key: key.to_string(),
            description: format!("do {key}"),
            expected_output: "something".to_string(),
            agent: "worker".to_string(),
            context: context.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn keys(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.key.as_str()).collect()
    }

    #[test]
    fn test_order_respects_dependencies() {
        let ordered = execution_order(vec![
            task("report", &["search", "analyze"]),
            task("analyze", &["search"]),
            task("search", &[]),
        ])
        .unwrap();

        assert_eq!(keys(&ordered), vec!["search", "analyze", "report"]);
    }

    #[test]
    fn test_order_is_stable_for_independent_tasks() {
        let ordered =
            execution_order(vec![task("b", &[]), task("a", &[]), task("c", &["a"])]).unwrap();
        assert_eq!(keys(&ordered), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = execution_order(vec![task("a", &["b"]), task("b", &["a"]), task("c", &[])])
            .unwrap_err();
        assert!(err.to_string().contains("dependency cycle among tasks: a, b"));
    }

    #[test]
    fn test_unknown_and_self_dependencies_are_rejected() {
        let err = execution_order(vec![task("a", &["ghost"])]).unwrap_err();
        assert!(err.to_string().contains("unknown task 'ghost'"));

        let err = execution_order(vec![task("a", &["a"])]).unwrap_err();
        assert!(err.to_string().contains("depends on itself"));

        let err = execution_order(vec![task("a", &[]), task("a", &[])]).unwrap_err();
        assert!(err.to_string().contains("duplicate task 'a'"));
    }

    #[test]
    fn test_assemble_shipped_crew() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
        let config = CrewConfig::load(&dir).unwrap();

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(crate::agent::testing::SearchStub));

        let crew = Crew::assemble(&config, Arc::new(ScriptedModel::new(vec![])), &registry, 0.2)
            .unwrap();

        assert_eq!(
            keys(crew.tasks()),
            vec!["search_research", "analyze_findings", "generate_report"]
        );
        assert_eq!(
            crew.tasks()[2].context,
            vec!["search_research", "analyze_findings"]
        );
        assert_eq!(crew.agent("researcher").unwrap().tools.len(), 1);
        assert!(crew.agent("analyst").unwrap().tools.is_empty());
    }

    #[test]
    fn test_assemble_rejects_unknown_agent_and_tool() {
        let agents = r#"
[agents.worker]
role = "Worker"
goal = "Work"
backstory = "Works"
"#;
        let tasks = r#"
[[tasks]]
key = "a"
description = "d"
expected_output = "e"
agent = "nobody"
"#;
        let config = CrewConfig::from_strs(agents, tasks).unwrap();
        let err = Crew::assemble(
            &config,
            Arc::new(ScriptedModel::new(vec![])),
            &ToolRegistry::new(),
            0.2,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("unknown agent 'nobody'"));

        let agents_with_tool = format!("{agents}tools = [\"search_internet\"]\n");
        let config = CrewConfig::from_strs(&agents_with_tool, tasks).unwrap();
        let err = Crew::assemble(
            &config,
            Arc::new(ScriptedModel::new(vec![])),
            &ToolRegistry::new(),
            0.2,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("unknown tool 'search_internet'"));
    }
}
