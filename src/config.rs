//! Crew definition files.
//!
//! This module loads agent and task definitions from `agents.toml` and
//! `tasks.toml` in the configuration directory.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const AGENTS_FILE: &str = "agents.toml";
pub const TASKS_FILE: &str = "tasks.toml";

/// Definition of a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub role: String,
    pub goal: String,
    pub backstory: String,

    /// Log every step of this agent at info level.
    #[serde(default)]
    pub verbose: bool,

    /// Maximum model calls before the agent must answer.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Names of tools this agent may call.
    #[serde(default)]
    pub tools: Vec<String>,
}

fn default_max_iter() -> usize {
    15
}

/// Definition of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub description: String,
    pub expected_output: String,

    /// Key of the agent that performs this task.
    pub agent: String,

    /// Keys of tasks whose output this task needs.
    #[serde(default)]
    pub context: Vec<String>,
}

/// Contents of `agents.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsFile {
    #[serde(default)]
    pub agents: BTreeMap<String, AgentDefinition>,
}

/// Contents of `tasks.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksFile {
    /// Title used in report notifications.
    #[serde(default = "default_title")]
    pub title: String,

    /// Run the planning pass before executing tasks.
    #[serde(default = "default_true")]
    pub planning: bool,

    /// Tasks in declaration order.
    #[serde(default)]
    pub tasks: Vec<NamedTask>,
}

/// A task definition together with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTask {
    pub key: String,
    #[serde(flatten)]
    pub task: TaskDefinition,
}

fn default_title() -> String {
    "LLM Mental Health Research Report".to_string()
}

fn default_true() -> bool {
    true
}

/// Everything the assembler needs to build a crew.
#[derive(Debug, Clone)]
pub struct CrewConfig {
    pub agents: BTreeMap<String, AgentDefinition>,
    pub tasks: Vec<NamedTask>,
    pub title: String,
    pub planning: bool,
}

impl CrewConfig {
    /// Load both definition files from a directory.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let agents: AgentsFile = load_toml(&dir.join(AGENTS_FILE))?;
        let tasks: TasksFile = load_toml(&dir.join(TASKS_FILE))?;

        Ok(Self::from_files(agents, tasks))
    }

    /// Parse definitions from in-memory TOML documents.
    pub fn from_strs(agents: &str, tasks: &str) -> Result<Self, ConfigError> {
        let agents: AgentsFile = toml::from_str(agents).map_err(|source| ConfigError::Parse {
            path: AGENTS_FILE.to_string(),
            source,
        })?;
        let tasks: TasksFile = toml::from_str(tasks).map_err(|source| ConfigError::Parse {
            path: TASKS_FILE.to_string(),
            source,
        })?;

        Ok(Self::from_files(agents, tasks))
    }

    fn from_files(agents: AgentsFile, tasks: TasksFile) -> Self {
        Self {
            agents: agents.agents,
            tasks: tasks.tasks,
            title: tasks.title,
            planning: tasks.planning,
        }
    }
}

fn load_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
