//! Test doubles for the model and tool seams.

use crate::agent::llm::{LanguageModel, ModelRequest, ModelResponse, ToolDefinition};
use crate::agent::tools::{Tool, ToolResult};
use crate::config::AgentDefinition;
use crate::error::LlmError;
use crate::models::ResearchSource;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replies with a fixed script of responses and records every request.
/// Once the script runs out every call fails with a 500.
pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Api {
                status: 500,
                body: "script exhausted".to_string(),
            })
    }
}

/// Echoes its `query` argument and reports it as a source title.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echo the query".to_string(),
            parameters: json!({"type": "object"}),
        }
    }

    async fn call(&self, args: &Value) -> ToolResult {
        let query = args["query"].as_str().unwrap_or_default();
        ToolResult::success(format!("echo: {query}")).with_sources(vec![ResearchSource::new(
            query,
            format!("https://example.org/{query}"),
        )])
    }
}

pub fn definition(role: &str, max_iter: usize) -> AgentDefinition {
    AgentDefinition {
        role: role.to_string(),
        goal: format!("Be a good {role}"),
        backstory: "Experienced.".to_string(),
        verbose: false,
        max_iter,
        tools: Vec::new(),
    }
}

/// Stands in for the web search tool without touching the network.
pub struct SearchStub;

#[async_trait]
impl Tool for SearchStub {
    fn definition(&self) -> ToolDefinition {
        crate::agent::tools::search_tool_definition()
    }

    async fn call(&self, args: &Value) -> ToolResult {
        let query = args["query"].as_str().unwrap_or_default();
        let source = ResearchSource::new(format!("Result for {query}"), "https://example.org/1");
        ToolResult::success(crate::agent::tools::format_sources(std::slice::from_ref(&source)))
            .with_sources(vec![source])
    }
}
