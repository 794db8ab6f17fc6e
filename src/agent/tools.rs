//! Tools the agents can call.
//!
//! Only the researcher has a tool by default: web search through the
//! Serper API.

use crate::agent::llm::ToolDefinition;
use crate::error::{ConfigError, SearchError};
use crate::models::ResearchSource;
use crate::settings::SearchSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const SEARCH_TOOL_NAME: &str = "search_internet";

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sources surfaced by the call, kept for the research record.
    #[serde(skip)]
    pub sources: Vec<ResearchSource>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
            sources: Vec::new(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<ResearchSource>) -> Self {
        self.sources = sources;
        self
    }

    /// The payload handed back to the model as a function response.
    pub fn to_response(&self) -> Value {
        if self.success {
            json!({ "result": self.output })
        } else {
            json!({ "error": self.error.clone().unwrap_or_default() })
        }
    }
}

/// A function exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, args: &Value) -> ToolResult;
}

/// Named set of available tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    /// Resolve a list of tool names. Unknown names are configuration errors.
    pub fn resolve(
        &self,
        agent: &str,
        names: &[String],
    ) -> Result<Vec<Arc<dyn Tool>>, ConfigError> {
        names
            .iter()
            .map(|name| {
                self.tools.get(name).cloned().ok_or_else(|| {
                    ConfigError::Crew(format!("agent '{agent}' references unknown tool '{name}'"))
                })
            })
            .collect()
    }
}

/// Serper search response.
#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Web search through google.serper.dev.
pub struct SerperSearchTool {
    http_client: reqwest::Client,
    api_key: String,
    max_results: usize,
    endpoint: String,
}

impl SerperSearchTool {
    pub fn new(settings: &SearchSettings, timeout: Duration) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key: settings.api_key.clone(),
            max_results: settings.max_results,
            endpoint: SERPER_ENDPOINT.to_string(),
        })
    }

    /// Run one search and return the organic results as sources.
    pub async fn search(&self, query: &str) -> Result<Vec<ResearchSource>, SearchError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": self.max_results }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api { status, body });
        }

        let parsed: SerperResponse = response.json().await?;
        Ok(to_sources(parsed, self.max_results))
    }
}

#[async_trait]
impl Tool for SerperSearchTool {
    fn definition(&self) -> ToolDefinition {
        search_tool_definition()
    }

    async fn call(&self, args: &Value) -> ToolResult {
        let query = match args.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q,
            _ => return ToolResult::error("Missing required parameter: query".to_string()),
        };

        debug!("Searching the web for: {}", query);

        match self.search(query).await {
            Ok(sources) if sources.is_empty() => {
                ToolResult::success(format!("No results found for '{query}'."))
            }
            Ok(sources) => ToolResult::success(format_sources(&sources)).with_sources(sources),
            Err(e) => {
                warn!("Search failed for '{}': {}", query, e);
                ToolResult::error(format!("Search failed: {e}"))
            }
        }
    }
}

pub fn search_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_TOOL_NAME.to_string(),
        description: "Search the internet and return the top results with title, link, date \
                      and snippet. Use specific queries."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        }),
    }
}

fn to_sources(response: SerperResponse, max: usize) -> Vec<ResearchSource> {
    response
        .organic
        .into_iter()
        .take(max)
        .map(|r| {
            let mut source = ResearchSource::new(r.title, r.link);
            source.publication_date = r.date;
            source.key_findings = r.snippet.into_iter().collect();
            source
        })
        .collect()
}

/// Render sources as a numbered list for the model.
pub fn format_sources(sources: &[ResearchSource]) -> String {
    let mut out = String::new();

    for (i, source) in sources.iter().enumerate() {
        out.push_str(&format!("{}. {}\n   Link: {}\n", i + 1, source.title, source.url));
        if let Some(ref date) = source.publication_date {
            out.push_str(&format!("   Date: {}\n", date));
        }
        for finding in &source.key_findings {
            out.push_str(&format!("   Snippet: {}\n", finding));
        }
    }

    out.trim_end().to_string()
}
