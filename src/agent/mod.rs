//! LLM agent modules.
//!
//! This module provides the model client, the tools and the tool-calling
//! loop each crew agent runs.

pub mod agent_loop;
pub mod gemini;
pub mod llm;
pub mod tools;

#[cfg(test)]
pub mod testing;

pub use agent_loop::Agent;
pub use gemini::GeminiClient;
pub use llm::LanguageModel;
pub use tools::{SerperSearchTool, Tool, ToolRegistry};
