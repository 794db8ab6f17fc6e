//! Agent loop for tool-based task execution.
//!
//! An agent answers one prompt at a time. The model may call the agent's
//! tools any number of times within the iteration budget; the first reply
//! without tool calls is the final answer.

use crate::agent::llm::{ChatMessage, LanguageModel, ModelRequest, Part, Role};
use crate::agent::tools::{Tool, ToolResult};
use crate::config::AgentDefinition;
use crate::error::LlmError;
use crate::models::ResearchSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A role-bound agent with its permitted tools.
#[derive(Clone)]
pub struct Agent {
    pub key: String,
    pub definition: AgentDefinition,
    pub tools: Vec<Arc<dyn Tool>>,
}

/// What an agent produced for one prompt.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub text: String,
    pub sources: Vec<ResearchSource>,
    /// Model calls made, including the forced final answer.
    pub iterations: usize,
}

impl Agent {
    pub fn new(
        key: impl Into<String>,
        definition: AgentDefinition,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            key: key.into(),
            definition,
            tools,
        }
    }

    pub fn role(&self) -> &str {
        &self.definition.role
    }

    /// System prompt describing who the agent is.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {role}. {backstory}\nYour personal goal is: {goal}\n\n{rules}",
            role = self.definition.role.trim(),
            backstory = self.definition.backstory.trim(),
            goal = self.definition.goal.trim(),
            rules = if self.tools.is_empty() {
                AGENT_RULES_NO_TOOLS
            } else {
                AGENT_RULES_WITH_TOOLS
            },
        )
    }

    /// Run the tool-calling loop for one prompt.
    pub async fn perform(
        &self,
        llm: &dyn LanguageModel,
        prompt: String,
        temperature: f32,
    ) -> Result<AgentOutput, LlmError> {
        let mut request = ModelRequest {
            system: Some(self.system_prompt()),
            messages: vec![ChatMessage::user_text(prompt)],
            tools: self.tools.iter().map(|t| t.definition()).collect(),
            temperature,
        };
        let mut sources = Vec::new();
        let max_iter = self.definition.max_iter.max(1);

        for iteration in 1..=max_iter {
            self.log_step(format_args!("{} iteration {}/{}", self.key, iteration, max_iter));

            let response = llm.generate(&request).await?;
            let calls: Vec<(String, serde_json::Value)> = response
                .function_calls()
                .into_iter()
                .map(|(name, args)| (name.to_string(), args.clone()))
                .collect();

            if calls.is_empty() {
                let text = response.joined_text();
                if !text.trim().is_empty() {
                    return Ok(AgentOutput {
                        text: text.trim().to_string(),
                        sources,
                        iterations: iteration,
                    });
                }

                warn!("Agent {} returned an empty answer; asking again", self.key);
                request.messages.push(ChatMessage::user_text(CONTINUE_PROMPT));
                continue;
            }

            request.messages.push(ChatMessage {
                role: Role::Model,
                parts: response.parts.clone(),
            });

            let mut replies = Vec::with_capacity(calls.len());
            for (name, args) in calls {
                let result = self.execute_tool(&name, &args).await;
                sources.extend(result.sources.iter().cloned());
                replies.push(Part::FunctionResponse {
                    name,
                    response: result.to_response(),
                });
            }

            request.messages.push(ChatMessage {
                role: Role::User,
                parts: replies,
            });
        }

        info!(
            "Agent {} used its {} iterations; requesting final answer",
            self.key, max_iter
        );
        request.tools.clear();
        request.messages.push(ChatMessage::user_text(FINAL_ANSWER_PROMPT));

        let response = llm.generate(&request).await?;
        let text = response.joined_text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse(response.finish_reason));
        }

        Ok(AgentOutput {
            text: text.trim().to_string(),
            sources,
            iterations: max_iter + 1,
        })
    }

    async fn execute_tool(&self, name: &str, args: &serde_json::Value) -> ToolResult {
        debug!("Agent {} calling tool {} with {}", self.key, name, args);

        let Some(tool) = self.tools.iter().find(|t| t.definition().name == name) else {
            warn!("Agent {} requested unknown tool {}", self.key, name);
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        let result = tool.call(args).await;
        self.log_step(format_args!(
            "{} tool {} -> {}",
            self.key,
            name,
            if result.success { "ok" } else { "error" }
        ));
        result
    }

    fn log_step(&self, message: std::fmt::Arguments<'_>) {
        if self.definition.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

const AGENT_RULES_WITH_TOOLS: &str = "Use the available tools to gather the information you \
need. When you have enough information, reply with your complete final answer as plain text \
without calling any tool.";

const AGENT_RULES_NO_TOOLS: &str = "You have no tools. Work only from the context you are \
given and reply with your complete final answer.";

const CONTINUE_PROMPT: &str = "Please continue and give your complete final answer.";

const FINAL_ANSWER_PROMPT: &str = "You have used all the steps available. Give your best \
complete final answer now, using only the information gathered so far.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{definition, EchoTool, ScriptedModel};
    use crate::agent::llm::ModelResponse;
    use serde_json::json;

    fn call(name: &str, args: serde_json::Value) -> ModelResponse {
        ModelResponse {
            parts: vec![Part::FunctionCall {
                name: name.to_string(),
                args,
            }],
            finish_reason: Some("STOP".to_string()),
        }
    }

    #[tokio::test]
    async fn test_text_answer_is_final() {
        let model = ScriptedModel::new(vec![ModelResponse::text("  Final report  ")]);
        let agent = Agent::new("writer", definition("Writer", 3), vec![]);

        let output = agent.perform(&model, "Write".to_string(), 0.2).await.unwrap();

        assert_eq!(output.text, "Final report");
        assert_eq!(output.iterations, 1);
        let requests = model.requests();
        assert!(requests[0].tools.is_empty());
        assert!(requests[0].system.as_deref().unwrap().starts_with("You are Writer."));
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let model = ScriptedModel::new(vec![
            call("echo", json!({"query": "llm therapy"})),
            ModelResponse::text("Found one source"),
        ]);
        let agent = Agent::new(
            "researcher",
            definition("Researcher", 5),
            vec![Arc::new(EchoTool)],
        );

        let output = agent.perform(&model, "Research".to_string(), 0.2).await.unwrap();

        assert_eq!(output.text, "Found one source");
        assert_eq!(output.iterations, 2);
        assert_eq!(output.sources.len(), 1);
        assert_eq!(output.sources[0].title, "llm therapy");

        let second = &model.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, Role::Model);
        match &second.messages[2].parts[0] {
            Part::FunctionResponse { name, response } => {
                assert_eq!(name, "echo");
                assert_eq!(response["result"], "echo: llm therapy");
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_error_to_model() {
        let model = ScriptedModel::new(vec![
            call("teleport", json!({})),
            ModelResponse::text("done"),
        ]);
        let agent = Agent::new("a", definition("A", 5), vec![Arc::new(EchoTool)]);

        agent.perform(&model, "go".to_string(), 0.2).await.unwrap();

        let second = &model.requests()[1];
        match &second.messages[2].parts[0] {
            Part::FunctionResponse { response, .. } => {
                assert_eq!(response["error"], "Unknown tool: teleport")
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_budget_exhaustion_forces_final_answer() {
        let model = ScriptedModel::new(vec![
            call("echo", json!({"query": "a"})),
            call("echo", json!({"query": "b"})),
            ModelResponse::text("Best effort answer"),
        ]);
        let agent = Agent::new("a", definition("A", 2), vec![Arc::new(EchoTool)]);

        let output = agent.perform(&model, "go".to_string(), 0.2).await.unwrap();

        assert_eq!(output.text, "Best effort answer");
        assert_eq!(output.iterations, 3);
        assert_eq!(output.sources.len(), 2);

        let last = model.requests().pop().unwrap();
        assert!(last.tools.is_empty());
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = ScriptedModel::new(vec![]);
        let agent = Agent::new("a", definition("A", 2), vec![]);

        let err = agent.perform(&model, "go".to_string(), 0.2).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
    }
}
