//! Gemini `generateContent` client.

use crate::agent::llm::{ChatMessage, LanguageModel, ModelRequest, ModelResponse, Part, Role};
use crate::error::LlmError;
use crate::settings::LlmSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Gemini API response body.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// HTTP client for the Gemini API.
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout_seconds: u64,
}

impl GeminiClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            http_client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: settings.timeout_seconds,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let body = to_wire(request);
        debug!(
            "Sending generateContent request with {} messages",
            body.contents.len()
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_seconds)
                } else if e.is_connect() {
                    LlmError::Connect(e.to_string())
                } else {
                    LlmError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let wire: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        from_wire(wire)
    }
}

fn to_wire(request: &ModelRequest) -> GenerateContentRequest {
    let system_instruction = request.system.as_ref().map(|text| Content {
        role: None,
        parts: vec![GeminiPart {
            text: Some(text.clone()),
            ..Default::default()
        }],
    });

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTools {
            function_declarations: request
                .tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    };

    GenerateContentRequest {
        system_instruction,
        contents: request.messages.iter().map(message_to_wire).collect(),
        tools,
        generation_config: GenerationConfig {
            temperature: request.temperature,
        },
    }
}

fn message_to_wire(message: &ChatMessage) -> Content {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "model",
    };

    let parts = message
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => GeminiPart {
                text: Some(text.clone()),
                ..Default::default()
            },
            Part::FunctionCall { name, args } => GeminiPart {
                function_call: Some(FunctionCall {
                    name: name.clone(),
                    args: args.clone(),
                }),
                ..Default::default()
            },
            Part::FunctionResponse { name, response } => GeminiPart {
                function_response: Some(FunctionResponse {
                    name: name.clone(),
                    response: response.clone(),
                }),
                ..Default::default()
            },
        })
        .collect();

    Content {
        role: Some(role.to_string()),
        parts,
    }
}

fn from_wire(response: GenerateContentResponse) -> Result<ModelResponse, LlmError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(LlmError::EmptyResponse(None));
    };

    let parts: Vec<Part> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                Some(Part::FunctionCall {
                    name: call.name,
                    args: call.args,
                })
            } else {
                part.text.map(Part::Text)
            }
        })
        .collect();

    if parts.is_empty() {
        return Err(LlmError::EmptyResponse(candidate.finish_reason));
    }

    Ok(ModelResponse {
        parts,
        finish_reason: candidate.finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::ToolDefinition;
    use serde_json::json;

    fn settings() -> LlmSettings {
        LlmSettings {
            api_key: "key".to_string(),
            model: "gemini-1.5-pro".to_string(),
            temperature: 0.2,
            timeout_seconds: 30,
        }
    }

    #[test]
    fn test_endpoint_uses_model() {
        let client = GeminiClient::new(&settings()).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
        assert_eq!(client.name(), "gemini-1.5-pro");
    }

    #[test]
    fn test_request_serialization() {
        let request = ModelRequest {
            system: Some("You are a researcher.".to_string()),
            messages: vec![
                ChatMessage::user_text("Find papers"),
                ChatMessage {
                    role: Role::Model,
                    parts: vec![Part::FunctionCall {
                        name: "search_internet".to_string(),
                        args: json!({"query": "llm"}),
                    }],
                },
                ChatMessage {
                    role: Role::User,
                    parts: vec![Part::FunctionResponse {
                        name: "search_internet".to_string(),
                        response: json!({"result": "1. Paper"}),
                    }],
                },
            ],
            tools: vec![ToolDefinition {
                name: "search_internet".to_string(),
                description: "Search".to_string(),
                parameters: json!({"type": "object"}),
            }],
            temperature: 0.2,
        };

        let json = serde_json::to_value(to_wire(&request)).unwrap();

        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "You are a researcher."
        );
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(
            json["contents"][1]["parts"][0]["functionCall"]["name"],
            "search_internet"
        );
        assert_eq!(
            json["contents"][2]["parts"][0]["functionResponse"]["response"]["result"],
            "1. Paper"
        );
        assert_eq!(
            json["tools"][0]["functionDeclarations"][0]["name"],
            "search_internet"
        );
        assert!(json["contents"][0]["parts"][0].get("functionCall").is_none());
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let request = ModelRequest {
            system: None,
            messages: vec![ChatMessage::user_text("hi")],
            tools: vec![],
            temperature: 0.5,
        };
        let json = serde_json::to_value(to_wire(&request)).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let wire: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Searching"},
                        {"functionCall": {"name": "search_internet", "args": {"query": "x"}}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let response = from_wire(wire).unwrap();
        assert_eq!(response.parts.len(), 2);
        assert_eq!(response.function_calls()[0].0, "search_internet");
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_response_without_content_is_error() {
        let wire: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();

        match from_wire(wire) {
            Err(LlmError::EmptyResponse(reason)) => assert_eq!(reason.as_deref(), Some("SAFETY")),
            other => panic!("unexpected: {other:?}"),
        }

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(from_wire(empty), Err(LlmError::EmptyResponse(None))));
    }
}
