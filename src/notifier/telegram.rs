//! Telegram Bot API transport.

use crate::error::TransportError;
use crate::notifier::{BotIdentity, ParseMode, Transport};
use crate::settings::TelegramSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_BASE_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Sends messages to one chat through the Bot API.
pub struct TelegramTransport {
    http_client: reqwest::Client,
    base_url: String,
    chat_id: String,
}

impl TelegramTransport {
    pub fn new(settings: &TelegramSettings) -> Result<Self, TransportError> {
        Self::with_api_base(settings, API_BASE_URL)
    }

    fn with_api_base(settings: &TelegramSettings, api_base: &str) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: format!("{}/bot{}", api_base, settings.bot_token),
            chat_id: settings.chat_id.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn read_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<Option<T>, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await?;

        let parsed: Option<ApiResponse<T>> = serde_json::from_str(&body).ok();
        match parsed {
            Some(api) if api.ok && (200..300).contains(&status) => Ok(api.result),
            Some(api) => Err(classify_error(
                status,
                api.description.unwrap_or_else(|| body.clone()),
            )),
            None => Err(classify_error(status, body)),
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, text: &str, parse_mode: ParseMode) -> Result<(), TransportError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: match parse_mode {
                ParseMode::Markdown => Some("Markdown"),
                ParseMode::Plain => None,
            },
            disable_web_page_preview: true,
        };

        debug!(
            "sendMessage: {} chars, parse mode {:?}",
            text.chars().count(),
            parse_mode
        );

        let response = self
            .http_client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        Self::read_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn get_me(&self) -> Result<BotIdentity, TransportError> {
        let response = self.http_client.get(self.method_url("getMe")).send().await?;

        Self::read_response::<BotIdentity>(response)
            .await?
            .ok_or_else(|| TransportError::Api {
                status: 200,
                description: "getMe returned no result".to_string(),
            })
    }
}

/// Map a rejected request to a transport error. Telegram reports markup
/// problems as "Bad Request: can't parse entities".
pub fn classify_error(status: u16, description: String) -> TransportError {
    if description.to_lowercase().contains("can't parse") {
        TransportError::MarkupParse(description)
    } else {
        TransportError::Api {
            status,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TelegramSettings {
        TelegramSettings {
            bot_token: "123:abc".to_string(),
            chat_id: "-1001".to_string(),
        }
    }

    #[test]
    fn test_method_url() {
        let transport = TelegramTransport::new(&settings()).unwrap();
        assert_eq!(
            transport.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_request_errors_do_not_expose_token() {
        let settings = TelegramSettings {
            bot_token: "123456:SECRET-TOKEN".to_string(),
            chat_id: "-1001".to_string(),
        };
        // Nothing listens on port 1, so every request fails in transport.
        let transport = TelegramTransport::with_api_base(&settings, "http://127.0.0.1:1").unwrap();

        let source = transport
            .send_message("hello", ParseMode::Markdown)
            .await
            .unwrap_err();
        assert!(matches!(source, TransportError::Http(_)));
        let delivery = crate::error::NotifyError::Delivery {
            sent: 0,
            total: 1,
            source,
        };
        assert!(!delivery.to_string().contains("SECRET-TOKEN"));
        assert!(!format!("{delivery:?}").contains("SECRET-TOKEN"));

        let err = transport.get_me().await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-TOKEN"));
    }

    #[test]
    fn test_send_message_body() {
        let markdown = SendMessageRequest {
            chat_id: "-1001",
            text: "*hi*",
            parse_mode: Some("Markdown"),
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&markdown).unwrap();
        assert_eq!(json["parse_mode"], "Markdown");
        assert_eq!(json["disable_web_page_preview"], true);

        let plain = SendMessageRequest {
            parse_mode: None,
            ..markdown
        };
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("parse_mode").is_none());
        assert_eq!(json["chat_id"], "-1001");
    }

    #[test]
    fn test_classify_markup_error() {
        let err = classify_error(
            400,
            "Bad Request: can't parse entities: Can't find end of the entity".to_string(),
        );
        assert!(matches!(err, TransportError::MarkupParse(_)));

        let err = classify_error(403, "Forbidden: bot was blocked by the user".to_string());
        assert!(matches!(err, TransportError::Api { status: 403, .. }));
    }

    #[test]
    fn test_get_me_envelope() {
        let api: ApiResponse<BotIdentity> = serde_json::from_str(
            r#"{"ok":true,"result":{"id":7,"is_bot":true,"first_name":"Crew","username":"crew_bot"}}"#,
        )
        .unwrap();
        assert!(api.ok);
        let me = api.result.unwrap();
        assert_eq!(me.username.as_deref(), Some("crew_bot"));

        let failed: ApiResponse<BotIdentity> =
            serde_json::from_str(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
                .unwrap();
        assert!(!failed.ok);
        assert_eq!(failed.description.as_deref(), Some("Unauthorized"));
    }
}
