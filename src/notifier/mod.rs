//! Report delivery.
//!
//! Reports are split into transport-sized chunks and sent in order through
//! a [`Transport`]. The Telegram Bot API is the only real transport.

pub mod chunking;
pub mod delivery;
pub mod telegram;

pub use delivery::Notifier;
pub use telegram::TelegramTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use serde::Deserialize;

/// How the transport should interpret message markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Markdown,
    Plain,
}

/// Identity of the bot behind a transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
}

/// A chat transport that accepts one message per call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a single message. The text must already fit the size limit.
    async fn send_message(&self, text: &str, parse_mode: ParseMode) -> Result<(), TransportError>;

    /// Look up the bot identity; used as a connectivity check.
    async fn get_me(&self) -> Result<BotIdentity, TransportError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every send; pops a scripted result per call, `Ok` when the
    /// script is exhausted.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<(String, ParseMode)>>,
        script: Mutex<VecDeque<Result<(), TransportError>>>,
    }

    impl RecordingTransport {
        pub fn with_script(script: Vec<Result<(), TransportError>>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                script: Mutex::new(script.into()),
            }
        }

        pub fn sent(&self) -> Vec<(String, ParseMode)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_message(
            &self,
            text: &str,
            parse_mode: ParseMode,
        ) -> Result<(), TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push((text.to_string(), parse_mode));
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn get_me(&self) -> Result<BotIdentity, TransportError> {
            Ok(BotIdentity {
                id: 42,
                username: Some("research_crew_bot".to_string()),
                first_name: "Research Crew".to_string(),
            })
        }
    }
}
