//! Chunked, ordered delivery with a markup fallback.

use crate::error::{NotifyError, TransportError};
use crate::models::{CrewExecutionResult, ExecutionOutcome};
use crate::notifier::chunking::{split_message, MAX_MESSAGE_LENGTH};
use crate::notifier::{BotIdentity, ParseMode, Transport};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause between consecutive chunks of one message.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_secs(1);

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Formats and delivers messages through a [`Transport`].
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn Transport>,
    max_message_length: usize,
    chunk_delay: Duration,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_message_length: MAX_MESSAGE_LENGTH,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Send chunks in order, pausing between them.
    ///
    /// A chunk rejected for its markup is retried once as plain text. Any
    /// other failure stops delivery; chunks already sent stay sent.
    pub async fn deliver(&self, chunks: &[String]) -> Result<usize, NotifyError> {
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(source) = self.send_chunk(chunk).await {
                error!(
                    "Failed to send chunk {}/{}: {}",
                    index + 1,
                    total,
                    source
                );
                return Err(NotifyError::Delivery {
                    sent: index,
                    total,
                    source,
                });
            }

            debug!("Sent chunk {}/{}", index + 1, total);

            if index + 1 < total {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        Ok(total)
    }

    async fn send_chunk(&self, chunk: &str) -> Result<(), TransportError> {
        match self.transport.send_message(chunk, ParseMode::Markdown).await {
            Err(TransportError::MarkupParse(description)) => {
                warn!(
                    "Markup rejected ({}), retrying chunk as plain text",
                    description
                );
                self.transport.send_message(chunk, ParseMode::Plain).await
            }
            other => other,
        }
    }

    /// Split and deliver a message. Returns the number of chunks sent.
    pub async fn send_message(&self, text: &str) -> Result<usize, NotifyError> {
        let chunks = split_message(text, self.max_message_length);
        let sent = self.deliver(&chunks).await?;
        info!("Message sent to Telegram ({} chunk(s))", sent);
        Ok(sent)
    }

    /// Send a report under a header carrying timing information.
    pub async fn send_report(
        &self,
        title: &str,
        report: &str,
        execution_seconds: f64,
    ) -> Result<usize, NotifyError> {
        let message = format_report(title, report, execution_seconds, Local::now());
        self.send_message(&message).await
    }

    pub async fn send_error(&self, error: &str) -> Result<usize, NotifyError> {
        self.send_message(&format_error(error)).await
    }

    /// Send whatever a crew run produced: the report, or the reason there
    /// is none.
    pub async fn send_outcome(
        &self,
        title: &str,
        result: &CrewExecutionResult,
    ) -> Result<usize, NotifyError> {
        let seconds = result.execution_time_seconds;
        match &result.outcome {
            ExecutionOutcome::Success { report } => self.send_report(title, report, seconds).await,
            ExecutionOutcome::Partial { report, warning } => {
                if report.trim().is_empty() {
                    self.send_error(warning).await
                } else {
                    self.send_report(title, report, seconds).await
                }
            }
            ExecutionOutcome::Failure { error } => self.send_error(error).await,
        }
    }

    /// Check the bot credentials and announce readiness in the chat.
    pub async fn test_connection(&self) -> Result<BotIdentity, NotifyError> {
        let me = self.transport.get_me().await.map_err(|e| {
            error!("Telegram connection test failed: {}", e);
            NotifyError::Connection(e)
        })?;

        info!(
            "Connected to Telegram bot: @{}",
            me.username.as_deref().unwrap_or(&me.first_name)
        );

        self.send_message("✅ *Connection Test Successful*\n\nBot is ready!")
            .await?;
        Ok(me)
    }

    /// Send a message from outside a tokio runtime.
    #[allow(dead_code)]
    pub fn send_message_blocking(&self, text: &str) -> Result<usize, NotifyError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.send_message(text))
    }
}

/// Report header followed by the body.
pub fn format_report(
    title: &str,
    report: &str,
    execution_seconds: f64,
    generated: DateTime<Local>,
) -> String {
    format!(
        "🧠 *{}*\n⏱ Execution time: {:.2}s\n📅 Generated: {}\n{}\n\n{}",
        title,
        execution_seconds,
        generated.format("%Y-%m-%d %H:%M:%S"),
        SEPARATOR,
        report
    )
}

pub fn format_error(error: &str) -> String {
    format!(
        "⚠️ *Research Crew Error*\n\nAn error occurred during execution:\n\n```\n{}\n```",
        error
    )
}
