//! Notification front-end adapters.
//!
//! The messaging service itself is an external collaborator; these
//! adapters cover the seam. `TelegramNotifier` speaks the Telegram Bot
//! API; `ChannelNotifier` backs tests and offline runs with in-process
//! channels.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

use vigil_core::config::NotifierConfig;

/// Inbound session-lifecycle command from the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Begin,
    End,
}

/// Seam to the notification front-end.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a status line.
    async fn post_text(&self, text: &str) -> Result<()>;

    /// Post one evidence image labeled with its originating address.
    async fn post_evidence(&self, image: Bytes, source: &str) -> Result<()>;

    /// Next inbound session command. `None` means the command stream is
    /// closed; the relay treats that as end-of-input, not an error.
    async fn next_command(&mut self) -> Option<SessionCommand>;
}

// ── Telegram ──────────────────────────────────────────────────────────────────

/// Pause between update polls after a front-end API error.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Long-poll window for getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u32 = 25;

/// Telegram Bot API adapter.
///
/// `/start` and `/stop` chat commands become `Begin`/`End`. Update polling
/// runs on its own task so a command is never lost to a cancelled receive.
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_url: String,
    chat_id: String,
    commands: mpsc::Receiver<SessionCommand>,
}

impl TelegramNotifier {
    /// Build the adapter and start its update-poll task.
    pub fn spawn(config: &NotifierConfig) -> Self {
        let client = reqwest::Client::new();
        let bot_url = format!(
            "{}/bot{}",
            config.api_base.trim_end_matches('/'),
            config.bot_token
        );
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(poll_updates(client.clone(), bot_url.clone(), tx));
        Self {
            client,
            bot_url,
            chat_id: config.chat_id.clone(),
            commands: rx,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn post_text(&self, text: &str) -> Result<()> {
        self.client
            .post(format!("{}/sendMessage", self.bot_url))
            .json(&serde_json::json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .await
            .context("sendMessage request failed")?
            .error_for_status()
            .context("sendMessage rejected")?;
        Ok(())
    }

    async fn post_evidence(&self, image: Bytes, source: &str) -> Result<()> {
        let photo = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("evidence.jpg")
            .mime_str("image/jpeg")
            .context("bad evidence mime type")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", format!("Face detected from {source}"))
            .part("photo", photo);
        self.client
            .post(format!("{}/sendPhoto", self.bot_url))
            .multipart(form)
            .send()
            .await
            .context("sendPhoto request failed")?
            .error_for_status()
            .context("sendPhoto rejected")?;
        Ok(())
    }

    async fn next_command(&mut self) -> Option<SessionCommand> {
        self.commands.recv().await
    }
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<UpdateMessage>,
}

#[derive(Debug, Deserialize)]
struct UpdateMessage {
    text: Option<String>,
}

async fn poll_updates(
    client: reqwest::Client,
    bot_url: String,
    tx: mpsc::Sender<SessionCommand>,
) {
    let mut offset: i64 = 0;
    loop {
        let response = client
            .get(format!("{bot_url}/getUpdates"))
            .query(&[
                ("timeout", POLL_TIMEOUT_SECS.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await;

        let updates = match response {
            Ok(r) => match r.error_for_status() {
                Ok(r) => match r.json::<UpdatesResponse>().await {
                    Ok(u) => u.result,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed getUpdates response");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates rejected");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates request failed");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let text = update.message.and_then(|m| m.text).unwrap_or_default();
            let command = match text.trim() {
                "/start" => SessionCommand::Begin,
                "/stop" => SessionCommand::End,
                _ => continue,
            };
            if tx.send(command).await.is_err() {
                // relay gone — stop polling
                return;
            }
        }
    }
}

// ── In-process channel adapter ────────────────────────────────────────────────

/// What a `ChannelNotifier` was asked to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posted {
    Text(String),
    Evidence { image: Bytes, source: String },
}

/// Channel-backed notifier for tests and offline runs.
pub struct ChannelNotifier {
    commands: mpsc::Receiver<SessionCommand>,
    posts: mpsc::UnboundedSender<Posted>,
}

impl ChannelNotifier {
    /// Returns the notifier plus the command injector and post observer.
    pub fn new() -> (
        Self,
        mpsc::Sender<SessionCommand>,
        mpsc::UnboundedReceiver<Posted>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (post_tx, post_rx) = mpsc::unbounded_channel();
        (
            Self {
                commands: cmd_rx,
                posts: post_tx,
            },
            cmd_tx,
            post_rx,
        )
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn post_text(&self, text: &str) -> Result<()> {
        self.posts
            .send(Posted::Text(text.to_string()))
            .map_err(|_| anyhow!("post observer dropped"))
    }

    async fn post_evidence(&self, image: Bytes, source: &str) -> Result<()> {
        self.posts
            .send(Posted::Evidence {
                image,
                source: source.to_string(),
            })
            .map_err(|_| anyhow!("post observer dropped"))
    }

    async fn next_command(&mut self) -> Option<SessionCommand> {
        self.commands.recv().await
    }
}
