//! Telegram channel — long-polls the Bot API for messages and button presses.
//!
//! Native Rust Telegram Bot API implementation over reqwest: `getUpdates`
//! for inbound, `sendMessage` / `editMessageText` with inline keyboards for
//! outbound.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::dialogue::Button;
use crate::error::ChannelError;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Telegram channel. Connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// POST a Bot API method and fail unless Telegram answers `ok: true`.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| send_failed(format!("{method}: {e}")))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| send_failed(format!("{method}: invalid response: {e}")))?;

        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(send_failed(format!("{method} returned {status}: {description}")));
        }
        Ok(data)
    }

    /// Send a text message, trying HTML first with plain text fallback.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        buttons: &[Button],
    ) -> Result<(), ChannelError> {
        let markup = inline_keyboard(buttons);
        let mut html_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML"
        });
        if let Some(ref markup) = markup {
            html_body["reply_markup"] = markup.clone();
        }

        let html_err = match self.call("sendMessage", &html_body).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        tracing::warn!(
            error = %html_err,
            "Telegram sendMessage with HTML failed; retrying without parse_mode"
        );

        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = markup {
            plain_body["reply_markup"] = markup;
        }
        self.call("sendMessage", &plain_body).await.map(|_| ())
    }

    /// Replace the text and buttons of a message the bot sent earlier.
    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        text: &str,
        buttons: &[Button],
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML"
        });
        if let Some(markup) = inline_keyboard(buttons) {
            body["reply_markup"] = markup;
        }
        self.call("editMessageText", &body).await.map(|_| ())
    }

    /// Stop the loading spinner on a pressed button.
    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "callback_query_id": callback_query_id });
        self.call("answerCallbackQuery", &body).await.map(|_| ())
    }

    /// Drop any webhook so long polling is allowed, and register /start.
    async fn prepare(&self) -> Result<(), ChannelError> {
        self.call(
            "deleteWebhook",
            &serde_json::json!({ "drop_pending_updates": false }),
        )
        .await
        .map_err(|e| startup_failed(e.to_string()))?;

        if let Err(e) = self
            .call(
                "setMyCommands",
                &serde_json::json!({
                    "commands": [
                        { "command": "start", "description": "Рассчитать стоимость заказа" }
                    ]
                }),
            )
            .await
        {
            tracing::warn!(error = %e, "Telegram setMyCommands failed");
        }
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        self.prepare().await?;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = SecretString::from(self.bot_token.expose_secret().to_owned());
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                if data.get("ok").and_then(Value::as_bool) != Some(true) {
                    let description = data
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    tracing::warn!(description, "Telegram getUpdates rejected");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(Value::as_str)
            .ok_or_else(|| send_failed("No chat_id in message metadata".into()))?;

        self.acknowledge(msg).await;

        let origin = msg.metadata.get("message_id").and_then(Value::as_i64);
        if let (true, Some(message_id)) = (response.edit_origin, origin) {
            match self
                .edit_message(chat_id, message_id, &response.content, &response.buttons)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram editMessageText failed; sending a new message");
                }
            }
        }

        self.send_message(chat_id, &response.content, &response.buttons)
            .await
    }

    async fn acknowledge(&self, msg: &IncomingMessage) {
        let Some(callback_id) = callback_query_id(msg) else {
            return;
        };
        if let Err(e) = self.answer_callback(callback_id).await {
            tracing::warn!(error = %e, "Telegram answerCallbackQuery failed");
        }
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| startup_failed(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(startup_failed(format!("getMe returned {}", resp.status())))
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        bot_token.expose_secret()
    )
}

fn callback_query_id(msg: &IncomingMessage) -> Option<&str> {
    msg.metadata.get("callback_query_id").and_then(Value::as_str)
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason,
    }
}

fn startup_failed(reason: String) -> ChannelError {
    ChannelError::StartupFailed {
        name: "telegram".into(),
        reason,
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Sender identity of a message or callback query.
struct Sender<'a> {
    username: &'a str,
    user_id: Option<String>,
    first_name: Option<&'a str>,
}

impl<'a> Sender<'a> {
    fn from_value(from: Option<&'a Value>) -> Self {
        Self {
            username: from
                .and_then(|f| f.get("username"))
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
            user_id: from
                .and_then(|f| f.get("id"))
                .and_then(Value::as_i64)
                .map(|id| id.to_string()),
            first_name: from.and_then(|f| f.get("first_name")).and_then(Value::as_str),
        }
    }

    fn id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(self.username)
    }

    /// Check allowlist against both username and numeric ID.
    fn is_allowed(&self, allowed_users: &[String]) -> bool {
        let mut identities = vec![self.username];
        if let Some(ref id) = self.user_id {
            identities.push(id.as_str());
        }
        let allowed = check_user_allowed(allowed_users, identities.iter().copied());
        if !allowed {
            tracing::warn!(
                "Telegram: ignoring update from unauthorized user: \
                 username={}, user_id={}",
                self.username,
                self.user_id.as_deref().unwrap_or("unknown")
            );
        }
        allowed
    }

    fn display_name(&self) -> &str {
        self.first_name.unwrap_or(self.username)
    }
}

/// Turn one getUpdates entry into an inbound message, if it is a text
/// message or a button press from an allowed user.
fn parse_update(update: &Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        let sender = Sender::from_value(message.get("from"));
        if !sender.is_allowed(allowed_users) {
            return None;
        }

        let chat_id = chat_id_of(message);
        let incoming = IncomingMessage::new("telegram", sender.id(), text)
            .with_metadata(serde_json::json!({
                "chat_id": chat_id,
                "username": sender.username,
            }))
            .with_user_name(sender.display_name());
        return Some(incoming);
    }

    let query = update.get("callback_query")?;
    let data = query.get("data").and_then(Value::as_str)?;
    let sender = Sender::from_value(query.get("from"));
    if !sender.is_allowed(allowed_users) {
        return None;
    }

    // Buttons on inline-mode messages carry no chat; nothing to reply to.
    let message = query.get("message")?;
    let chat_id = chat_id_of(message);
    let message_id = message.get("message_id").and_then(Value::as_i64);
    let callback_query_id = query.get("id").and_then(Value::as_str);

    let incoming = IncomingMessage::button("telegram", sender.id(), data)
        .with_metadata(serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "callback_query_id": callback_query_id,
            "username": sender.username,
        }))
        .with_user_name(sender.display_name());
    Some(incoming)
}

fn chat_id_of(message: &Value) -> String {
    message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default()
}

/// Build an `InlineKeyboardMarkup`, one button per row.
fn inline_keyboard(buttons: &[Button]) -> Option<Value> {
    if buttons.is_empty() {
        return None;
    }
    let rows: Vec<Value> = buttons
        .iter()
        .map(|b| serde_json::json!([{ "text": b.label, "callback_data": b.data }]))
        .collect();
    Some(serde_json::json!({ "inline_keyboard": rows }))
}

// ── Tests ───────────────────────────────────────────────────────────
