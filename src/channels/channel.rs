//! Channel trait and the message types flowing through it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::dialogue::{Button, Reply};
use crate::error::ChannelError;

/// Stream of inbound messages produced by a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Typed text (commands included).
    Text,
    /// Inline button press; `content` holds the button data.
    Button,
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel that produced the message.
    pub channel: String,
    /// Stable user identifier within the channel.
    pub user_id: String,
    /// Display name, if known.
    pub user_name: Option<String>,
    pub kind: MessageKind,
    pub content: String,
    /// Channel-specific routing data (chat id, message id, ...).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    /// A text message.
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            kind: MessageKind::Text,
            content: content.to_string(),
            metadata: serde_json::json!({}),
        }
    }

    /// A button press carrying `data`.
    pub fn button(channel: &str, user_id: &str, data: &str) -> Self {
        Self {
            kind: MessageKind::Button,
            ..Self::new(channel, user_id, data)
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }
}

/// A reply to send back on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    /// HTML-formatted text.
    pub content: String,
    /// Inline buttons, one per row.
    pub buttons: Vec<Button>,
    /// Replace the message whose button was pressed instead of sending a
    /// new one, where the channel supports it.
    pub edit_origin: bool,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            buttons: Vec::new(),
            edit_origin: false,
        }
    }

    pub fn editing_origin(mut self) -> Self {
        self.edit_origin = true;
        self
    }
}

impl From<Reply> for OutgoingResponse {
    fn from(reply: Reply) -> Self {
        Self {
            content: reply.text,
            buttons: reply.buttons,
            edit_origin: false,
        }
    }
}

/// A messaging transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name used in logs and messages.
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Confirm receipt of a button press that gets no reply, so the
    /// client stops waiting. No-op for channels without such a notion.
    async fn acknowledge(&self, _msg: &IncomingMessage) {}

    /// Send a response to the chat the message came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Check the transport is reachable and the credentials work.
    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
