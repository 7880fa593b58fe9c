//! Inbound dialogue events, parsed from channel messages.

use crate::pricing::catalog::{MATERIAL_PREFIX, SUBTYPE_PREFIX};

/// Callback data carried by the "new calculation" button.
pub const RESTART_DATA: &str = "restart";

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/start` command.
    Start,
    /// "New calculation" button.
    Restart,
    /// Material button; carries the material key.
    SelectMaterial(String),
    /// Subtype button; carries the subtype key.
    SelectSubtype(String),
    /// Any other text message.
    Text(String),
}

impl Event {
    /// Parse a text message. Returns `None` for slash commands the bot
    /// does not handle.
    pub fn from_text(text: &str) -> Option<Event> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return Some(Event::Text(text.to_string()));
        }

        // "/start", "/start@print_quote_bot", "/start payload"
        let command = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        match command.as_str() {
            "/start" => Some(Event::Start),
            _ => None,
        }
    }

    /// Parse button callback data. Returns `None` for unrecognized data.
    pub fn from_callback(data: &str) -> Option<Event> {
        if data == RESTART_DATA {
            return Some(Event::Restart);
        }
        if let Some(key) = data.strip_prefix(MATERIAL_PREFIX) {
            return Some(Event::SelectMaterial(key.to_string()));
        }
        data.strip_prefix(SUBTYPE_PREFIX)
            .map(|key| Event::SelectSubtype(key.to_string()))
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Restart => "restart",
            Self::SelectMaterial(_) => "select_material",
            Self::SelectSubtype(_) => "select_subtype",
            Self::Text(_) => "text",
        }
    }
}
