//! Wire types for the Bot API and their translation into transport-neutral
//! inbound events and outbound keyboards.

use serde::Deserialize;
use serde_json::{json, Value};

// ────────────────────────────────────────────────────────────────────────────
// Inbound
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<Sender>,
    pub chat: Chat,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Sender,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileInfo {
    pub file_path: Option<String>,
}

/// What an inbound update means to the bot.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub chat_id: i64,
    /// The acting user's platform id (their private chat id).
    pub from_id: i64,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    /// `/name` without the leading slash, bot suffix or arguments.
    Command(String),
    Text(String),
    /// Largest available size of a photo.
    Photo { file_id: String },
    Callback {
        query_id: String,
        data: String,
        message: Option<CallbackOrigin>,
    },
    /// Stickers, documents, voice notes and anything else.
    Unsupported,
}

/// The bot message carrying the pressed button.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOrigin {
    pub message_id: i64,
    pub text: Option<String>,
}

impl Update {
    /// Returns `None` for update kinds the bot does not handle.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let chat_id = query
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(query.from.id);
            return Some(InboundEvent {
                chat_id,
                from_id: query.from.id,
                kind: InboundKind::Callback {
                    query_id: query.id,
                    data: query.data.unwrap_or_default(),
                    message: query.message.map(|m| CallbackOrigin {
                        message_id: m.message_id,
                        text: m.text,
                    }),
                },
            });
        }

        let message = self.message?;
        let from_id = message.from.as_ref().map(|f| f.id)?;
        let kind = if let Some(photo) = message.photo.filter(|p| !p.is_empty()) {
            // Sizes are listed smallest first.
            let largest = photo
                .into_iter()
                .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
                .map(|p| p.file_id)?;
            InboundKind::Photo { file_id: largest }
        } else if let Some(text) = message.text {
            match parse_command(&text) {
                Some(command) => InboundKind::Command(command),
                None => InboundKind::Text(text),
            }
        } else {
            InboundKind::Unsupported
        };

        Some(InboundEvent {
            chat_id: message.chat.id,
            from_id,
            kind,
        })
    }
}

fn parse_command(text: &str) -> Option<String> {
    let rest = text.strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// A reply-keyboard button, optionally opening the web app.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardButton {
    pub text: String,
    pub web_app_url: Option<String>,
}

impl KeyboardButton {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            web_app_url: None,
        }
    }

    pub fn web_app(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            web_app_url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyMarkup {
    Inline(Vec<Vec<InlineButton>>),
    Keyboard {
        rows: Vec<Vec<KeyboardButton>>,
        one_time: bool,
    },
    RemoveKeyboard,
}

impl ReplyMarkup {
    pub fn single_button(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        ReplyMarkup::Inline(vec![vec![InlineButton::new(text, callback_data)]])
    }

    pub fn to_json(&self) -> Value {
        match self {
            ReplyMarkup::Inline(rows) => json!({
                "inline_keyboard": rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|b| json!({ "text": b.text, "callback_data": b.callback_data }))
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            }),
            ReplyMarkup::Keyboard { rows, one_time } => json!({
                "keyboard": rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|b| match &b.web_app_url {
                                Some(url) => json!({ "text": b.text, "web_app": { "url": url } }),
                                None => json!({ "text": b.text }),
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>(),
                "resize_keyboard": true,
                "one_time_keyboard": one_time,
            }),
            ReplyMarkup::RemoveKeyboard => json!({ "remove_keyboard": true }),
        }
    }
}
