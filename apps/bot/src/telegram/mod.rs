//! Telegram transport: the single point of contact with the Bot API.
//!
//! Everything else talks to the chat platform through the `Messenger` trait,
//! carried in `AppState` as `Arc<dyn Messenger>`.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub mod polling;
pub mod types;

pub use types::{
    CallbackOrigin, InboundEvent, InboundKind, InlineButton, KeyboardButton, ReplyMarkup, Update,
};

use types::{ApiEnvelope, FileInfo};

const API_BASE: &str = "https://api.telegram.org";
const MAX_RETRIES: u32 = 3;
/// Platform limit on items per media group.
pub const MEDIA_GROUP_MAX: usize = 10;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {description}")]
    Api { status: u16, description: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Bot API returned no result for {0}")]
    EmptyResult(&'static str),
}

/// One photo in an outgoing message: either already on the platform or
/// uploaded from bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMedia {
    FileId(String),
    Upload { filename: String, data: Bytes },
}

/// Outbound operations of the chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError>;

    /// Sends photos as one grouped message with `caption` on the first item.
    async fn send_media_group(
        &self,
        chat_id: i64,
        media: &[OutgoingMedia],
        caption: Option<&str>,
    ) -> Result<(), TelegramError>;

    /// Replaces the text of a previously sent message. `markup: None` drops
    /// its inline keyboard.
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError>;

    async fn answer_callback(&self, query_id: &str, text: Option<&str>)
        -> Result<(), TelegramError>;

    /// Downloads a file the user sent, by its platform file id.
    async fn download_file(&self, file_id: &str) -> Result<Bytes, TelegramError>;
}

/// Bot API client with retry on rate limits and server errors.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self, TelegramError> {
        Ok(Self {
            // Long enough for a 30s getUpdates poll.
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    /// Calls a Bot API method with a JSON body.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &Value,
    ) -> Result<T, TelegramError> {
        self.call_with(method, || self.client.post(self.method_url(method)).json(body))
            .await
    }

    /// Calls a Bot API method with a multipart body rebuilt on every attempt.
    async fn call_multipart<T: DeserializeOwned>(
        &self,
        method: &'static str,
        form: impl Fn() -> Form,
    ) -> Result<T, TelegramError> {
        self.call_with(method, || {
            self.client.post(self.method_url(method)).multipart(form())
        })
        .await
    }

    async fn call_with<T: DeserializeOwned>(
        &self,
        method: &'static str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<T, TelegramError> {
        let mut last_error: Option<TelegramError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Telegram {method} attempt {attempt} failed, retrying after {}ms...",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(TelegramError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = Some(TelegramError::Http(e));
                    continue;
                }
            };

            match read_reply(method, status, &body) {
                Reply::Done(result) => {
                    debug!("Telegram {method} succeeded");
                    return Ok(result);
                }
                Reply::Retry { error, retry_after } => {
                    warn!("Telegram {method} returned {status}: {error}");
                    if let Some(wait) = retry_after {
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                    last_error = Some(error);
                }
                Reply::Fail(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or(TelegramError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn send_chunk(
        &self,
        chat_id: i64,
        chunk: &[OutgoingMedia],
        caption: Option<&str>,
    ) -> Result<(), TelegramError> {
        let has_uploads = chunk
            .iter()
            .any(|m| matches!(m, OutgoingMedia::Upload { .. }));

        if let [single] = chunk {
            return match single {
                OutgoingMedia::FileId(file_id) => {
                    let mut body = json!({ "chat_id": chat_id, "photo": file_id });
                    if let Some(caption) = caption {
                        body["caption"] = json!(caption);
                    }
                    self.call::<Value>("sendPhoto", &body).await.map(|_| ())
                }
                OutgoingMedia::Upload { filename, data } => self
                    .call_multipart::<Value>("sendPhoto", || {
                        let mut form = Form::new()
                            .text("chat_id", chat_id.to_string())
                            .part("photo", photo_part(filename, data));
                        if let Some(caption) = caption {
                            form = form.text("caption", caption.to_string());
                        }
                        form
                    })
                    .await
                    .map(|_| ()),
            };
        }

        let media: Vec<Value> = chunk
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let reference = match m {
                    OutgoingMedia::FileId(file_id) => file_id.clone(),
                    OutgoingMedia::Upload { .. } => format!("attach://file{i}"),
                };
                let mut item = json!({ "type": "photo", "media": reference });
                if i == 0 {
                    if let Some(caption) = caption {
                        item["caption"] = json!(caption);
                    }
                }
                item
            })
            .collect();

        if !has_uploads {
            let body = json!({ "chat_id": chat_id, "media": media });
            return self
                .call::<Value>("sendMediaGroup", &body)
                .await
                .map(|_| ());
        }

        let media_json = Value::Array(media).to_string();
        self.call_multipart::<Value>("sendMediaGroup", || {
            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .text("media", media_json.clone());
            for (i, m) in chunk.iter().enumerate() {
                if let OutgoingMedia::Upload { filename, data } = m {
                    form = form.part(format!("file{i}"), photo_part(filename, data));
                }
            }
            form
        })
        .await
        .map(|_| ())
    }
}

fn photo_part(filename: &str, data: &Bytes) -> Part {
    Part::stream(reqwest::Body::from(data.clone())).file_name(filename.to_string())
}

/// How one Bot API reply should be handled by the retry loop.
#[derive(Debug)]
enum Reply<T> {
    Done(T),
    Retry {
        error: TelegramError,
        retry_after: Option<u64>,
    },
    Fail(TelegramError),
}

/// Classifies a reply by HTTP status first. Throttling and server errors are
/// retried whatever the body looks like; only then is the envelope decoded.
fn read_reply<T: DeserializeOwned>(
    method: &'static str,
    status: StatusCode,
    body: &str,
) -> Reply<T> {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        let envelope = serde_json::from_str::<ApiEnvelope<Value>>(body).ok();
        let retry_after = envelope
            .as_ref()
            .and_then(|e| e.parameters.as_ref())
            .and_then(|p| p.retry_after);
        let description = envelope
            .and_then(|e| e.description)
            .unwrap_or_else(|| body.to_string());
        return Reply::Retry {
            error: TelegramError::Api {
                status: status.as_u16(),
                description,
            },
            retry_after,
        };
    }

    let envelope: ApiEnvelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => return Reply::Fail(TelegramError::Parse(e)),
    };
    if envelope.ok {
        return match envelope.result {
            Some(result) => Reply::Done(result),
            None => Reply::Fail(TelegramError::EmptyResult(method)),
        };
    }
    Reply::Fail(TelegramError::Api {
        status: envelope.error_code.unwrap_or(status.as_u16()),
        description: envelope.description.unwrap_or_default(),
    })
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = markup {
            body["reply_markup"] = markup.to_json();
        }
        self.call::<Value>("sendMessage", &body).await.map(|_| ())
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        media: &[OutgoingMedia],
        caption: Option<&str>,
    ) -> Result<(), TelegramError> {
        for (i, chunk) in media.chunks(MEDIA_GROUP_MAX).enumerate() {
            let chunk_caption = if i == 0 { caption } else { None };
            self.send_chunk(chat_id, chunk, chunk_caption).await?;
        }
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        if let Some(markup) = markup {
            body["reply_markup"] = markup.to_json();
        }
        self.call::<Value>("editMessageText", &body)
            .await
            .map(|_| ())
    }

    async fn answer_callback(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "callback_query_id": query_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call::<bool>("answerCallbackQuery", &body)
            .await
            .map(|_| ())
    }

    async fn download_file(&self, file_id: &str) -> Result<Bytes, TelegramError> {
        let info: FileInfo = self
            .call("getFile", &json!({ "file_id": file_id }))
            .await?;
        let path = info.file_path.ok_or(TelegramError::EmptyResult("getFile"))?;

        let response = self
            .client
            .get(format!("{API_BASE}/file/bot{}/{path}", self.token))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api {
                status: status.as_u16(),
                description: format!("file download failed for {file_id}"),
            });
        }
        Ok(response.bytes().await?)
    }
}
