use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, warn};

use crate::bot;
use crate::state::AppState;
use crate::telegram::Update;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// POST /telegram/webhook
///
/// Handles the update before answering, so the platform does not deliver the
/// next update of the same chat until this one is done. Unparseable updates
/// are acknowledged and dropped.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = &state.config.telegram_webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("Rejected Telegram webhook call with a bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => bot::handle_update(&state, update).await,
        Err(e) => debug!("Dropping unparseable Telegram update: {e}"),
    }
    StatusCode::OK
}
