//! Confirmation webhook from the moderation back office.
//!
//! The back office posts every user update; only a confirmation of a known
//! user has an effect. Anything else, malformed bodies included, is
//! acknowledged with `{"status":"ok"}` so the sender never retries.

use axum::{body::Bytes, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bot::texts::ACTIVATION_NOTICE;
use crate::directory;
use crate::errors::AppError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::Store;

const UPDATE_EVENT: &str = "user.items.update";
const USER_COLLECTION: &str = "user";

#[derive(Debug, Deserialize)]
pub struct UserUpdated {
    pub event: String,
    pub collection: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub payload: UserChanges,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserChanges {
    pub is_confirmed: Option<bool>,
}

impl UserUpdated {
    /// The user id this event confirms, if it is a confirmation at all.
    pub fn confirmed_user(&self) -> Option<Uuid> {
        if self.event != UPDATE_EVENT
            || self.collection != USER_COLLECTION
            || self.payload.is_confirmed != Some(true)
        {
            return None;
        }
        self.keys.first().and_then(|k| Uuid::parse_str(k).ok())
    }
}

/// Marks the user confirmed and sends the activation notice.
/// Returns whether a known user was confirmed.
pub async fn apply(
    store: &dyn Store,
    notifier: &Notifier,
    event: &UserUpdated,
) -> Result<bool, AppError> {
    let Some(user_id) = event.confirmed_user() else {
        debug!("Ignoring {} event on {}", event.event, event.collection);
        return Ok(false);
    };

    let Some(user) = directory::confirm(store, user_id).await? else {
        warn!("Confirmation for unknown user {user_id}");
        return Ok(false);
    };
    notifier.notify(&user, ACTIVATION_NOTICE, None, &[]).await;
    info!("Activation notice sent to user {}", user.id);
    Ok(true)
}

/// POST /api/v1/webhooks/user-updated
pub async fn handle_user_updated(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    match serde_json::from_slice::<UserUpdated>(&body) {
        Ok(event) => {
            if let Err(e) = apply(state.store.as_ref(), &state.notifier, &event).await {
                warn!("Failed to apply user update webhook: {e}");
            }
        }
        Err(e) => debug!("Ignoring malformed user update webhook: {e}"),
    }
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MemoryAssetStore, MemoryStore, RecordingMessenger, Sent};

    fn event(user_id: &str, confirmed: bool) -> UserUpdated {
        serde_json::from_value(json!({
            "event": "user.items.update",
            "collection": "user",
            "keys": [user_id],
            "payload": { "is_confirmed": confirmed }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_confirmation_activates_and_notifies() {
        let store = MemoryStore::new();
        let messenger = RecordingMessenger::new();
        let notifier = Notifier::new(messenger.clone(), MemoryAssetStore::new());
        let mut pending = testing::supplier(42);
        pending.is_confirmed = false;
        let pending = store.add_user(pending);

        let applied = apply(store.as_ref(), &notifier, &event(&pending.id.to_string(), true))
            .await
            .unwrap();

        assert!(applied);
        assert!(store.find_user(pending.id).await.unwrap().unwrap().is_confirmed);
        assert_eq!(
            messenger.sent(),
            vec![Sent::Text {
                chat_id: 42,
                text: ACTIVATION_NOTICE.into(),
                markup: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_irrelevant_events_do_nothing() {
        let store = MemoryStore::new();
        let messenger = RecordingMessenger::new();
        let notifier = Notifier::new(messenger.clone(), MemoryAssetStore::new());
        let user = store.add_user(testing::designer(1));

        for ev in [
            event(&user.id.to_string(), false),
            event("not-a-uuid", true),
            event(&Uuid::new_v4().to_string(), true),
        ] {
            assert!(!apply(store.as_ref(), &notifier, &ev).await.unwrap());
        }
        assert!(messenger.sent().is_empty());
    }
}
