//! Maps chat identities to internal user profiles.

use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::ProfileUpdate;
use crate::models::User;
use crate::store::Store;

/// Returns the profile for `chat_id`, creating a PENDING one on first contact.
/// Idempotent, including under concurrent first contacts.
pub async fn find_or_create(store: &dyn Store, chat_id: i64) -> Result<User, AppError> {
    if let Some(user) = store.find_user_by_chat(chat_id).await? {
        return Ok(user);
    }
    if let Some(user) = store.insert_user(chat_id).await? {
        info!("Registered new user {} for chat {chat_id}", user.id);
        return Ok(user);
    }
    // Lost an insert race; the winner's row is there now.
    store
        .find_user_by_chat(chat_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User for chat {chat_id}")))
}

/// Partially updates role and contact info. Fails if the user does not exist.
pub async fn update_profile(
    store: &dyn Store,
    chat_id: i64,
    update: &ProfileUpdate,
) -> Result<User, AppError> {
    let user = store
        .update_profile(chat_id, update)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User for chat {chat_id}")))?;
    info!(
        "Updated profile of user {}: role={}, contact set={}",
        user.id,
        user.role,
        user.contact_info.is_some()
    );
    Ok(user)
}

pub async fn get(store: &dyn Store, id: Uuid) -> Result<User, AppError> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {id}")))
}

/// Confirmed suppliers, the broadcast fan-out set.
pub async fn list_eligible_suppliers(store: &dyn Store) -> Result<Vec<User>, AppError> {
    store.eligible_suppliers().await
}

/// Applies a moderation decision. Returns `None` for unknown users.
pub async fn confirm(store: &dyn Store, id: Uuid) -> Result<Option<User>, AppError> {
    let user = store.set_confirmed(id, true).await?;
    if let Some(user) = &user {
        info!("User {} confirmed as {}", user.id, user.role);
    }
    Ok(user)
}
