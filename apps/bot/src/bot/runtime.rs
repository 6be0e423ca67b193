//! Executes flow transitions: runs effects in order, then commits the next session.

use tracing::{info, warn};

use super::texts;
use crate::assets::AssetStore;
use crate::directory;
use crate::errors::AppError;
use crate::flow::session::ComposeStep;
use crate::flow::{self, ComposeTarget, Effect, Session, Transition};
use crate::lifecycle::{requests, responses};
use crate::models::user::ProfileUpdate;
use crate::notify::{plan_message, send_plan};
use crate::state::AppState;
use crate::telegram::{CallbackOrigin, Messenger, OutgoingMedia};

/// Who an inbound interaction came from and which bot message, if any, it
/// answered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChatContext<'a> {
    pub chat_id: i64,
    pub from_id: i64,
    pub origin: Option<&'a CallbackOrigin>,
}

/// The stored session only moves once every effect has run. A failed effect
/// leaves the previous step in place so the user can repeat it.
pub(crate) async fn apply(
    state: &AppState,
    ctx: ChatContext<'_>,
    transition: Transition,
) -> Result<(), AppError> {
    let mut next = transition.next;
    for effect in transition.effects {
        if let Some(kept) = run_effect(state, ctx, effect).await? {
            next = Some(kept);
        }
    }

    match &next {
        Some(session) => state.sessions.save(ctx.chat_id, session).await?,
        None => {
            state.sessions.clear(ctx.chat_id).await?;
        }
    }
    Ok(())
}

/// Returns a session that must be kept instead of the transition's own next
/// state. Only a failed submission produces one.
async fn run_effect(
    state: &AppState,
    ctx: ChatContext<'_>,
    effect: Effect,
) -> Result<Option<Session>, AppError> {
    let messenger = state.messenger();
    match effect {
        Effect::Reply { text, markup } => {
            messenger.send_text(ctx.chat_id, &text, markup.as_ref()).await?;
        }
        Effect::Preview { text, assets } => {
            let media = assets.into_iter().map(OutgoingMedia::FileId).collect();
            send_plan(messenger, ctx.chat_id, plan_message(&text, media)).await?;
        }
        Effect::EditOrigin { text } => {
            let result = match ctx.origin {
                Some(origin) => {
                    messenger
                        .edit_message_text(ctx.chat_id, origin.message_id, &text, None)
                        .await
                }
                None => messenger.send_text(ctx.chat_id, &text, None).await,
            };
            if let Err(e) = result {
                warn!("Status update in chat {} not shown: {e}", ctx.chat_id);
            }
        }
        Effect::SaveProfile { role, contact_info } => {
            directory::update_profile(
                state.store.as_ref(),
                ctx.from_id,
                &ProfileUpdate {
                    role: Some(role),
                    contact_info: Some(contact_info),
                },
            )
            .await?;
        }
        Effect::Submit {
            target,
            text,
            assets,
        } => return submit(state, ctx, target, text, assets).await,
    }
    Ok(None)
}

/// Uploads every collected image, then writes the entity and its links in
/// one go. On any failure before the write, already uploaded objects are
/// removed and nothing is persisted.
async fn submit(
    state: &AppState,
    ctx: ChatContext<'_>,
    target: ComposeTarget,
    text: String,
    file_ids: Vec<String>,
) -> Result<Option<Session>, AppError> {
    let store = state.store.as_ref();
    let author = directory::find_or_create(store, ctx.from_id).await?;

    let uploaded = match upload_assets(state.messenger(), state.assets.as_ref(), &file_ids).await
    {
        Ok(uploaded) => uploaded,
        Err(e) => return submit_failed(state, ctx, target, text, file_ids, e).await,
    };

    let outcome = match &target {
        ComposeTarget::Request => requests::create(store, &author, &text, &uploaded)
            .await
            .map(Submitted::Request),
        ComposeTarget::Response { request_id } => {
            responses::create(store, &author, *request_id, &text, &uploaded)
                .await
                .map(Submitted::Response)
        }
    };

    let submitted = match outcome {
        Ok(submitted) => submitted,
        Err(e) => {
            cleanup(state.assets.as_ref(), &uploaded).await;
            return submit_failed(state, ctx, target, text, file_ids, e).await;
        }
    };

    // Persisted from here on: nothing below may bring the draft back.
    let done = match submitted {
        Submitted::Request(request) => {
            if let Err(e) = requests::broadcast(store, &state.notifier, &request).await {
                warn!("Broadcast of request {} failed: {e}", request.id);
            }
            texts::REQUEST_SUBMITTED
        }
        Submitted::Response(response) => {
            responses::notify_designer(store, &state.notifier, &response, &author).await;
            texts::RESPONSE_SUBMITTED
        }
    };
    if let Err(e) = state.messenger().send_text(ctx.chat_id, done, None).await {
        warn!("Submission notice in chat {} not delivered: {e}", ctx.chat_id);
    }
    Ok(None)
}

enum Submitted {
    Request(crate::models::Request),
    Response(crate::models::Response),
}

/// Domain refusals end the flow with an explanation; infrastructure failures
/// hand the draft back at confirmation so the user can retry.
async fn submit_failed(
    state: &AppState,
    ctx: ChatContext<'_>,
    target: ComposeTarget,
    text: String,
    assets: Vec<String>,
    err: AppError,
) -> Result<Option<Session>, AppError> {
    let messenger = state.messenger();
    if texts::is_domain_error(&err) {
        info!("Submission in chat {} refused: {err}", ctx.chat_id);
        messenger
            .send_text(ctx.chat_id, texts::user_message(&err), None)
            .await?;
        return Ok(None);
    }

    warn!("Submission in chat {} failed: {err}", ctx.chat_id);
    let kind = target.kind();
    messenger
        .send_text(
            ctx.chat_id,
            texts::SUBMIT_FAILED,
            Some(&flow::confirm_keyboard(kind)),
        )
        .await?;
    Ok(Some(Session::Compose {
        target,
        step: ComposeStep::AwaitConfirm { text, assets },
    }))
}

/// Moves transport images into the asset store one at a time.
async fn upload_assets(
    messenger: &dyn Messenger,
    assets: &dyn AssetStore,
    file_ids: &[String],
) -> Result<Vec<String>, AppError> {
    let mut uploaded = Vec::with_capacity(file_ids.len());
    for file_id in file_ids {
        let result: Result<String, AppError> = async {
            let data = messenger.download_file(file_id).await?;
            assets
                .upload(data, &format!("{file_id}.jpg"), "image/jpeg")
                .await
        }
        .await;

        match result {
            Ok(remote_id) => uploaded.push(remote_id),
            Err(e) => {
                cleanup(assets, &uploaded).await;
                return Err(e);
            }
        }
    }
    Ok(uploaded)
}

async fn cleanup(assets: &dyn AssetStore, remote_ids: &[String]) {
    for remote_id in remote_ids {
        if let Err(e) = assets.delete(remote_id).await {
            warn!("Failed to remove orphaned asset {remote_id}: {e}");
        }
    }
}
