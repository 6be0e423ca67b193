//! Inbound update routing: top-level commands and triggers, entity buttons,
//! and everything else forwarded to the chat's active flow.

mod callback;
mod locks;
mod runtime;
pub mod texts;

pub use callback::CallbackAction;
pub use locks::ChatLocks;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::directory;
use crate::errors::AppError;
use crate::flow::{self, ComposeTarget, FlowInput};
use crate::lifecycle;
use crate::models::Role;
use crate::state::AppState;
use crate::telegram::{CallbackOrigin, InboundEvent, InboundKind, ReplyMarkup, Update};

use runtime::ChatContext;

/// Entry point for both the webhook route and the polling loop.
/// Updates from one chat are handled strictly in arrival order.
pub async fn handle_update(state: &AppState, update: Update) {
    let update_id = update.update_id;
    let Some(event) = update.into_event() else {
        debug!("Ignoring update {update_id} of unsupported kind");
        return;
    };

    let _guard = state.chat_locks.acquire(event.chat_id).await;
    let chat_id = event.chat_id;
    if let Err(e) = dispatch(state, event).await {
        error!("Failed to handle update {update_id} in chat {chat_id}: {e}");
        if let Err(e) = state
            .messenger()
            .send_text(chat_id, texts::GENERIC_ERROR, None)
            .await
        {
            warn!("Could not report failure to chat {chat_id}: {e}");
        }
    }
}

pub async fn dispatch(state: &AppState, event: InboundEvent) -> Result<(), AppError> {
    let ctx = ChatContext {
        chat_id: event.chat_id,
        from_id: event.from_id,
        origin: None,
    };

    match event.kind {
        InboundKind::Command(command) if command == "start" => on_start(state, ctx).await,
        InboundKind::Command(command) => {
            debug!("Unknown command /{command} in chat {}", ctx.chat_id);
            reply(state, ctx, texts::UNKNOWN_COMMAND).await
        }
        InboundKind::Text(text) if text == texts::CREATE_REQUEST_LABEL => {
            on_create_request(state, ctx).await
        }
        InboundKind::Text(text) => to_session(state, ctx, FlowInput::Text(text)).await,
        InboundKind::Photo { file_id } => to_session(state, ctx, FlowInput::Photo(file_id)).await,
        InboundKind::Unsupported => to_session(state, ctx, FlowInput::Unsupported).await,
        InboundKind::Callback {
            query_id,
            data,
            message,
        } => {
            let ctx = ChatContext {
                origin: message.as_ref(),
                ..ctx
            };
            let outcome = on_callback(state, ctx, &data).await;
            let notice = outcome.as_ref().ok().copied().flatten();
            if let Err(e) = state.messenger().answer_callback(&query_id, notice).await {
                warn!("Failed to answer callback {query_id}: {e}");
            }
            outcome.map(|_| ())
        }
    }
}

/// Always interrupts the current flow, then greets by role or starts onboarding.
async fn on_start(state: &AppState, ctx: ChatContext<'_>) -> Result<(), AppError> {
    if state.sessions.clear(ctx.chat_id).await? {
        info!("Chat {} left its flow via /start", ctx.chat_id);
        state
            .messenger()
            .send_text(ctx.chat_id, texts::LEFT_FLOW, Some(&ReplyMarkup::RemoveKeyboard))
            .await?;
    }

    let user = directory::find_or_create(state.store.as_ref(), ctx.from_id).await?;
    if !user.is_confirmed {
        return runtime::apply(state, ctx, flow::enter_onboarding()).await;
    }

    let web_app_url = &state.config.web_app_url;
    let (text, markup) = match user.role {
        Role::Designer => (
            texts::WELCOME_DESIGNER,
            Some(texts::designer_keyboard(web_app_url, &user)),
        ),
        Role::Supplier => (
            texts::WELCOME_SUPPLIER,
            Some(texts::supplier_keyboard(web_app_url, &user)),
        ),
        Role::Pending => (texts::ROLE_PENDING, None),
    };
    state
        .messenger()
        .send_text(ctx.chat_id, text, markup.as_ref())
        .await?;
    Ok(())
}

async fn on_create_request(state: &AppState, ctx: ChatContext<'_>) -> Result<(), AppError> {
    let user = directory::find_or_create(state.store.as_ref(), ctx.from_id).await?;
    if !user.acts_as(Role::Designer) {
        return reply(state, ctx, texts::DESIGNERS_ONLY).await;
    }
    runtime::apply(state, ctx, flow::enter_compose(ComposeTarget::Request)).await
}

/// Handles a button press. Returns an optional notice for the callback answer.
async fn on_callback(
    state: &AppState,
    ctx: ChatContext<'_>,
    data: &str,
) -> Result<Option<&'static str>, AppError> {
    let Some(action) = CallbackAction::parse(data) else {
        debug!("Ignoring unknown callback data {data:?} in chat {}", ctx.chat_id);
        return Ok(None);
    };

    match action {
        CallbackAction::RespondRequest(request_id) => on_respond(state, ctx, request_id).await,
        CallbackAction::ChooseResponse(response_id) => {
            on_choose(state, ctx, response_id).await?;
            Ok(None)
        }
        CallbackAction::Flow(action) => {
            to_session(state, ctx, FlowInput::Action(action)).await?;
            Ok(None)
        }
    }
}

async fn on_respond(
    state: &AppState,
    ctx: ChatContext<'_>,
    request_id: Uuid,
) -> Result<Option<&'static str>, AppError> {
    let user = directory::find_or_create(state.store.as_ref(), ctx.from_id).await?;
    if !user.acts_as(Role::Supplier) {
        return Ok(Some(texts::SUPPLIERS_ONLY));
    }

    match state.store.get_request(request_id).await? {
        None => reply(state, ctx, texts::REQUEST_NOT_FOUND).await?,
        Some(request) if !request.is_open() => reply(state, ctx, texts::REQUEST_NOT_OPEN).await?,
        Some(_) => {
            runtime::apply(
                state,
                ctx,
                flow::enter_compose(ComposeTarget::Response { request_id }),
            )
            .await?
        }
    }
    Ok(None)
}

async fn on_choose(
    state: &AppState,
    ctx: ChatContext<'_>,
    response_id: Uuid,
) -> Result<(), AppError> {
    let Some(actor) = state.store.find_user_by_chat(ctx.from_id).await? else {
        return reply(state, ctx, texts::NOT_OWNER).await;
    };

    let result = lifecycle::choose_supplier(
        state.store.as_ref(),
        &state.notifier,
        response_id,
        actor.id,
    )
    .await;

    match result {
        Ok(selection) => {
            let text = texts::chosen_suffix(
                ctx.origin.and_then(|o| o.text.as_deref()),
                &selection.supplier,
            );
            edit_origin(state, ctx, &text).await
        }
        Err(AppError::Conflict(_)) => edit_origin(state, ctx, texts::ALREADY_DECIDED).await,
        Err(AppError::Forbidden(_)) => reply(state, ctx, texts::NOT_OWNER).await,
        Err(AppError::NotFound(_)) => reply(state, ctx, texts::RESPONSE_NOT_FOUND).await,
        Err(e) => Err(e),
    }
}

/// Feeds `input` to the chat's active flow. Without one, messages get a hint
/// and stray buttons are ignored.
async fn to_session(
    state: &AppState,
    ctx: ChatContext<'_>,
    input: FlowInput,
) -> Result<(), AppError> {
    let Some(session) = state.sessions.load(ctx.chat_id).await? else {
        return match input {
            FlowInput::Action(action) => {
                debug!("Stale {action:?} button in chat {} without a flow", ctx.chat_id);
                Ok(())
            }
            _ => reply(state, ctx, texts::NO_SESSION_HINT).await,
        };
    };
    runtime::apply(state, ctx, flow::step(session, input)).await
}

async fn reply(state: &AppState, ctx: ChatContext<'_>, text: &str) -> Result<(), AppError> {
    state.messenger().send_text(ctx.chat_id, text, None).await?;
    Ok(())
}

async fn edit_origin(state: &AppState, ctx: ChatContext<'_>, text: &str) -> Result<(), AppError> {
    match ctx.origin {
        Some(CallbackOrigin { message_id, .. }) => {
            state
                .messenger()
                .edit_message_text(ctx.chat_id, *message_id, text, None)
                .await?
        }
        None => state.messenger().send_text(ctx.chat_id, text, None).await?,
    }
    Ok(())
}
