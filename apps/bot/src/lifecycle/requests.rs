use tracing::{info, warn};
use uuid::Uuid;

use super::texts;
use crate::directory;
use crate::errors::AppError;
use crate::models::request::NewRequest;
use crate::models::{AssetOwner, Request, Role, User};
use crate::notify::{Delivery, FanOutReport, Notifier};
use crate::store::Store;
use crate::telegram::ReplyMarkup;

pub(crate) const RESPOND_PREFIX: &str = "respond_request_";

/// Inline button that opens the response flow for `request_id`.
pub fn respond_button(request_id: Uuid) -> ReplyMarkup {
    ReplyMarkup::single_button(texts::RESPOND_BUTTON, format!("{RESPOND_PREFIX}{request_id}"))
}

/// Persists an OPEN request owned by `designer` with its already uploaded assets.
pub async fn create(
    store: &dyn Store,
    designer: &User,
    details_text: &str,
    asset_ids: &[String],
) -> Result<Request, AppError> {
    if details_text.trim().is_empty() {
        return Err(AppError::Validation("request text is empty".into()));
    }
    if !designer.acts_as(Role::Designer) {
        return Err(AppError::Forbidden(format!(
            "user {} is not a confirmed designer",
            designer.id
        )));
    }

    let request = store
        .insert_request(
            &NewRequest {
                details_text: details_text.to_string(),
                designer_id: designer.id,
            },
            asset_ids,
        )
        .await?;
    info!(
        "Created request {} by designer {} with {} assets",
        request.id,
        designer.id,
        asset_ids.len()
    );
    Ok(request)
}

/// Sends the request text with a respond button to every eligible supplier.
/// Best-effort: individual failures are counted, never raised.
pub async fn broadcast(
    store: &dyn Store,
    notifier: &Notifier,
    request: &Request,
) -> Result<FanOutReport, AppError> {
    let suppliers = directory::list_eligible_suppliers(store).await?;
    info!(
        "Broadcasting request {} to {} suppliers",
        request.id,
        suppliers.len()
    );
    let report = notifier
        .fan_out(
            &suppliers,
            &texts::new_request(request),
            Some(&respond_button(request.id)),
        )
        .await;
    Ok(report)
}

pub async fn get(store: &dyn Store, id: Uuid) -> Result<Request, AppError> {
    store
        .get_request(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Request {id}")))
}

/// Manual close by the owning designer. Only an OPEN request can be closed.
pub async fn close(store: &dyn Store, id: Uuid, actor_id: Uuid) -> Result<Request, AppError> {
    let request = get(store, id).await?;
    if request.designer_id != actor_id {
        return Err(AppError::Forbidden(format!(
            "user {actor_id} does not own request {id}"
        )));
    }
    if !store.close_request(id).await? {
        return Err(AppError::Conflict(format!(
            "request {id} is already {}",
            request.status
        )));
    }
    info!("Request {id} closed by designer {actor_id}");
    get(store, id).await
}

/// Sends one OPEN request, images included, to a single supplier identified
/// by chat id.
pub async fn send_to_supplier(
    store: &dyn Store,
    notifier: &Notifier,
    request_id: Uuid,
    supplier_chat_id: i64,
) -> Result<Delivery, AppError> {
    let request = get(store, request_id).await?;
    if !request.is_open() {
        return Err(AppError::Conflict(format!(
            "request {request_id} is no longer open"
        )));
    }
    let supplier = store
        .find_user_by_chat(supplier_chat_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Supplier for chat {supplier_chat_id}")))?;
    if !supplier.acts_as(Role::Supplier) {
        return Err(AppError::Forbidden(format!(
            "user {} is not a confirmed supplier",
            supplier.id
        )));
    }

    let assets = store.asset_ids(AssetOwner::Request(request.id)).await?;
    let delivery = notifier
        .notify(
            &supplier,
            &texts::new_request(&request),
            Some(&respond_button(request.id)),
            &assets,
        )
        .await;
    if delivery != Delivery::Sent {
        warn!(
            "Request {} could not be sent to supplier {}: {delivery:?}",
            request.id, supplier.id
        );
    }
    Ok(delivery)
}
