use tracing::{info, warn};
use uuid::Uuid;

use super::texts;
use crate::errors::AppError;
use crate::models::response::NewResponse;
use crate::models::{AssetOwner, Request, RequestStatus, Response, ResponseStatus, Role, User};
use crate::notify::{Delivery, Notifier};
use crate::store::{ResponseFilter, Store};
use crate::telegram::ReplyMarkup;

pub(crate) const CHOOSE_PREFIX: &str = "choose_response_";

pub fn choose_button(response_id: Uuid) -> ReplyMarkup {
    ReplyMarkup::single_button(texts::CHOOSE_BUTTON, format!("{CHOOSE_PREFIX}{response_id}"))
}

/// Persists a SENT response from `supplier` to an OPEN request.
pub async fn create(
    store: &dyn Store,
    supplier: &User,
    request_id: Uuid,
    details_text: &str,
    asset_ids: &[String],
) -> Result<Response, AppError> {
    if details_text.trim().is_empty() {
        return Err(AppError::Validation("response text is empty".into()));
    }
    if !supplier.acts_as(Role::Supplier) {
        return Err(AppError::Forbidden(format!(
            "user {} is not a confirmed supplier",
            supplier.id
        )));
    }

    let response = store
        .insert_response(
            &NewResponse {
                details_text: details_text.to_string(),
                request_id,
                supplier_id: supplier.id,
            },
            asset_ids,
        )
        .await?;
    info!(
        "Supplier {} responded to request {request_id} with response {}",
        supplier.id, response.id
    );
    Ok(response)
}

pub async fn get(store: &dyn Store, id: Uuid) -> Result<Response, AppError> {
    store
        .get_response(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Response {id}")))
}

/// Tells the request owner about a new response, with its images and a
/// choose button. Never fails.
pub async fn notify_designer(
    store: &dyn Store,
    notifier: &Notifier,
    response: &Response,
    supplier: &User,
) -> Delivery {
    let loaded = async {
        let request = store
            .get_request(response.request_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Request {}", response.request_id)))?;
        let designer = store
            .find_user(request.designer_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {}", request.designer_id)))?;
        let assets = store.asset_ids(AssetOwner::Response(response.id)).await?;
        Ok::<_, AppError>((designer, assets))
    }
    .await;

    let (designer, assets) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("Cannot notify designer about response {}: {e}", response.id);
            return Delivery::Failed;
        }
    };

    notifier
        .notify(
            &designer,
            &texts::new_response(&response.details_text, supplier),
            Some(&choose_button(response.id)),
            &assets,
        )
        .await
}

/// Outcome of a committed selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub request: Request,
    pub chosen: Response,
    pub designer: User,
    pub supplier: User,
}

/// Runs the selection protocol up to and including the commit: load both
/// parties, check that `actor_id` owns the request, check that it is still
/// OPEN, then flip request and response together.
pub async fn select(
    store: &dyn Store,
    response_id: Uuid,
    actor_id: Uuid,
) -> Result<Selection, AppError> {
    let mut chosen = get(store, response_id).await?;
    let mut request = store
        .get_request(chosen.request_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Request {}", chosen.request_id)))?;

    if request.designer_id != actor_id {
        return Err(AppError::Forbidden(format!(
            "user {actor_id} does not own request {}",
            request.id
        )));
    }
    if !request.is_open() {
        return Err(AppError::Conflict(format!(
            "request {} is already decided",
            request.id
        )));
    }

    let designer = store
        .find_user(request.designer_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {}", request.designer_id)))?;
    let supplier = store
        .find_user(chosen.supplier_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {}", chosen.supplier_id)))?;

    // A concurrent selection may have won between the guard and here.
    if !store.choose_response(request.id, chosen.id).await? {
        return Err(AppError::Conflict(format!(
            "request {} is already decided",
            request.id
        )));
    }

    request.status = RequestStatus::InProgress;
    request.chosen_response_id = Some(chosen.id);
    chosen.status = ResponseStatus::Chosen;
    info!(
        "Designer {} chose response {} for request {}",
        designer.id, chosen.id, request.id
    );

    Ok(Selection {
        request,
        chosen,
        designer,
        supplier,
    })
}

/// Post-commit notifications: contacts to both parties, a notice to every
/// other responder. Failures are logged only.
pub async fn announce(store: &dyn Store, notifier: &Notifier, selection: &Selection) {
    let Selection {
        request,
        chosen,
        designer,
        supplier,
    } = selection;

    notifier
        .notify(designer, &texts::chosen_for_designer(request, supplier), None, &[])
        .await;
    notifier
        .notify(supplier, &texts::chosen_for_supplier(request, designer), None, &[])
        .await;

    let others = match store
        .list_responses(&ResponseFilter {
            request_id: Some(request.id),
            ..Default::default()
        })
        .await
    {
        Ok(responses) => responses,
        Err(e) => {
            warn!("Cannot list responders of request {}: {e}", request.id);
            return;
        }
    };

    let notice = texts::not_chosen(request);
    for other in others.iter().filter(|r| r.id != chosen.id) {
        match store.find_user(other.supplier_id).await {
            Ok(Some(user)) => {
                notifier.notify(&user, &notice, None, &[]).await;
            }
            Ok(None) => warn!("Responder {} no longer exists", other.supplier_id),
            Err(e) => warn!("Cannot load responder {}: {e}", other.supplier_id),
        }
    }
}

/// Selection followed by its notifications.
pub async fn choose_supplier(
    store: &dyn Store,
    notifier: &Notifier,
    response_id: Uuid,
    actor_id: Uuid,
) -> Result<Selection, AppError> {
    let selection = select(store, response_id, actor_id).await?;
    announce(store, notifier, &selection).await;
    Ok(selection)
}
