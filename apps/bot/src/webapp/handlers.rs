use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::views::{
    RequestDetail, RequestResponseView, RequestView, ResponseSummary, SupplierView, ViewBuilder,
};
use crate::errors::AppError;
use crate::lifecycle::{self, requests, responses};
use crate::models::{RequestStatus, ResponseStatus, Role};
use crate::notify::Delivery;
use crate::state::AppState;
use crate::store::{RequestFilter, ResponseFilter};

/// Query of the list views. Empty strings count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
    pub role: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl ListQuery {
    fn role(&self) -> Result<Option<Role>, AppError> {
        non_empty(&self.role)
            .map(|r| r.to_uppercase().parse::<Role>())
            .transpose()
            .map_err(|e| AppError::Validation(e.to_string()))
    }

    fn search(&self) -> Option<String> {
        non_empty(&self.search).map(str::to_string)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn views(state: &AppState) -> ViewBuilder<'_> {
    ViewBuilder {
        store: state.store.as_ref(),
        assets: state.assets.as_ref(),
    }
}

/// GET /api/v1/requests
pub async fn handle_list_requests(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RequestView>>, AppError> {
    let (Some(user_id), Some(Role::Designer)) = (query.user_id, query.role()?) else {
        return Ok(Json(vec![]));
    };
    let status = non_empty(&query.status)
        .map(|s| s.to_uppercase().parse::<RequestStatus>())
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let found = state
        .store
        .list_requests(&RequestFilter {
            designer_id: Some(user_id),
            status,
            search: query.search(),
        })
        .await?;
    Ok(Json(views(&state).requests(found).await?))
}

/// GET /api/v1/open-requests
pub async fn handle_open_requests(
    State(state): State<AppState>,
) -> Result<Json<Vec<RequestView>>, AppError> {
    let found = state
        .store
        .list_requests(&RequestFilter {
            status: Some(RequestStatus::Open),
            ..Default::default()
        })
        .await?;
    Ok(Json(views(&state).requests(found).await?))
}

/// GET /api/v1/requests/:id
pub async fn handle_get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestDetail>, AppError> {
    let request = requests::get(state.store.as_ref(), id).await?;
    let found = state
        .store
        .list_responses(&ResponseFilter {
            request_id: Some(id),
            ..Default::default()
        })
        .await?;

    let builder = views(&state);
    let has_chosen_supplier = found.iter().any(|r| r.status == ResponseStatus::Chosen);
    let mut responses = Vec::with_capacity(found.len());
    for response in found {
        let supplier = state
            .store
            .find_user(response.supplier_id)
            .await?
            .map(|u| SupplierView {
                id: u.id,
                contact_info: u.contact_info,
            });
        responses.push(RequestResponseView {
            response: builder.response(response, false).await?,
            supplier,
        });
    }

    Ok(Json(RequestDetail {
        request: builder.request(request, false).await?,
        responses,
        has_chosen_supplier,
    }))
}

/// GET /api/v1/responses
pub async fn handle_list_responses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ResponseSummary>>, AppError> {
    let (Some(user_id), Some(Role::Supplier)) = (query.user_id, query.role()?) else {
        return Ok(Json(vec![]));
    };
    let status = non_empty(&query.status)
        .map(|s| s.to_uppercase().parse::<ResponseStatus>())
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let found = state
        .store
        .list_responses(&ResponseFilter {
            supplier_id: Some(user_id),
            status,
            search: query.search(),
            ..Default::default()
        })
        .await?;

    let builder = views(&state);
    let mut summaries = Vec::with_capacity(found.len());
    for response in found {
        let request = requests::get(state.store.as_ref(), response.request_id).await?;
        summaries.push(ResponseSummary {
            request: builder.request(request, true).await?,
            response: builder.response(response, true).await?,
        });
    }
    Ok(Json(summaries))
}

/// GET /api/v1/responses/:id
pub async fn handle_get_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResponseSummary>, AppError> {
    let response = responses::get(state.store.as_ref(), id).await?;
    let request = requests::get(state.store.as_ref(), response.request_id).await?;
    let builder = views(&state);
    Ok(Json(ResponseSummary {
        request: builder.request(request, false).await?,
        response: builder.response(response, false).await?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChooseBody {
    pub actor_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ChooseResult {
    pub request_id: Uuid,
    pub response_id: Uuid,
    pub request_status: RequestStatus,
}

/// POST /api/v1/responses/:id/choose
pub async fn handle_choose_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChooseBody>,
) -> Result<Json<ChooseResult>, AppError> {
    let selection =
        lifecycle::choose_supplier(state.store.as_ref(), &state.notifier, id, body.actor_id)
            .await?;
    Ok(Json(ChooseResult {
        request_id: selection.request.id,
        response_id: selection.chosen.id,
        request_status: selection.request.status,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub designer_id: Uuid,
    pub status: String,
}

/// POST /api/v1/requests/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<RequestView>, AppError> {
    if body.status.trim().to_uppercase() != RequestStatus::Closed.as_str() {
        return Err(AppError::Validation(format!(
            "status '{}' cannot be set manually; only CLOSED is accepted",
            body.status
        )));
    }
    let closed = requests::close(state.store.as_ref(), id, body.designer_id).await?;
    Ok(Json(views(&state).request(closed, false).await?))
}

#[derive(Debug, Deserialize)]
pub struct RespondPromptBody {
    pub supplier_chat_id: i64,
}

/// POST /api/v1/requests/:id/respond-prompt
pub async fn handle_respond_prompt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RespondPromptBody>,
) -> Result<Json<Value>, AppError> {
    let delivery = requests::send_to_supplier(
        state.store.as_ref(),
        &state.notifier,
        id,
        body.supplier_chat_id,
    )
    .await?;
    Ok(Json(json!({ "delivered": delivery == Delivery::Sent })))
}
