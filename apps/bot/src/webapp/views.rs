use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::assets::AssetStore;
use crate::errors::AppError;
use crate::models::{AssetOwner, Request, RequestStatus, Response, ResponseStatus};
use crate::store::Store;

/// Longest text shown in list views, in characters.
const LIST_TEXT_LIMIT: usize = 100;

/// Cuts `text` to `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct AssetView {
    pub remote_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct RequestView {
    pub id: Uuid,
    pub details_text: String,
    pub designer_id: Uuid,
    pub status: RequestStatus,
    pub chosen_response_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub assets: Vec<AssetView>,
}

#[derive(Debug, Serialize)]
pub struct ResponseView {
    pub id: Uuid,
    pub details_text: String,
    pub request_id: Uuid,
    pub supplier_id: Uuid,
    pub status: ResponseStatus,
    pub created_at: DateTime<Utc>,
    pub assets: Vec<AssetView>,
}

#[derive(Debug, Serialize)]
pub struct SupplierView {
    pub id: Uuid,
    pub contact_info: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestResponseView {
    #[serde(flatten)]
    pub response: ResponseView,
    pub supplier: Option<SupplierView>,
}

#[derive(Debug, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: RequestView,
    pub responses: Vec<RequestResponseView>,
    pub has_chosen_supplier: bool,
}

#[derive(Debug, Serialize)]
pub struct ResponseSummary {
    #[serde(flatten)]
    pub response: ResponseView,
    pub request: RequestView,
}

/// Renders views with asset URLs, loading links from the store.
pub(crate) struct ViewBuilder<'a> {
    pub store: &'a dyn Store,
    pub assets: &'a dyn AssetStore,
}

impl ViewBuilder<'_> {
    async fn asset_views(&self, owner: AssetOwner) -> Result<Vec<AssetView>, AppError> {
        let ids = self.store.asset_ids(owner).await?;
        Ok(ids
            .into_iter()
            .map(|remote_id| AssetView {
                url: self.assets.url_for(&remote_id),
                remote_id,
            })
            .collect())
    }

    pub async fn request(&self, request: Request, for_list: bool) -> Result<RequestView, AppError> {
        let assets = self.asset_views(AssetOwner::Request(request.id)).await?;
        Ok(RequestView {
            id: request.id,
            details_text: if for_list {
                truncate(&request.details_text, LIST_TEXT_LIMIT)
            } else {
                request.details_text
            },
            designer_id: request.designer_id,
            status: request.status,
            chosen_response_id: request.chosen_response_id,
            created_at: request.created_at,
            assets,
        })
    }

    pub async fn response(
        &self,
        response: Response,
        for_list: bool,
    ) -> Result<ResponseView, AppError> {
        let assets = self.asset_views(AssetOwner::Response(response.id)).await?;
        Ok(ResponseView {
            id: response.id,
            details_text: if for_list {
                truncate(&response.details_text, LIST_TEXT_LIMIT)
            } else {
                response.details_text
            },
            request_id: response.request_id,
            supplier_id: response.supplier_id,
            status: response.status,
            created_at: response.created_at,
            assets,
        })
    }

    pub async fn requests(
        &self,
        requests: Vec<Request>,
    ) -> Result<Vec<RequestView>, AppError> {
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            views.push(self.request(request, true).await?);
        }
        Ok(views)
    }
}
