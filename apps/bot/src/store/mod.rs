//! Data-mapper boundary.
//!
//! Every component reads and writes persistent state through `Store`, carried in
//! `AppState` as `Arc<dyn Store>`. `PgStore` is the production backend.

mod postgres;

pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::request::NewRequest;
use crate::models::response::NewResponse;
use crate::models::user::ProfileUpdate;
use crate::models::{AssetOwner, Request, RequestStatus, Response, ResponseStatus, User};

/// Optional filters for request listings. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub designer_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
    /// Case-insensitive substring of the request text.
    pub search: Option<String>,
}

/// Optional filters for response listings. `search` matches the text of the
/// request the response belongs to.
#[derive(Debug, Clone, Default)]
pub struct ResponseFilter {
    pub request_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub status: Option<ResponseStatus>,
    pub search: Option<String>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_chat(&self, chat_id: i64) -> Result<Option<User>, AppError>;

    /// Inserts a PENDING, unconfirmed user. Returns `None` when another row
    /// already owns `chat_id`.
    async fn insert_user(&self, chat_id: i64) -> Result<Option<User>, AppError>;

    async fn update_profile(
        &self,
        chat_id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, AppError>;

    async fn set_confirmed(&self, id: Uuid, confirmed: bool) -> Result<Option<User>, AppError>;

    /// Confirmed suppliers, the broadcast fan-out set.
    async fn eligible_suppliers(&self) -> Result<Vec<User>, AppError>;

    /// Inserts an OPEN request and its asset links in one transaction.
    async fn insert_request(
        &self,
        new: &NewRequest,
        asset_ids: &[String],
    ) -> Result<Request, AppError>;

    async fn get_request(&self, id: Uuid) -> Result<Option<Request>, AppError>;

    /// Newest first.
    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, AppError>;

    /// `OPEN -> CLOSED`. Returns `false` if the request was not OPEN.
    async fn close_request(&self, id: Uuid) -> Result<bool, AppError>;

    /// Inserts a SENT response and its asset links in one transaction.
    /// Fails with `Conflict` when the request is not OPEN or the supplier
    /// already responded to it.
    async fn insert_response(
        &self,
        new: &NewResponse,
        asset_ids: &[String],
    ) -> Result<Response, AppError>;

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, AppError>;

    /// CHOSEN first, then newest first.
    async fn list_responses(&self, filter: &ResponseFilter) -> Result<Vec<Response>, AppError>;

    /// Atomically moves the request `OPEN -> IN_PROGRESS`, records the chosen
    /// response and marks it CHOSEN. Returns `false` without writing anything
    /// if the request was no longer OPEN.
    async fn choose_response(&self, request_id: Uuid, response_id: Uuid) -> Result<bool, AppError>;

    /// Remote file ids linked to `owner`, in upload order.
    async fn asset_ids(&self, owner: AssetOwner) -> Result<Vec<String>, AppError>;
}
