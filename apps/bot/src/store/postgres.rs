use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{RequestFilter, ResponseFilter, Store};
use crate::errors::AppError;
use crate::models::request::NewRequest;
use crate::models::response::NewResponse;
use crate::models::user::ProfileUpdate;
use crate::models::{AssetOwner, Request, RequestStatus, Response, User};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    external_chat_id: Option<i64>,
    role: String,
    is_confirmed: bool,
    contact_info: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            external_chat_id: row.external_chat_id,
            role: row.role.parse()?,
            is_confirmed: row.is_confirmed,
            contact_info: row.contact_info,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RequestRow {
    id: Uuid,
    details_text: String,
    designer_id: Uuid,
    status: String,
    chosen_response_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for Request {
    type Error = AppError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Request {
            id: row.id,
            details_text: row.details_text,
            designer_id: row.designer_id,
            status: row.status.parse()?,
            chosen_response_id: row.chosen_response_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResponseRow {
    id: Uuid,
    details_text: String,
    request_id: Uuid,
    supplier_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResponseRow> for Response {
    type Error = AppError;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        Ok(Response {
            id: row.id,
            details_text: row.details_text,
            request_id: row.request_id,
            supplier_id: row.supplier_id,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const USER_COLUMNS: &str =
    "id, external_chat_id, role, is_confirmed, contact_info, notes, created_at";
const REQUEST_COLUMNS: &str =
    "id, details_text, designer_id, status, chosen_response_id, created_at";
const RESPONSE_COLUMNS: &str = "id, details_text, request_id, supplier_id, status, created_at";

/// PostgreSQL-backed `Store`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn link_assets(
        tx: &mut Transaction<'_, Postgres>,
        owner: AssetOwner,
        asset_ids: &[String],
    ) -> Result<(), AppError> {
        let sql = match owner {
            AssetOwner::Request(_) => {
                "INSERT INTO request_assets (request_id, remote_file_id, position) VALUES ($1, $2, $3)"
            }
            AssetOwner::Response(_) => {
                "INSERT INTO response_assets (response_id, remote_file_id, position) VALUES ($1, $2, $3)"
            }
        };
        for (position, remote_id) in asset_ids.iter().enumerate() {
            sqlx::query(sql)
                .bind(owner.id())
                .bind(remote_id)
                .bind(position as i32)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_chat(&self, chat_id: i64) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_chat_id = $1"
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, chat_id: i64) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, external_chat_id, role, is_confirmed)
            VALUES ($1, $2, 'PENDING', FALSE)
            ON CONFLICT (external_chat_id) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = &row {
            info!("Created user {} for chat {chat_id}", row.id);
        }
        row.map(User::try_from).transpose()
    }

    async fn update_profile(
        &self,
        chat_id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($2, role),
                contact_info = COALESCE($3, contact_info),
                updated_at = now()
            WHERE external_chat_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(chat_id)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.contact_info.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn set_confirmed(&self, id: Uuid, confirmed: bool) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET is_confirmed = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(confirmed)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn eligible_suppliers(&self) -> Result<Vec<User>, AppError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = 'SUPPLIER' AND is_confirmed = TRUE ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_request(
        &self,
        new: &NewRequest,
        asset_ids: &[String],
    ) -> Result<Request, AppError> {
        let mut tx = self.pool.begin().await?;

        let row: RequestRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO requests (id, details_text, designer_id, status)
            VALUES ($1, $2, $3, 'OPEN')
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.details_text)
        .bind(new.designer_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::link_assets(&mut tx, AssetOwner::Request(row.id), asset_ids).await?;
        tx.commit().await?;

        info!(
            "Inserted request {} for designer {} with {} assets",
            row.id,
            new.designer_id,
            asset_ids.len()
        );
        row.try_into()
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<Request>, AppError> {
        let row: Option<RequestRow> =
            sqlx::query_as(&format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Request::try_from).transpose()
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, AppError> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM requests
            WHERE ($1::uuid IS NULL OR designer_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR strpos(lower(details_text), lower($3)) > 0)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.designer_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.search.as_deref())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn close_request(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE requests SET status = 'CLOSED', updated_at = now() WHERE id = $1 AND status = 'OPEN'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_response(
        &self,
        new: &NewResponse,
        asset_ids: &[String],
    ) -> Result<Response, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the request row so a concurrent selection cannot slip in between
        // the status check and the insert.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM requests WHERE id = $1 FOR SHARE")
                .bind(new.request_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status.as_deref() {
            None => return Err(AppError::not_found(format!("Request {}", new.request_id))),
            Some(s) if s != RequestStatus::Open.as_str() => {
                return Err(AppError::Conflict(format!(
                    "Request {} is no longer open",
                    new.request_id
                )))
            }
            Some(_) => {}
        }

        let inserted: Result<ResponseRow, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO responses (id, details_text, request_id, supplier_id, status)
            VALUES ($1, $2, $3, $4, 'SENT')
            RETURNING {RESPONSE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.details_text)
        .bind(new.request_id)
        .bind(new.supplier_id)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(db))
                if db.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                return Err(AppError::Conflict(format!(
                    "Supplier {} already responded to request {}",
                    new.supplier_id, new.request_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        Self::link_assets(&mut tx, AssetOwner::Response(row.id), asset_ids).await?;
        tx.commit().await?;

        info!(
            "Inserted response {} on request {} with {} assets",
            row.id,
            new.request_id,
            asset_ids.len()
        );
        row.try_into()
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, AppError> {
        let row: Option<ResponseRow> =
            sqlx::query_as(&format!("SELECT {RESPONSE_COLUMNS} FROM responses WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Response::try_from).transpose()
    }

    async fn list_responses(&self, filter: &ResponseFilter) -> Result<Vec<Response>, AppError> {
        let rows: Vec<ResponseRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.details_text, r.request_id, r.supplier_id, r.status, r.created_at
            FROM responses r
            JOIN requests q ON q.id = r.request_id
            WHERE ($1::uuid IS NULL OR r.request_id = $1)
              AND ($2::uuid IS NULL OR r.supplier_id = $2)
              AND ($3::text IS NULL OR r.status = $3)
              AND ($4::text IS NULL OR strpos(lower(q.details_text), lower($4)) > 0)
            ORDER BY (r.status = 'CHOSEN') DESC, r.created_at DESC
            "#,
        )
        .bind(filter.request_id)
        .bind(filter.supplier_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.search.as_deref())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn choose_response(&self, request_id: Uuid, response_id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-swap on the request status: only one selection can win.
        let claimed = sqlx::query(
            r#"
            UPDATE requests
            SET status = 'IN_PROGRESS', chosen_response_id = $2, updated_at = now()
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(request_id)
        .bind(response_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        let marked = sqlx::query(
            r#"
            UPDATE responses
            SET status = 'CHOSEN', updated_at = now()
            WHERE id = $1 AND request_id = $2 AND status = 'SENT'
            "#,
        )
        .bind(response_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(AppError::Internal(anyhow::anyhow!(
                "response {response_id} is not a SENT response of request {request_id}"
            )));
        }

        tx.commit().await?;
        info!("Request {request_id} decided: response {response_id} chosen");
        Ok(true)
    }

    async fn asset_ids(&self, owner: AssetOwner) -> Result<Vec<String>, AppError> {
        let sql = match owner {
            AssetOwner::Request(_) => {
                "SELECT remote_file_id FROM request_assets WHERE request_id = $1 ORDER BY position"
            }
            AssetOwner::Response(_) => {
                "SELECT remote_file_id FROM response_assets WHERE response_id = $1 ORDER BY position"
            }
        };
        Ok(sqlx::query_scalar(sql)
            .bind(owner.id())
            .fetch_all(&self.pool)
            .await?)
    }
}
