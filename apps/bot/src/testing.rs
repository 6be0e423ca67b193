//! In-memory doubles for the trait seams, used across unit tests.
//!
//! These let the flows, lifecycles and routes run without Postgres, Redis,
//! S3 or the Bot API.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::assets::AssetStore;
use crate::bot::ChatLocks;
use crate::config::Config;
use crate::errors::AppError;
use crate::flow::{Session, SessionStore};
use crate::models::request::NewRequest;
use crate::models::response::NewResponse;
use crate::models::user::ProfileUpdate;
use crate::models::{AssetOwner, Request, RequestStatus, Response, ResponseStatus, Role, User};
use crate::notify::Notifier;
use crate::state::AppState;
use crate::store::{RequestFilter, ResponseFilter, Store};
use crate::telegram::{Messenger, OutgoingMedia, ReplyMarkup, TelegramError};

// ============================================================================
// Fixtures
// ============================================================================

fn confirmed(chat_id: i64, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        external_chat_id: Some(chat_id),
        role,
        is_confirmed: true,
        contact_info: Some(format!("contact-{chat_id}")),
        notes: None,
        created_at: Utc::now(),
    }
}

/// A confirmed supplier reachable at `chat_id`.
pub fn supplier(chat_id: i64) -> User {
    confirmed(chat_id, Role::Supplier)
}

/// A confirmed designer reachable at `chat_id`.
pub fn designer(chat_id: i64) -> User {
    confirmed(chat_id, Role::Designer)
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/test".into(),
        redis_url: "redis://localhost".into(),
        s3_bucket: "assets".into(),
        s3_endpoint: "http://localhost:9000".into(),
        s3_public_url: "http://localhost:9000".into(),
        aws_access_key_id: "test".into(),
        aws_secret_access_key: "test".into(),
        telegram_bot_token: "123:test".into(),
        telegram_webhook_secret: None,
        telegram_polling: false,
        web_app_url: "https://app.example".into(),
        session_ttl_secs: 86400,
        port: 0,
        rust_log: "debug".into(),
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    requests: Vec<Request>,
    responses: Vec<Response>,
    links: HashMap<AssetOwner, Vec<String>>,
}

/// `Store` over vectors behind one mutex, so every operation is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    rival_choice: Mutex<Option<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, user: User) -> User {
        self.tables.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    /// The next `choose_response` finds `response_id` already chosen by a
    /// concurrent caller that got there first.
    pub fn let_rival_win(&self, response_id: Uuid) {
        *self.rival_choice.lock().unwrap() = Some(response_id);
    }
}

fn commit_choice(t: &mut Tables, request_id: Uuid, response_id: Uuid) -> Result<bool, AppError> {
    let open = t
        .requests
        .iter()
        .any(|r| r.id == request_id && r.is_open());
    if !open {
        return Ok(false);
    }
    let response = t
        .responses
        .iter_mut()
        .find(|r| {
            r.id == response_id && r.request_id == request_id && r.status == ResponseStatus::Sent
        })
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "response {response_id} is not a SENT response of request {request_id}"
            ))
        })?;
    response.status = ResponseStatus::Chosen;

    if let Some(request) = t.requests.iter_mut().find(|r| r.id == request_id) {
        request.status = RequestStatus::InProgress;
        request.chosen_response_id = Some(response_id);
    }
    Ok(true)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_chat(&self, chat_id: i64) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .users
            .iter()
            .find(|u| u.external_chat_id == Some(chat_id))
            .cloned())
    }

    async fn insert_user(&self, chat_id: i64) -> Result<Option<User>, AppError> {
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.external_chat_id == Some(chat_id)) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            external_chat_id: Some(chat_id),
            role: Role::Pending,
            is_confirmed: false,
            contact_info: None,
            notes: None,
            created_at: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(Some(user))
    }

    async fn update_profile(
        &self,
        chat_id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, AppError> {
        let mut t = self.tables.lock().unwrap();
        let Some(user) = t
            .users
            .iter_mut()
            .find(|u| u.external_chat_id == Some(chat_id))
        else {
            return Ok(None);
        };
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(contact) = &update.contact_info {
            user.contact_info = Some(contact.clone());
        }
        Ok(Some(user.clone()))
    }

    async fn set_confirmed(&self, id: Uuid, confirmed: bool) -> Result<Option<User>, AppError> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.is_confirmed = confirmed;
            u.clone()
        }))
    }

    async fn eligible_suppliers(&self) -> Result<Vec<User>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .users
            .iter()
            .filter(|u| u.acts_as(Role::Supplier))
            .cloned()
            .collect())
    }

    async fn insert_request(
        &self,
        new: &NewRequest,
        asset_ids: &[String],
    ) -> Result<Request, AppError> {
        let mut t = self.tables.lock().unwrap();
        let request = Request {
            id: Uuid::new_v4(),
            details_text: new.details_text.clone(),
            designer_id: new.designer_id,
            status: RequestStatus::Open,
            chosen_response_id: None,
            created_at: Utc::now(),
        };
        t.requests.push(request.clone());
        t.links
            .insert(AssetOwner::Request(request.id), asset_ids.to_vec());
        Ok(request)
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<Request>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, AppError> {
        let t = self.tables.lock().unwrap();
        let mut found: Vec<Request> = t
            .requests
            .iter()
            .filter(|r| filter.designer_id.map_or(true, |d| r.designer_id == d))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |q| contains_ci(&r.details_text, q))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn close_request(&self, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.tables.lock().unwrap();
        match t.requests.iter_mut().find(|r| r.id == id) {
            Some(r) if r.is_open() => {
                r.status = RequestStatus::Closed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_response(
        &self,
        new: &NewResponse,
        asset_ids: &[String],
    ) -> Result<Response, AppError> {
        let mut t = self.tables.lock().unwrap();
        let request = t
            .requests
            .iter()
            .find(|r| r.id == new.request_id)
            .ok_or_else(|| AppError::not_found(format!("Request {}", new.request_id)))?;
        if !request.is_open() {
            return Err(AppError::Conflict(format!(
                "request {} is not open",
                new.request_id
            )));
        }
        if t
            .responses
            .iter()
            .any(|r| r.request_id == new.request_id && r.supplier_id == new.supplier_id)
        {
            return Err(AppError::Conflict(format!(
                "supplier {} already responded to request {}",
                new.supplier_id, new.request_id
            )));
        }

        let response = Response {
            id: Uuid::new_v4(),
            details_text: new.details_text.clone(),
            request_id: new.request_id,
            supplier_id: new.supplier_id,
            status: ResponseStatus::Sent,
            created_at: Utc::now(),
        };
        t.responses.push(response.clone());
        t.links
            .insert(AssetOwner::Response(response.id), asset_ids.to_vec());
        Ok(response)
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<Response>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t.responses.iter().find(|r| r.id == id).cloned())
    }

    async fn list_responses(&self, filter: &ResponseFilter) -> Result<Vec<Response>, AppError> {
        let t = self.tables.lock().unwrap();
        let request_text = |id: Uuid| {
            t.requests
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.details_text.clone())
                .unwrap_or_default()
        };
        let mut found: Vec<Response> = t
            .responses
            .iter()
            .filter(|r| filter.request_id.map_or(true, |id| r.request_id == id))
            .filter(|r| filter.supplier_id.map_or(true, |id| r.supplier_id == id))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| {
                filter
                    .search
                    .as_deref()
                    .map_or(true, |q| contains_ci(&request_text(r.request_id), q))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            let chosen = |r: &Response| r.status != ResponseStatus::Chosen;
            chosen(a)
                .cmp(&chosen(b))
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(found)
    }

    async fn choose_response(&self, request_id: Uuid, response_id: Uuid) -> Result<bool, AppError> {
        let mut t = self.tables.lock().unwrap();
        if let Some(rival) = self.rival_choice.lock().unwrap().take() {
            commit_choice(&mut t, request_id, rival)?;
        }
        commit_choice(&mut t, request_id, response_id)
    }

    async fn asset_ids(&self, owner: AssetOwner) -> Result<Vec<String>, AppError> {
        let t = self.tables.lock().unwrap();
        Ok(t.links.get(&owner).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, chat_id: i64) -> Option<Session> {
        self.sessions.lock().unwrap().get(&chat_id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, chat_id: i64) -> Result<Option<Session>, AppError> {
        Ok(self.get(chat_id))
    }

    async fn save(&self, chat_id: i64, session: &Session) -> Result<(), AppError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(chat_id, session.clone());
        Ok(())
    }

    async fn clear(&self, chat_id: i64) -> Result<bool, AppError> {
        Ok(self.sessions.lock().unwrap().remove(&chat_id).is_some())
    }
}

// ============================================================================
// Assets
// ============================================================================

#[derive(Default)]
pub struct MemoryAssetStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryAssetStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores an object directly under `key` and returns the key.
    pub fn put(&self, key: &str, data: &[u8]) -> String {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::copy_from_slice(data));
        key.to_string()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn upload(
        &self,
        data: Bytes,
        filename: &str,
        _mime_type: &str,
    ) -> Result<String, AppError> {
        let key = crate::assets::object_key(filename);
        self.objects.lock().unwrap().insert(key.clone(), data);
        Ok(key)
    }

    async fn fetch_bytes(&self, remote_id: &str) -> Result<Bytes, AppError> {
        self.objects
            .lock()
            .unwrap()
            .get(remote_id)
            .cloned()
            .ok_or_else(|| AppError::S3(format!("no object {remote_id}")))
    }

    fn url_for(&self, remote_id: &str) -> String {
        format!("http://assets.test/{remote_id}")
    }

    async fn delete(&self, remote_id: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().remove(remote_id);
        Ok(())
    }
}

// ============================================================================
// Messenger
// ============================================================================

/// One outbound call observed by `RecordingMessenger`.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        markup: Option<ReplyMarkup>,
    },
    Media {
        chat_id: i64,
        count: usize,
        caption: Option<String>,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    Answer {
        query_id: String,
        text: Option<String>,
    },
}

/// Records successful sends; chats, file ids, edits and media groups can be
/// set up to fail.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    failing_chats: Mutex<HashSet<i64>>,
    failing_downloads: Mutex<HashSet<String>>,
    failing_edits: AtomicBool,
    failing_media: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn fail_download(&self, file_id: &str) {
        self.failing_downloads
            .lock()
            .unwrap()
            .insert(file_id.to_string());
    }

    pub fn fail_edits(&self) {
        self.failing_edits.store(true, Ordering::SeqCst);
    }

    pub fn fail_media(&self) {
        self.failing_media.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, chat_id: i64, sent: Sent) -> Result<(), TelegramError> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(TelegramError::Api {
                status: 403,
                description: "Forbidden: bot was blocked by the user".into(),
            });
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

fn bad_gateway() -> TelegramError {
    TelegramError::Api {
        status: 502,
        description: "Bad Gateway".into(),
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError> {
        self.record(
            chat_id,
            Sent::Text {
                chat_id,
                text: text.to_string(),
                markup: markup.cloned(),
            },
        )
    }

    async fn send_media_group(
        &self,
        chat_id: i64,
        media: &[OutgoingMedia],
        caption: Option<&str>,
    ) -> Result<(), TelegramError> {
        if self.failing_media.load(Ordering::SeqCst) {
            return Err(bad_gateway());
        }
        self.record(
            chat_id,
            Sent::Media {
                chat_id,
                count: media.len(),
                caption: caption.map(str::to_string),
            },
        )
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        _markup: Option<&ReplyMarkup>,
    ) -> Result<(), TelegramError> {
        if self.failing_edits.load(Ordering::SeqCst) {
            return Err(bad_gateway());
        }
        self.record(
            chat_id,
            Sent::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
            },
        )
    }

    async fn answer_callback(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.sent.lock().unwrap().push(Sent::Answer {
            query_id: query_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Bytes, TelegramError> {
        if self.failing_downloads.lock().unwrap().contains(file_id) {
            return Err(TelegramError::Api {
                status: 400,
                description: format!("Bad Request: file {file_id} is unavailable"),
            });
        }
        Ok(Bytes::from(format!("jpeg:{file_id}")))
    }
}

// ============================================================================
// Application state
// ============================================================================

/// `AppState` wired to in-memory doubles, with handles on each of them.
pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub assets: Arc<MemoryAssetStore>,
    pub messenger: Arc<RecordingMessenger>,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let assets = MemoryAssetStore::new();
        let messenger = RecordingMessenger::new();

        let state = AppState {
            store: store.clone(),
            sessions: sessions.clone(),
            assets: assets.clone(),
            notifier: Notifier::new(messenger.clone(), assets.clone()),
            chat_locks: ChatLocks::new(),
            config: test_config(),
        };

        Self {
            state,
            store,
            sessions,
            assets,
            messenger,
        }
    }
}
