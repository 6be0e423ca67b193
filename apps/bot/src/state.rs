use std::sync::Arc;

use crate::assets::AssetStore;
use crate::bot::ChatLocks;
use crate::config::Config;
use crate::flow::SessionStore;
use crate::notify::Notifier;
use crate::store::Store;
use crate::telegram::Messenger;

/// Shared application state injected into all route handlers via Axum extractors
/// and into the bot dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Conversational drafts, keyed by chat.
    pub sessions: Arc<dyn SessionStore>,
    pub assets: Arc<dyn AssetStore>,
    /// Best-effort delivery; also owns the messenger used for direct replies.
    pub notifier: Notifier,
    pub chat_locks: ChatLocks,
    pub config: Config,
}

impl AppState {
    pub fn messenger(&self) -> &dyn Messenger {
        self.notifier.messenger().as_ref()
    }
}
