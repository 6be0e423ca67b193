use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Entries beyond this count are pruned of idle chats on the next acquire.
const PRUNE_THRESHOLD: usize = 1024;

/// One async lock per chat, so that updates from the same chat are handled
/// one at a time while different chats proceed in parallel.
#[derive(Clone, Default)]
pub struct ChatLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `chat_id`. Released when the guard drops.
    pub async fn acquire(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            if map.len() > PRUNE_THRESHOLD {
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            map.entry(chat_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
