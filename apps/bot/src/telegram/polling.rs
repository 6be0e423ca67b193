use std::future::Future;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info};

use super::{TelegramClient, Update};

const POLL_TIMEOUT_SECS: u64 = 30;

/// Long-polls `getUpdates` forever, handing each update to `handle` in order.
///
/// The webhook is deleted first; the platform refuses `getUpdates` while one
/// is registered.
pub async fn run<F, Fut>(client: TelegramClient, handle: F)
where
    F: Fn(Update) -> Fut,
    Fut: Future<Output = ()>,
{
    if let Err(e) = client
        .call::<bool>("deleteWebhook", &json!({ "drop_pending_updates": false }))
        .await
    {
        error!("Failed to delete webhook before polling: {e}");
    }
    info!("Polling Telegram for updates");

    let mut offset: i64 = 0;
    loop {
        let body = json!({
            "offset": offset,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message", "callback_query"],
        });
        let updates: Vec<Update> = match client.call("getUpdates", &body).await {
            Ok(updates) => updates,
            Err(e) => {
                error!("getUpdates failed: {e}");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            handle(update).await;
        }
    }
}
