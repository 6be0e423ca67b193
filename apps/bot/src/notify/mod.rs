//! Best-effort delivery of text and images to users.
//!
//! Nothing here returns an error to the caller: a recipient without a chat
//! address is skipped, a failed send is logged and reported as `Failed`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::assets::AssetStore;
use crate::errors::AppError;
use crate::models::User;
use crate::telegram::{Messenger, OutgoingMedia, ReplyMarkup};

/// Longest caption the platform accepts on a photo.
pub const CAPTION_LIMIT: usize = 1024;

const ACTION_PROMPT: &str = "Что вы хотите сделать?";

/// One outgoing message of a rendered text-plus-images post.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing<M> {
    Text(String),
    MediaGroup { media: Vec<M>, caption: Option<String> },
}

/// Lays out `text` with `media`:
/// - no media: a single text message,
/// - text fits a caption: one media group captioned on its first item,
/// - otherwise: the text alone, then the media group without caption.
pub fn plan_message<M>(text: &str, media: Vec<M>) -> Vec<Outgoing<M>> {
    if media.is_empty() {
        return vec![Outgoing::Text(text.to_string())];
    }
    if text.chars().count() > CAPTION_LIMIT {
        vec![
            Outgoing::Text(text.to_string()),
            Outgoing::MediaGroup {
                media,
                caption: None,
            },
        ]
    } else {
        vec![Outgoing::MediaGroup {
            media,
            caption: Some(text.to_string()),
        }]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The recipient has no chat address.
    NoAddress,
    Failed,
}

/// Tally of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FanOutReport {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Sent => self.sent += 1,
            Delivery::NoAddress => self.skipped += 1,
            Delivery::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
    assets: Arc<dyn AssetStore>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger>, assets: Arc<dyn AssetStore>) -> Self {
        Self { messenger, assets }
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Sends `text` to `recipient`, with the images behind `asset_ids` and an
    /// optional inline action. Never fails.
    pub async fn notify(
        &self,
        recipient: &User,
        text: &str,
        action: Option<&ReplyMarkup>,
        asset_ids: &[String],
    ) -> Delivery {
        let Some(chat_id) = recipient.external_chat_id else {
            debug!("User {} has no chat address, skipping notification", recipient.id);
            return Delivery::NoAddress;
        };

        match self.deliver(chat_id, text, action, asset_ids).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!("Failed to notify user {} (chat {chat_id}): {e}", recipient.id);
                Delivery::Failed
            }
        }
    }

    /// Sends the same text-only notification to every recipient.
    pub async fn fan_out(
        &self,
        recipients: &[User],
        text: &str,
        action: Option<&ReplyMarkup>,
    ) -> FanOutReport {
        let mut report = FanOutReport::default();
        for recipient in recipients {
            report.record(self.notify(recipient, text, action, &[]).await);
        }
        info!(
            "Fan-out finished: {} sent, {} without address, {} failed",
            report.sent, report.skipped, report.failed
        );
        report
    }

    async fn deliver(
        &self,
        chat_id: i64,
        text: &str,
        action: Option<&ReplyMarkup>,
        asset_ids: &[String],
    ) -> Result<(), AppError> {
        if asset_ids.is_empty() {
            self.messenger.send_text(chat_id, text, action).await?;
            return Ok(());
        }

        let mut media = Vec::with_capacity(asset_ids.len());
        for remote_id in asset_ids {
            let data = self.assets.fetch_bytes(remote_id).await?;
            media.push(OutgoingMedia::Upload {
                filename: upload_name(remote_id),
                data,
            });
        }

        send_plan(self.messenger.as_ref(), chat_id, plan_message(text, media)).await?;

        // Media groups cannot carry buttons.
        if let Some(action) = action {
            self.messenger
                .send_text(chat_id, ACTION_PROMPT, Some(action))
                .await?;
        }
        Ok(())
    }
}

/// Sends a planned post in order.
pub async fn send_plan(
    messenger: &dyn Messenger,
    chat_id: i64,
    plan: Vec<Outgoing<OutgoingMedia>>,
) -> Result<(), AppError> {
    for message in plan {
        match message {
            Outgoing::Text(text) => messenger.send_text(chat_id, &text, None).await?,
            Outgoing::MediaGroup { media, caption } => {
                messenger
                    .send_media_group(chat_id, &media, caption.as_deref())
                    .await?
            }
        }
    }
    Ok(())
}

fn upload_name(remote_id: &str) -> String {
    remote_id
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("image.jpg")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Sent};

    #[test]
    fn test_plan_text_only_without_media() {
        let plan = plan_message::<u8>("Нужен дизайн визитки", vec![]);
        assert_eq!(plan, vec![Outgoing::Text("Нужен дизайн визитки".into())]);
    }

    #[test]
    fn test_plan_short_text_becomes_caption() {
        let text = "a".repeat(50);
        let plan = plan_message(&text, vec![1, 2, 3]);
        assert_eq!(
            plan,
            vec![Outgoing::MediaGroup {
                media: vec![1, 2, 3],
                caption: Some(text),
            }]
        );
    }

    #[test]
    fn test_plan_long_text_is_sent_separately() {
        let text = "б".repeat(1500);
        let plan = plan_message(&text, vec![1, 2]);
        assert_eq!(
            plan,
            vec![
                Outgoing::Text(text),
                Outgoing::MediaGroup {
                    media: vec![1, 2],
                    caption: None,
                },
            ]
        );
    }

    #[test]
    fn test_plan_counts_characters_not_bytes() {
        // 1024 Cyrillic characters are 2048 bytes but still fit.
        let text = "ж".repeat(CAPTION_LIMIT);
        assert!(matches!(
            plan_message(&text, vec![1]).as_slice(),
            [Outgoing::MediaGroup { caption: Some(_), .. }]
        ));
        let text = "ж".repeat(CAPTION_LIMIT + 1);
        assert_eq!(plan_message(&text, vec![1]).len(), 2);
    }

    #[tokio::test]
    async fn test_fan_out_skips_users_without_address() {
        let messenger = testing::RecordingMessenger::new();
        let notifier = Notifier::new(messenger.clone(), testing::MemoryAssetStore::new());

        let mut suppliers: Vec<User> = (1..=5).map(testing::supplier).collect();
        suppliers[2].external_chat_id = None;

        let report = notifier.fan_out(&suppliers, "Новая заявка", None).await;

        assert_eq!(report.sent, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(messenger.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_send_is_swallowed() {
        let messenger = testing::RecordingMessenger::new();
        messenger.fail_for(2);
        let notifier = Notifier::new(messenger.clone(), testing::MemoryAssetStore::new());

        let users = vec![testing::supplier(1), testing::supplier(2), testing::supplier(3)];
        let report = notifier.fan_out(&users, "hi", None).await;

        assert_eq!(report, FanOutReport { sent: 2, skipped: 0, failed: 1 });
    }

    #[tokio::test]
    async fn test_notify_with_assets_sends_group_then_action() {
        let messenger = testing::RecordingMessenger::new();
        let assets = testing::MemoryAssetStore::new();
        let id = assets.put("assets/x/a.jpg", b"jpeg");
        let notifier = Notifier::new(messenger.clone(), assets);

        let action = ReplyMarkup::single_button("Выбрать", "choose_response_1");
        let delivery = notifier
            .notify(&testing::designer(7), "Новый отклик", Some(&action), &[id])
            .await;

        assert_eq!(delivery, Delivery::Sent);
        let sent = messenger.sent();
        assert!(matches!(
            &sent[0],
            Sent::Media { chat_id: 7, count: 1, caption: Some(c) } if c == "Новый отклик"
        ));
        assert!(matches!(
            &sent[1],
            Sent::Text { text, markup: Some(_), .. } if text == ACTION_PROMPT
        ));
    }

    #[tokio::test]
    async fn test_missing_asset_reports_failure() {
        let messenger = testing::RecordingMessenger::new();
        let notifier = Notifier::new(messenger.clone(), testing::MemoryAssetStore::new());

        let delivery = notifier
            .notify(&testing::designer(7), "text", None, &["assets/missing".to_string()])
            .await;

        assert_eq!(delivery, Delivery::Failed);
        assert!(messenger.sent().is_empty());
    }
}
