//! Effects produced by flow transitions, executed by the bot runtime.

use crate::flow::session::ComposeTarget;
use crate::models::Role;
use crate::telegram::ReplyMarkup;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a message to the chat.
    Reply {
        text: String,
        markup: Option<ReplyMarkup>,
    },

    /// Show the draft as it will be delivered: text plus collected images.
    Preview { text: String, assets: Vec<String> },

    /// Replace the text of the message whose button was pressed, dropping its buttons.
    EditOrigin { text: String },

    /// Persist the role and contact info chosen during onboarding.
    SaveProfile { role: Role, contact_info: String },

    /// Persist the composed entity, upload its images and notify the counterpart.
    Submit {
        target: ComposeTarget,
        text: String,
        assets: Vec<String>,
    },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply {
            text: text.into(),
            markup: None,
        }
    }

    pub fn reply_with(text: impl Into<String>, markup: ReplyMarkup) -> Self {
        Effect::Reply {
            text: text.into(),
            markup: Some(markup),
        }
    }
}
