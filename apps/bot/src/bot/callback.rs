use uuid::Uuid;

use crate::flow::FlowAction;
use crate::lifecycle::requests::RESPOND_PREFIX;
use crate::lifecycle::responses::CHOOSE_PREFIX;

/// Decoded inline-button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    RespondRequest(Uuid),
    ChooseResponse(Uuid),
    Flow(FlowAction),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix(RESPOND_PREFIX) {
            return Uuid::parse_str(id).ok().map(CallbackAction::RespondRequest);
        }
        if let Some(id) = data.strip_prefix(CHOOSE_PREFIX) {
            return Uuid::parse_str(id).ok().map(CallbackAction::ChooseResponse);
        }
        FlowAction::parse(data).map(CallbackAction::Flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::ComposeKind;
    use crate::lifecycle::{requests, responses};
    use crate::telegram::ReplyMarkup;

    fn data_of(markup: ReplyMarkup) -> String {
        match markup {
            ReplyMarkup::Inline(rows) => rows[0][0].callback_data.clone(),
            other => panic!("expected inline markup, got {other:?}"),
        }
    }

    #[test]
    fn test_entity_buttons_parse_back() {
        let id = Uuid::new_v4();
        assert_eq!(
            CallbackAction::parse(&data_of(requests::respond_button(id))),
            Some(CallbackAction::RespondRequest(id))
        );
        assert_eq!(
            CallbackAction::parse(&data_of(responses::choose_button(id))),
            Some(CallbackAction::ChooseResponse(id))
        );
    }

    #[test]
    fn test_flow_buttons_and_garbage() {
        assert_eq!(
            CallbackAction::parse("cancel_response"),
            Some(CallbackAction::Flow(FlowAction::Cancel(ComposeKind::Response)))
        );
        assert_eq!(CallbackAction::parse("respond_request_not-a-uuid"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }
}
