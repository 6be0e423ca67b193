//! Per-chat conversational state. Serialized as JSON into the session store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// Which entity a compose flow produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeKind {
    Request,
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum ComposeTarget {
    Request,
    Response { request_id: Uuid },
}

impl ComposeTarget {
    pub fn kind(&self) -> ComposeKind {
        match self {
            ComposeTarget::Request => ComposeKind::Request,
            ComposeTarget::Response { .. } => ComposeKind::Response,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ComposeStep {
    AwaitText,
    AwaitAssetsOrDone { text: String, assets: Vec<String> },
    AwaitConfirm { text: String, assets: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum OnboardingStep {
    AwaitRole,
    AwaitContact { role: Role },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum Session {
    Onboarding { step: OnboardingStep },
    Compose { target: ComposeTarget, step: ComposeStep },
}

/// Button presses the flows react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    Submit(ComposeKind),
    Cancel(ComposeKind),
    PickRole(Role),
}

impl FlowAction {
    pub fn callback_data(&self) -> &'static str {
        match self {
            FlowAction::Submit(ComposeKind::Request) => "send_request",
            FlowAction::Submit(ComposeKind::Response) => "send_response",
            FlowAction::Cancel(ComposeKind::Request) => "cancel_request",
            FlowAction::Cancel(ComposeKind::Response) => "cancel_response",
            FlowAction::PickRole(Role::Supplier) => "supplier",
            FlowAction::PickRole(_) => "designer",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        Some(match data {
            "send_request" => FlowAction::Submit(ComposeKind::Request),
            "send_response" => FlowAction::Submit(ComposeKind::Response),
            "cancel_request" => FlowAction::Cancel(ComposeKind::Request),
            "cancel_response" => FlowAction::Cancel(ComposeKind::Response),
            "designer" => FlowAction::PickRole(Role::Designer),
            "supplier" => FlowAction::PickRole(Role::Supplier),
            _ => return None,
        })
    }
}

/// One inbound interaction as seen by a flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowInput {
    Text(String),
    /// Transport-native image reference.
    Photo(String),
    Action(FlowAction),
    /// Any other message type.
    Unsupported,
}
