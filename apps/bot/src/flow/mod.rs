//! Guided dialogs: onboarding and the request/response compose flows.
//!
//! `transition::step` is pure; the bot runtime loads the session, feeds it an
//! input, persists the next session and executes the returned effects.

mod effect;
pub mod session;
pub mod store;
pub mod texts;
mod transition;

pub use effect::Effect;
pub use session::{ComposeKind, ComposeTarget, FlowAction, FlowInput, Session};
pub use store::{RedisSessionStore, SessionStore};
pub use transition::{confirm_keyboard, enter_compose, enter_onboarding, step, Transition};
