//! JSON API backing the chat web app: listings and detail views of requests
//! and responses, plus the status, choose and respond-prompt actions.

pub mod handlers;
mod views;
