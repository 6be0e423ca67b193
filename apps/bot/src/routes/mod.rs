pub mod health;
pub mod telegram;

use axum::{
    routing::{get, post},
    Router,
};

use crate::moderation;
use crate::state::AppState;
use crate::webapp::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/telegram/webhook", post(telegram::handle_webhook))
        // Web app API
        .route("/api/v1/requests", get(handlers::handle_list_requests))
        .route("/api/v1/requests/:id", get(handlers::handle_get_request))
        .route(
            "/api/v1/requests/:id/status",
            post(handlers::handle_update_status),
        )
        .route(
            "/api/v1/requests/:id/respond-prompt",
            post(handlers::handle_respond_prompt),
        )
        .route("/api/v1/open-requests", get(handlers::handle_open_requests))
        .route("/api/v1/responses", get(handlers::handle_list_responses))
        .route("/api/v1/responses/:id", get(handlers::handle_get_response))
        .route(
            "/api/v1/responses/:id/choose",
            post(handlers::handle_choose_response),
        )
        // Moderation back office
        .route(
            "/api/v1/webhooks/user-updated",
            post(moderation::handle_user_updated),
        )
        .with_state(state)
}
