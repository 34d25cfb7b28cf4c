// SPDX-License-Identifier: MIT

pub mod auth;
pub mod handlers;
pub mod ratelimit;
pub mod state;

use axum::routing::{get, post, put};
use axum::Router;

pub use state::AppState;

/// A thin REST surface -- just enough to drive the delivery core end to end.
/// None of its concerns (auth schemes, quota tuning, client ergonomics) are
/// elaborated beyond what's needed for that.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/agents/register", post(handlers::register_agent))
        .route("/api/agents/:id", get(handlers::get_agent))
        .route("/api/agents/:id/status", put(handlers::update_agent_status))
        .route("/api/messages/send", post(handlers::send_message))
        .route("/api/messages/:id", get(handlers::get_message))
        .with_state(state)
}
