// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::core::store::{AgentDirectory, MessageStore};
use crate::core::FastPathSender;
use crate::http::ratelimit::RateLimiter;

/// Everything an axum handler needs. The core itself only ever sees
/// `Arc<dyn MessageStore>`/`Arc<dyn AgentDirectory>` -- this struct is purely the
/// HTTP boundary's wiring, kept separate from `DeliveryWorker` so the worker has
/// no notion of requests, auth, or rate limits.
#[derive(Clone)]
pub struct AppState {
    pub messages: Arc<dyn MessageStore>,
    pub agents: Arc<dyn AgentDirectory>,
    pub fast_path: FastPathSender,
    pub redis_dsn: Option<String>,
    pub rate_limiter: Arc<RateLimiter>,
}
