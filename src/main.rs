// SPDX-License-Identifier: MIT

use std::sync::Arc;

use agent_relay_core::core::presence::fast_path_channel;
use agent_relay_core::core::store::{AgentDirectory, MessageStore, PresenceStore};
use agent_relay_core::core::{dispatch, DeliveryWorker, RetryScheduler};
use agent_relay_core::db::{self, memory::InMemoryStore, SeaOrmStore};
use agent_relay_core::error::Result;
use agent_relay_core::http::ratelimit::RateLimiter;
use agent_relay_core::http::{router, AppState};
use agent_relay_core::{cfg, redis as presence_redis};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = cfg::load()?;
    tracing::info!(bind_address = %config.bind_address, "starting agent-relay");

    let shutdown = CancellationToken::new();

    let (message_store, presence_store, agent_directory): (
        Arc<dyn MessageStore>,
        Arc<dyn PresenceStore>,
        Arc<dyn AgentDirectory>,
    ) = if config.database_url == "sqlite::memory:" {
        tracing::warn!("no database configured, falling back to an in-memory store");
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), store.clone(), store)
    } else {
        let conn = db::connect(&config.database_url).await?;
        let store = Arc::new(SeaOrmStore::new(conn));
        (store.clone(), store.clone(), store)
    };

    let (fast_path_tx, fast_path_rx) = fast_path_channel();

    if config.fast_path_enabled {
        if let Some(dsn) = &config.redis_dsn {
            tokio::spawn(presence_redis::run_subscriber(
                dsn.clone(),
                fast_path_tx.clone(),
                shutdown.clone(),
            ));
        }
    }

    let client = dispatch::new_client(config.http_timeout());
    let scheduler = RetryScheduler::new(config.retry_ladder_secs.clone(), config.max_retries);

    // `worker_count` workers all scan the same store, relying on
    // `MessageStore::update`'s conditional write to arbitrate races rather than
    // partitioning the queue. Only the first gets the fast-path receiver -- it's
    // a single-consumer channel, so the rest fall back to pure polling for
    // presence-driven wakeups, same as a deployment with the fast
    // path disabled.
    let worker_count = config.worker_count.max(1);
    tracing::info!(worker_count, "starting delivery workers");
    let mut fast_path_rx = Some(fast_path_rx);
    let mut worker_handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let worker = DeliveryWorker::new(
            message_store.clone(),
            presence_store.clone(),
            client.clone(),
            scheduler.clone(),
            config.poll_interval(),
            shutdown.clone(),
        );
        let rx = fast_path_rx.take().filter(|_| config.fast_path_enabled);
        worker_handles.push(tokio::spawn(worker.run(rx)));
    }

    let state = AppState {
        messages: message_store,
        agents: agent_directory,
        fast_path: fast_path_tx,
        redis_dsn: config.redis_dsn.clone(),
        rate_limiter: Arc::new(RateLimiter::default()),
    };

    let app = router(state);
    let listener_shutdown = shutdown.clone();
    tracing::info!("listening on {}", config.bind_address);
    axum::Server::bind(&config.bind_address)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
            listener_shutdown.cancel();
        })
        .await
        .map_err(|e| agent_relay_core::error::Error::Generic(format!("http server error: {e}")))?;

    shutdown.cancel();
    for handle in worker_handles {
        handle
            .await
            .map_err(|e| agent_relay_core::error::Error::Generic(format!("worker task panicked: {e}")))?;
    }

    Ok(())
}
