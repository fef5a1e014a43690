// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live-chat dispatch core: connection registry, load-balanced agent
//! assignment, conversation lifecycle and transfer, and the periodic
//! reconcilers that keep the system converging on its invariants even
//! when a disconnect or a stalled reply is missed.

pub mod assignment;
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::auth::{AllowAll, HmacTokenVerifier};
use crate::config::DispatchConfig;
use crate::registry::Registry;
use crate::state::AppState;
use crate::store::sqlite::SqliteConversationStore;
use crate::store::ConversationStore;

/// Run the dispatch core until shutdown.
pub async fn run(config: DispatchConfig) -> anyhow::Result<()> {
    config.validate()?;

    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let store = SqliteConversationStore::open(&config.db_path).await?;
    #[cfg_attr(not(feature = "kv-mirror"), allow(unused_mut))]
    let mut registry = Registry::new(config.heartbeat_ttl());

    #[cfg(feature = "kv-mirror")]
    if let Some(redis_url) = &config.redis_url {
        match crate::registry::kv::KvMirror::connect(redis_url).await {
            Ok(kv) => registry = registry.with_kv_mirror(kv),
            Err(e) => tracing::warn!(error = %e, "failed to connect KV mirror, continuing without it"),
        }
    }

    let verifier = Arc::new(HmacTokenVerifier::new(&config.token_secret, AllowAll));
    let store: Arc<dyn ConversationStore> = Arc::new(store);

    let state = Arc::new(AppState::new(config, Arc::new(registry), store, verifier, shutdown.clone()));

    reconcile::spawn_all(Arc::clone(&state));

    tracing::info!(%addr, "im-dispatch listening");
    let router = transport::build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
