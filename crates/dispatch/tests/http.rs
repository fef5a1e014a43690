// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the dispatch HTTP surface.
//!
//! Uses `axum_test::TestServer` — no real TCP needed.

use std::sync::Arc;

use axum::http::StatusCode;
use tokio_util::sync::CancellationToken;

use im_dispatch::auth::{AllowAll, HmacTokenVerifier};
use im_dispatch::config::DispatchConfig;
use im_dispatch::registry::Registry;
use im_dispatch::state::AppState;
use im_dispatch::store::sqlite::SqliteConversationStore;
use im_dispatch::store::ConversationStore;
use im_dispatch::transport::build_router;

fn test_config() -> DispatchConfig {
    DispatchConfig {
        host: "127.0.0.1".into(),
        port: 0,
        token_secret: "a-long-enough-test-secret".into(),
        token_ttl_secs: 86_400,
        heartbeat_ttl_secs: 60,
        heartbeat_sweep_secs: 3600,
        waiting_drain_secs: 3600,
        timeout_sweep_secs: 3600,
        timeout_threshold_minutes: 2,
        default_capacity: 10,
        db_path: ":memory:".into(),
        redis_url: None,
    }
}

async fn test_state() -> Arc<AppState> {
    let config = test_config();
    let store: Arc<dyn ConversationStore> =
        Arc::new(SqliteConversationStore::open_in_memory().await.expect("open in-memory store"));
    let registry = Arc::new(Registry::new(config.heartbeat_ttl()));
    let verifier = Arc::new(HmacTokenVerifier::new(&config.token_secret, AllowAll));
    Arc::new(AppState::new(config, registry, store, verifier, CancellationToken::new()))
}

#[tokio::test]
async fn health_returns_ok() {
    let state = test_state().await;
    let app = build_router(state);
    let server = axum_test::TestServer::new(app).expect("create test server");

    let resp = server.get("/health").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn ws_endpoint_rejects_a_plain_get_without_upgrade_headers() {
    let state = test_state().await;
    let app = build_router(state);
    let server = axum_test::TestServer::new(app).expect("create test server");

    let resp = server.get("/ws?type=customer&uuid=test-1").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}
