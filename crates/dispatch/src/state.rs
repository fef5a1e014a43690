// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state, built once at startup and threaded through
//! every axum handler via `State<Arc<AppState>>`. Shaped after
//! `coopmux::state::MuxState`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::TokenVerifier;
use crate::config::DispatchConfig;
use crate::lifecycle::LifecycleManager;
use crate::registry::Registry;
use crate::store::ConversationStore;

pub struct AppState {
    pub config: DispatchConfig,
    pub registry: Arc<Registry>,
    pub store: Arc<dyn ConversationStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: DispatchConfig,
        registry: Arc<Registry>,
        store: Arc<dyn ConversationStore>,
        verifier: Arc<dyn TokenVerifier>,
        shutdown: CancellationToken,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&registry), Arc::clone(&store)));
        Self { config, registry, store, lifecycle, verifier, shutdown }
    }
}
