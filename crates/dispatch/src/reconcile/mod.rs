// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic reconcilers (spec §4.6): pure consumers of `Registry` and
//! `ConversationStore` that restore invariants violated by missed events.
//! Each runs as its own timed background task, shaped after
//! `coopmux::upstream::health::spawn_health_checker`.

mod drain;
mod heartbeat;
mod timeout;

use std::sync::Arc;

use crate::state::AppState;

pub fn spawn_all(state: Arc<AppState>) {
    heartbeat::spawn(Arc::clone(&state));
    drain::spawn(Arc::clone(&state));
    timeout::spawn(state);
}
