// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! §4.6.2 Waiting-queue drain: a belt-and-suspenders sweep over online
//! agents when the waiting queue is non-empty. The primary assignment
//! paths are the customer-inbound path and the agent-online path; this
//! only catches what they missed.

use std::sync::Arc;

use crate::state::AppState;

pub fn spawn(state: Arc<AppState>) {
    let interval = state.config.waiting_drain_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let waiting = match state.store.waiting_queue().await {
                Ok(w) => w,
                Err(e) => {
                    tracing::warn!(error = %e, "waiting-drain: failed to read waiting queue");
                    continue;
                }
            };
            if waiting.is_empty() {
                continue;
            }

            let mut candidates = state.registry.agents_by_load().await;
            candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let mut total_assigned = 0usize;
            for (agent_id, _score) in candidates {
                match state.lifecycle.try_drain_waiting_for(agent_id).await {
                    Ok(n) => total_assigned += n,
                    Err(e) => tracing::warn!(agent_id, error = %e, "waiting-drain: drain failed"),
                }

                if state.store.waiting_queue().await.map(|q| q.is_empty()).unwrap_or(false) {
                    break;
                }
            }

            if total_assigned > 0 {
                tracing::info!(total_assigned, "waiting-drain sweep assigned conversations");
            }
        }
    });
}
