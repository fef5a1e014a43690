// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! §4.6.1 Heartbeat sweep: evicts agents whose liveness marker has expired
//! and hands off their ACTIVE conversations.

use std::sync::Arc;

use crate::state::AppState;

pub fn spawn(state: Arc<AppState>) {
    let interval = state.config.heartbeat_sweep_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let online = state.registry.online_agents().await;
            let mut evicted = 0usize;
            let mut transferred = 0usize;
            let mut reverted = 0usize;

            for agent_id in online {
                if state.registry.is_alive(agent_id).await {
                    continue;
                }

                evicted += 1;
                // The agent's session (if any lingering mapping remains) is
                // force-unbound by id rather than by handle: a stale liveness
                // marker means the transport is presumed dead regardless of
                // whether `UnbindBySession` already ran.
                if let Some(session) = state.registry.lookup_agent_session(agent_id).await {
                    state.registry.unbind_by_session(session.handle).await;
                } else {
                    state.registry.set_status(agent_id, crate::model::AgentStatus::Offline).await;
                }

                match state.lifecycle.handle_agent_offline(agent_id).await {
                    Ok(outcome) => {
                        transferred += outcome.transferred;
                        reverted += outcome.reverted;
                    }
                    Err(e) => tracing::warn!(agent_id, error = %e, "offline handoff failed"),
                }
            }

            if evicted > 0 {
                tracing::info!(evicted, transferred, reverted, "heartbeat sweep evicted stale agents");
            }
        }
    });
}
