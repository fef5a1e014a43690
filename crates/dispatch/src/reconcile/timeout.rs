// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! §4.6.3 Timeout auto-transfer: conversations whose assigned agent has
//! left a customer message unanswered past the configured threshold are
//! handed to a fresh candidate.

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::TransferKind;
use crate::state::AppState;

pub fn spawn(state: Arc<AppState>) {
    let interval = state.config.timeout_sweep_interval();
    let threshold = state.config.timeout_threshold_minutes;

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let candidates = match state.store.timeout_candidates(threshold).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, "timeout sweep: failed to read candidates");
                    continue;
                }
            };

            let mut transferred = 0usize;
            let mut failed = 0usize;

            for conv in candidates {
                let Some(current_agent) = conv.agent_id else { continue };
                let mut exclude = HashSet::new();
                exclude.insert(current_agent);

                let engine = crate::assignment::AssignmentEngine::new(&state.registry, state.store.as_ref());
                match engine.pick(&exclude).await {
                    Some(target) => {
                        let reason = format!("customer unanswered {threshold} minutes");
                        match state
                            .lifecycle
                            .transfer(conv.id, target, TransferKind::AutoTimeout, None, &reason)
                            .await
                        {
                            Ok(()) => transferred += 1,
                            Err(e) => {
                                tracing::debug!(conversation_id = conv.id, error = %e, "timeout sweep: transfer failed");
                                failed += 1;
                            }
                        }
                    }
                    None => failed += 1,
                }
            }

            if transferred > 0 || failed > 0 {
                tracing::info!(transferred, failed, "timeout sweep completed");
            }
        }
    });
}
