// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional Redis mirror of the Registry's FD map (spec §6: keys namespaced
//! `im:agent:*`, `im:customer:*`, `im:fd:*`, `im:token:*`). This exists for
//! observability and crash/restart recovery, never for multi-process
//! correctness (spec §9) — the in-process `Registry` is always
//! authoritative and this mirror is best-effort, fire-and-forget.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::model::AgentId;

#[derive(Clone)]
pub struct KvMirror {
    conn: ConnectionManager,
}

impl KvMirror {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    pub async fn mirror_agent_online(&self, agent_id: AgentId, session_handle: u64) {
        let mut conn = self.conn.clone();
        let key = format!("im:agent:{agent_id}");
        let fd_key = format!("im:fd:{session_handle}");
        if let Err(e) = conn
            .mset::<_, _, ()>(&[(key.as_str(), agent_id.to_string()), (fd_key.as_str(), "1".to_owned())])
            .await
        {
            tracing::debug!(agent_id, err = %e, "kv mirror: failed to write agent online");
        }
    }

    pub async fn mirror_agent_offline(&self, agent_id: AgentId) {
        let mut conn = self.conn.clone();
        let key = format!("im:agent:{agent_id}");
        if let Err(e) = conn.del::<_, ()>(&key).await {
            tracing::debug!(agent_id, err = %e, "kv mirror: failed to clear agent");
        }
    }
}
