// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent assignment engine (spec §4.2): load-ranked, capacity-bounded,
//! admin-excluded candidate selection.

use std::collections::HashSet;

use crate::model::AgentId;
use crate::registry::Registry;
use crate::store::ConversationStore;

pub struct AssignmentEngine<'a> {
    registry: &'a Registry,
    store: &'a dyn ConversationStore,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn ConversationStore) -> Self {
        Self { registry, store }
    }

    /// §4.2 `Pick`. Walks `Registry::AgentsByLoad()` ascending and returns
    /// the first survivor, re-checking active-conversation count against
    /// the store at the decision point rather than trusting the cached
    /// load score (spec §9: "implementers should NOT optimize this away").
    pub async fn pick(&self, exclude: &HashSet<AgentId>) -> Option<AgentId> {
        let candidates = self.registry.agents_by_load().await;

        for (agent_id, _score) in candidates {
            if exclude.contains(&agent_id) {
                continue;
            }

            if self.registry.agent_status(agent_id).await != crate::model::AgentStatus::Online {
                continue;
            }

            if !self.registry.is_alive(agent_id).await {
                continue;
            }

            let Ok(Some(agent)) = self.store.get_agent(agent_id).await else {
                continue;
            };

            if !agent.is_assignable() {
                continue;
            }

            let Ok(active_count) = self.store.active_conversation_count(agent_id).await else {
                continue;
            };

            if active_count >= agent.capacity {
                continue;
            }

            return Some(agent_id);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agent, AgentStatus};
    use crate::store::sqlite::SqliteConversationStore;
    use std::time::Duration;

    async fn setup() -> (Registry, SqliteConversationStore) {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let registry = Registry::new(Duration::from_secs(60));
        (registry, store)
    }

    async fn online_agent(registry: &Registry, store: &SqliteConversationStore, id: AgentId, capacity: i64) {
        store
            .upsert_agent(&Agent { id, display_name: format!("a{id}"), capacity, enabled: true, admin: false })
            .await
            .unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = registry.new_session_handle();
        let session = registry.new_session(handle, tx);
        registry.bind_agent(id, session).await;
        registry.set_status(id, AgentStatus::Online).await;
    }

    #[tokio::test]
    async fn picks_online_agent_under_capacity() {
        let (registry, store) = setup().await;
        online_agent(&registry, &store, 1, 2).await;
        let engine = AssignmentEngine::new(&registry, &store);
        assert_eq!(engine.pick(&HashSet::new()).await, Some(1));
    }

    #[tokio::test]
    async fn skips_admin_and_disabled_and_excluded() {
        let (registry, store) = setup().await;
        online_agent(&registry, &store, 1, 2).await;
        store
            .upsert_agent(&Agent { id: 2, display_name: "admin".into(), capacity: 5, enabled: true, admin: true })
            .await
            .unwrap();
        online_agent(&registry, &store, 3, 2).await;

        let engine = AssignmentEngine::new(&registry, &store);
        let mut exclude = HashSet::new();
        exclude.insert(1);
        assert_eq!(engine.pick(&exclude).await, Some(3));
    }

    #[tokio::test]
    async fn skips_agent_at_capacity() {
        let (registry, store) = setup().await;
        online_agent(&registry, &store, 1, 1).await;
        let customer = store.get_or_create_customer("c1").await.unwrap();
        let conv = store.get_or_open_for(customer.id).await.unwrap();
        store.assign(conv.id, 1).await.unwrap();

        let engine = AssignmentEngine::new(&registry, &store);
        assert_eq!(engine.pick(&HashSet::new()).await, None);
    }
}
