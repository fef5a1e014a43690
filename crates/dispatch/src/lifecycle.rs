// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lifecycle manager (spec §4.4): the heart of the system. Holds no
//! state of its own — a stateless façade over `Registry` and
//! `ConversationStore`, orchestrating atomic state changes and fan-out.
//! Shaped after `coopmux::upstream::bridge`'s role as an orchestrator that
//! owns no state beyond references to the components it coordinates.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::assignment::AssignmentEngine;
use crate::error::{StoreError, TransferError};
use crate::model::{
    Agent, AgentId, ContentKind, ConversationId, CustomerId, Principal, PrincipalKind, SenderKind,
    TransferKind,
};
use crate::registry::Registry;
use crate::store::ConversationStore;
use crate::transport::frame::OutboundFrame;

pub struct LifecycleManager {
    registry: Arc<Registry>,
    store: Arc<dyn ConversationStore>,
}

/// Outcome of reassigning every ACTIVE conversation held by an agent that
/// just went offline (spec §4.4.8), surfaced so the heartbeat reconciler
/// can log sweep counts (spec §4.6.1).
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineHandoffOutcome {
    pub transferred: usize,
    pub reverted: usize,
}

impl LifecycleManager {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn ConversationStore>) -> Self {
        Self { registry, store }
    }

    fn assignment_engine(&self) -> AssignmentEngine<'_> {
        AssignmentEngine::new(&self.registry, self.store.as_ref())
    }

    async fn push_to_agent(&self, agent_id: AgentId, frame: OutboundFrame) {
        let Some(session) = self.registry.lookup_agent_session(agent_id).await else {
            tracing::debug!(agent_id, kind = frame.kind, "agent not online, dropping push");
            return;
        };
        if session.push(frame).is_err() {
            tracing::debug!(agent_id, "push failed, receiver gone");
        }
    }

    async fn push_to_customer(&self, customer_id: CustomerId, frame: OutboundFrame) {
        let Some(session) = self.registry.lookup_customer_session(customer_id).await else {
            tracing::debug!(customer_id, kind = frame.kind, "customer not online, dropping push");
            return;
        };
        if session.push(frame).is_err() {
            tracing::debug!(customer_id, "push failed, receiver gone");
        }
    }

    /// Recomputes and re-publishes an agent's load score (spec §4.2
    /// rationale: `active_count * 1.0 + waiting_count * 1.5`). `waiting_count`
    /// is the size of the global waiting queue — the legacy formula is
    /// per-agent but waiting conversations have no agent by definition, so
    /// every online agent shares the same queue-pressure term and only the
    /// active-count term actually differentiates candidates.
    async fn recompute_load(&self, agent_id: AgentId) -> Result<(), StoreError> {
        let active = self.store.active_conversation_count(agent_id).await?;
        let waiting = self.store.waiting_queue().await?.len() as i64;
        let score = active as f64 + waiting as f64 * 1.5;
        self.registry.update_load(agent_id, score).await;
        Ok(())
    }

    /// §4.4.1 Customer inbound message.
    pub async fn handle_customer_message(
        &self,
        customer_id: CustomerId,
        content_kind: ContentKind,
        body: &str,
    ) -> Result<(), StoreError> {
        let conv = self.store.get_or_open_for(customer_id).await?;
        let just_created = conv.last_message_at.is_none();

        self.store
            .append_message(conv.id, SenderKind::Customer, customer_id, content_kind, body, true)
            .await?;
        self.store.touch_last_customer_message(conv.id).await?;

        if let Some(agent_id) = conv.agent_id {
            self.push_to_agent(
                agent_id,
                OutboundFrame::new(
                    "new_message",
                    json!({"conversation_id": conv.id, "content_kind": content_kind, "body": body}),
                ),
            )
            .await;
            if just_created {
                self.push_to_agent(
                    agent_id,
                    OutboundFrame::new("conversation_assigned", json!({"conversation_id": conv.id, "customer_id": customer_id})),
                )
                .await;
            }
        } else {
            let exclude = HashSet::new();
            match self.assignment_engine().pick(&exclude).await {
                Some(candidate) => {
                    self.store.assign(conv.id, candidate).await?;
                    self.recompute_load(candidate).await?;
                    let customer = self.store.get_customer(customer_id).await?;
                    self.push_to_agent(
                        candidate,
                        OutboundFrame::new(
                            "conversation_assigned",
                            json!({"conversation_id": conv.id, "customer_id": customer_id, "customer": customer, "is_transfer": false}),
                        ),
                    )
                    .await;
                    self.push_to_agent(
                        candidate,
                        OutboundFrame::new(
                            "new_message",
                            json!({"conversation_id": conv.id, "content_kind": content_kind, "body": body}),
                        ),
                    )
                    .await;
                    self.push_to_customer(
                        customer_id,
                        OutboundFrame::new("agent_assigned", json!({"conversation_id": conv.id, "agent_id": candidate})),
                    )
                    .await;
                }
                None => {
                    self.push_to_customer(
                        customer_id,
                        OutboundFrame::new("queue_notice", json!({"conversation_id": conv.id})),
                    )
                    .await;
                }
            }
        }

        self.push_to_customer(
            customer_id,
            OutboundFrame::new("message_sent", json!({"conversation_id": conv.id, "body": body})),
        )
        .await;

        Ok(())
    }

    /// §4.4.2 Agent inbound message.
    pub async fn handle_agent_message(
        &self,
        agent_id: AgentId,
        conversation_id: ConversationId,
        content_kind: ContentKind,
        body: &str,
    ) -> Result<(), StoreError> {
        let Some(conv) = self.store.get_conversation(conversation_id).await? else {
            return Ok(());
        };
        if conv.agent_id != Some(agent_id) || conv.is_closed() {
            return Ok(());
        }

        self.store
            .append_message(conversation_id, SenderKind::Agent, agent_id, content_kind, body, true)
            .await?;
        self.store.touch_last_agent_reply(conversation_id).await?;

        self.push_to_customer(
            conv.customer_id,
            OutboundFrame::new("new_message", json!({"conversation_id": conversation_id, "content_kind": content_kind, "body": body})),
        )
        .await;
        self.push_to_agent(
            agent_id,
            OutboundFrame::new("message_sent", json!({"conversation_id": conversation_id, "body": body})),
        )
        .await;

        Ok(())
    }

    /// §4.4.3 Typing indicator. No persistence.
    pub async fn handle_typing(
        &self,
        from: Principal,
        conversation_id: ConversationId,
        typing: bool,
    ) -> Result<(), StoreError> {
        let Some(conv) = self.store.get_conversation(conversation_id).await? else {
            return Ok(());
        };

        match from.kind {
            PrincipalKind::Agent => {
                if conv.agent_id != Some(from.id) {
                    return Ok(());
                }
                self.push_to_customer(
                    conv.customer_id,
                    OutboundFrame::new("typing", json!({"conversation_id": conversation_id, "typing": typing})),
                )
                .await;
            }
            PrincipalKind::Customer => {
                if conv.customer_id != from.id {
                    return Ok(());
                }
                if let Some(agent_id) = conv.agent_id {
                    self.push_to_agent(
                        agent_id,
                        OutboundFrame::new("typing", json!({"conversation_id": conversation_id, "typing": typing})),
                    )
                    .await;
                }
            }
        }

        Ok(())
    }

    /// §4.4.4 Read receipts.
    pub async fn handle_read(&self, from: Principal, conversation_id: ConversationId) -> Result<(), StoreError> {
        let Some(conv) = self.store.get_conversation(conversation_id).await? else {
            return Ok(());
        };

        match from.kind {
            PrincipalKind::Agent => {
                if conv.agent_id != Some(from.id) {
                    return Ok(());
                }
                self.store.mark_read(conversation_id, SenderKind::Agent).await?;
                self.push_to_customer(
                    conv.customer_id,
                    OutboundFrame::new("messages_read", json!({"conversation_id": conversation_id, "reader": "agent"})),
                )
                .await;
            }
            PrincipalKind::Customer => {
                if conv.customer_id != from.id {
                    return Ok(());
                }
                self.store.mark_read(conversation_id, SenderKind::Customer).await?;
                if let Some(agent_id) = conv.agent_id {
                    self.push_to_agent(
                        agent_id,
                        OutboundFrame::new("messages_read", json!({"conversation_id": conversation_id, "reader": "customer"})),
                    )
                    .await;
                }
            }
        }

        Ok(())
    }

    /// §4.4.5 Close conversation. Only the assigned agent may close; any
    /// other caller is silently ignored (spec §7 permission-denied policy).
    pub async fn close_conversation(&self, agent_id: AgentId, conversation_id: ConversationId) -> Result<(), StoreError> {
        let Some(conv) = self.store.get_conversation(conversation_id).await? else {
            return Ok(());
        };
        if conv.agent_id != Some(agent_id) {
            return Ok(());
        }

        self.store.close(conversation_id).await?;

        self.push_to_agent(agent_id, OutboundFrame::new("conversation_closed", json!({"conversation_id": conversation_id}))).await;
        self.push_to_customer(
            conv.customer_id,
            OutboundFrame::new("conversation_closed", json!({"conversation_id": conversation_id})),
        )
        .await;

        self.try_drain_waiting_for(agent_id).await?;
        Ok(())
    }

    /// §4.4.6 Transfer (manual or automatic).
    pub async fn transfer(
        &self,
        conversation_id: ConversationId,
        target_agent_id: AgentId,
        kind: TransferKind,
        operator_id: Option<AgentId>,
        reason: &str,
    ) -> Result<(), TransferError> {
        let conv = self
            .store
            .get_conversation(conversation_id)
            .await
            .map_err(|_| TransferError::TargetUnavailable)?
            .ok_or(TransferError::ConversationNotFound)?;

        if conv.is_closed() {
            return Err(TransferError::ConversationClosed);
        }
        let from_agent_id = conv.agent_id.ok_or(TransferError::NoCurrentAgent)?;
        if from_agent_id == target_agent_id {
            return Err(TransferError::SameAgent);
        }

        let target: Agent = self
            .store
            .get_agent(target_agent_id)
            .await
            .map_err(|_| TransferError::TargetUnavailable)?
            .ok_or(TransferError::TargetUnavailable)?;
        if !target.is_assignable() {
            return Err(TransferError::TargetUnavailable);
        }
        if self.registry.agent_status(target_agent_id).await != crate::model::AgentStatus::Online {
            return Err(TransferError::TargetOffline);
        }
        let active_count = self
            .store
            .active_conversation_count(target_agent_id)
            .await
            .map_err(|_| TransferError::TargetUnavailable)?;
        if active_count >= target.capacity {
            return Err(TransferError::TargetFull);
        }

        let from_name = self
            .store
            .get_agent(from_agent_id)
            .await
            .ok()
            .flatten()
            .map(|a| a.display_name)
            .unwrap_or_else(|| format!("agent #{from_agent_id}"));

        if let Err(e) = self.store.reassign(conversation_id, target_agent_id).await {
            tracing::warn!(conversation_id, error = %e, "transfer: reassign failed");
            return Err(TransferError::TargetUnavailable);
        }
        if let Err(e) = self
            .store
            .append_transfer(conversation_id, from_agent_id, target_agent_id, kind, operator_id, reason)
            .await
        {
            tracing::warn!(conversation_id, error = %e, "transfer: append_transfer failed");
        }
        if let Err(e) = self.store.mark_all_unread(conversation_id).await {
            tracing::warn!(conversation_id, error = %e, "transfer: mark_all_unread failed");
        }

        let system_body = format!(
            "conversation transferred from {} to {} ({})",
            from_name, target.display_name, kind.as_str()
        );
        if let Err(e) = self
            .store
            .append_message(conversation_id, SenderKind::System, 0, ContentKind::Text, &system_body, false)
            .await
        {
            tracing::warn!(conversation_id, error = %e, "transfer: system message append failed");
        }

        if let Err(e) = self.recompute_load(from_agent_id).await {
            tracing::warn!(agent_id = from_agent_id, error = %e, "transfer: load recompute failed");
        }
        if let Err(e) = self.recompute_load(target_agent_id).await {
            tracing::warn!(agent_id = target_agent_id, error = %e, "transfer: load recompute failed");
        }

        let history = self.store.messages(conversation_id).await.unwrap_or_default();
        let unread_count = history.iter().filter(|m| m.sender_kind == SenderKind::Customer && !m.read).count();

        self.push_to_agent(
            from_agent_id,
            OutboundFrame::new(
                "conversation_transferred_out",
                json!({"conversation_id": conversation_id, "to_agent_id": target_agent_id, "to_name": target.display_name, "kind": kind.as_str(), "reason": reason}),
            ),
        )
        .await;
        self.push_to_agent(
            target_agent_id,
            OutboundFrame::new(
                "conversation_assigned",
                json!({
                    "conversation_id": conversation_id,
                    "is_transfer": true,
                    "from_agent_id": from_agent_id,
                    "unread_count": unread_count,
                    "history": history,
                }),
            ),
        )
        .await;
        self.push_to_customer(
            conv.customer_id,
            OutboundFrame::new(
                "agent_changed",
                json!({"conversation_id": conversation_id, "text": format!("you are now talking with {}", target.display_name)}),
            ),
        )
        .await;

        Ok(())
    }

    /// §4.4.7 Drain waiting queue to a specific agent. Returns the number
    /// of conversations assigned.
    pub async fn try_drain_waiting_for(&self, agent_id: AgentId) -> Result<usize, StoreError> {
        if self.registry.agent_status(agent_id).await != crate::model::AgentStatus::Online {
            return Ok(0);
        }
        if !self.registry.is_alive(agent_id).await {
            return Ok(0);
        }
        let Some(agent) = self.store.get_agent(agent_id).await? else {
            return Ok(0);
        };
        if !agent.is_assignable() {
            return Ok(0);
        }

        let mut active = self.store.active_conversation_count(agent_id).await?;
        let free_slots = agent.capacity - active;
        if free_slots <= 0 {
            return Ok(0);
        }

        let candidates = self.store.waiting_queue_head(free_slots).await?;
        let mut assigned = 0usize;
        for conv in candidates {
            if active >= agent.capacity {
                break;
            }
            if self.store.assign(conv.id, agent_id).await.is_err() {
                continue;
            }
            active += 1;
            assigned += 1;

            self.push_to_agent(
                agent_id,
                OutboundFrame::new(
                    "conversation_assigned",
                    json!({"conversation_id": conv.id, "customer_id": conv.customer_id, "is_transfer": false}),
                ),
            )
            .await;
            self.push_to_customer(
                conv.customer_id,
                OutboundFrame::new("agent_assigned", json!({"conversation_id": conv.id, "agent_id": agent_id})),
            )
            .await;
        }

        if assigned > 0 {
            self.recompute_load(agent_id).await?;
        }
        Ok(assigned)
    }

    /// §4.4.8 Transfer on agent offline.
    pub async fn handle_agent_offline(&self, agent_id: AgentId) -> Result<OfflineHandoffOutcome, StoreError> {
        let mut outcome = OfflineHandoffOutcome::default();
        let conversations = self.store.active_conversations_for_agent(agent_id).await?;

        for conv in conversations {
            let mut exclude = HashSet::new();
            exclude.insert(agent_id);
            let candidate = self.assignment_engine().pick(&exclude).await;

            match candidate {
                Some(target) => {
                    match self.transfer(conv.id, target, TransferKind::AutoAgentOffline, None, "agent went offline").await {
                        Ok(()) => outcome.transferred += 1,
                        Err(e) => {
                            tracing::warn!(conversation_id = conv.id, error = %e, "offline handoff transfer failed, reverting to waiting");
                            self.store.revert_to_waiting(conv.id).await?;
                            outcome.reverted += 1;
                        }
                    }
                }
                None => {
                    self.store.revert_to_waiting(conv.id).await?;
                    outcome.reverted += 1;
                }
            }
        }

        Ok(outcome)
    }
}
