// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The conversation store contract (spec §4.3): durable conversation and
//! message records, transfer history, and the query shapes the reconcilers
//! need. Shaped after `lmlang-storage::traits::GraphStore` — a trait
//! separating the storage contract from the backend, with a single SQLite
//! implementation (`store::sqlite`).

pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    Agent, AgentId, ContentKind, Conversation, ConversationId, Customer, CustomerId, Message,
    SenderKind, TransferKind, TransferRecord,
};

/// The storage contract for agents, customers, conversations, messages, and
/// transfer history. All operations are async so a backend can suspend on
/// I/O without blocking the worker driving a connection's frame loop
/// (spec §5).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    // -- Agents (mutated only by the out-of-scope admin surface; read here) --

    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, StoreError>;

    /// Exposed for the admin surface and for tests; not part of the
    /// streaming control flow.
    async fn upsert_agent(&self, agent: &Agent) -> Result<(), StoreError>;

    /// Count of that agent's non-CLOSED conversations, read live at the
    /// assignment decision point (spec §4.2 point 3 — never cached).
    async fn active_conversation_count(&self, agent_id: AgentId) -> Result<i64, StoreError>;

    // -- Customers ------------------------------------------------------

    /// Look up a customer by the client-supplied stable id, creating one
    /// lazily on first sight (spec §3).
    async fn get_or_create_customer(&self, external_id: &str) -> Result<Customer, StoreError>;

    /// Look up a customer by internal id, e.g. to embed a customer summary
    /// in an assignment notification (spec §4.4.1 step 6).
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn update_customer_profile(
        &self,
        id: CustomerId,
        profile: &crate::model::CustomerProfile,
    ) -> Result<(), StoreError>;

    // -- Conversations ----------------------------------------------------

    async fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, StoreError>;

    /// §4.3 `GetOrOpenFor`: race-free get-or-create of the customer's
    /// current non-CLOSED conversation.
    async fn get_or_open_for(&self, customer_id: CustomerId) -> Result<Conversation, StoreError>;

    /// §4.3 `Assign`: WAITING -> ACTIVE. Idempotent if already ACTIVE to
    /// the same agent; fails if ACTIVE elsewhere or CLOSED.
    async fn assign(&self, conversation_id: ConversationId, agent_id: AgentId) -> Result<(), StoreError>;

    /// §4.3 `Reassign`: ACTIVE -> ACTIVE with the agent id overwritten.
    /// Preconditions are checked by `LifecycleManager`, not here.
    async fn reassign(&self, conversation_id: ConversationId, new_agent_id: AgentId) -> Result<(), StoreError>;

    /// §4.3 `Close`: idempotent.
    async fn close(&self, conversation_id: ConversationId) -> Result<(), StoreError>;

    // -- Messages -----------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_kind: SenderKind,
        sender_id: i64,
        content_kind: ContentKind,
        body: &str,
        visible_to_customer: bool,
    ) -> Result<Message, StoreError>;

    async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>, StoreError>;

    /// Sets `last_customer_message_at = now` (spec §4.4.1 step 4).
    async fn touch_last_customer_message(&self, conversation_id: ConversationId) -> Result<(), StoreError>;

    /// Sets `last_agent_reply_at = now` (spec §4.4.2 step 3).
    async fn touch_last_agent_reply(&self, conversation_id: ConversationId) -> Result<(), StoreError>;

    /// §4.3 `MarkRead`: flips `read=true` on all messages whose sender is
    /// the opposite of `reader_kind`.
    async fn mark_read(&self, conversation_id: ConversationId, reader_kind: SenderKind) -> Result<(), StoreError>;

    /// §4.3 `MarkAllUnread`: used on transfer.
    async fn mark_all_unread(&self, conversation_id: ConversationId) -> Result<(), StoreError>;

    /// Unread AGENT messages in the customer's current conversation, used
    /// for the `offline_messages` frame on reconnect.
    async fn unread_agent_messages(&self, customer_id: CustomerId) -> Result<Vec<Message>, StoreError>;

    // -- Transfers ------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn append_transfer(
        &self,
        conversation_id: ConversationId,
        from_agent_id: AgentId,
        to_agent_id: AgentId,
        kind: TransferKind,
        operator_id: Option<AgentId>,
        reason: &str,
    ) -> Result<TransferRecord, StoreError>;

    async fn transfer_history(&self, conversation_id: ConversationId) -> Result<Vec<TransferRecord>, StoreError>;

    // -- Reconciler queries -----------------------------------------------

    /// §4.3 `TimeoutCandidates`.
    async fn timeout_candidates(&self, threshold_minutes: i64) -> Result<Vec<Conversation>, StoreError>;

    /// §4.3 `WaitingQueue`: WAITING conversations with null agent, creation
    /// order ascending.
    async fn waiting_queue(&self) -> Result<Vec<Conversation>, StoreError>;

    /// The first `limit` waiting conversations, oldest first (used by
    /// `tryDrainWaitingFor`, spec §4.4.7).
    async fn waiting_queue_head(&self, limit: i64) -> Result<Vec<Conversation>, StoreError>;

    /// Every ACTIVE conversation currently assigned to `agent_id` (used by
    /// the offline-transfer path, spec §4.4.8).
    async fn active_conversations_for_agent(&self, agent_id: AgentId) -> Result<Vec<Conversation>, StoreError>;

    /// Reverts a conversation to WAITING with the agent cleared (spec
    /// §4.4.8, when no replacement candidate exists).
    async fn revert_to_waiting(&self, conversation_id: ConversationId) -> Result<(), StoreError>;
}
