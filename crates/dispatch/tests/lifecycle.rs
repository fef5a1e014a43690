// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for conversation lifecycle and transfer, wiring a real
//! `Registry` to a real (in-memory) `SqliteConversationStore` through
//! `LifecycleManager` exactly as `AppState::new` does.

use std::sync::Arc;
use std::time::Duration;

use im_dispatch::assignment::AssignmentEngine;
use im_dispatch::error::TransferError;
use im_dispatch::lifecycle::LifecycleManager;
use im_dispatch::model::{Agent, AgentId, AgentStatus, ContentKind, ConversationStatus, TransferKind};
use im_dispatch::registry::Registry;
use im_dispatch::store::sqlite::SqliteConversationStore;
use im_dispatch::store::ConversationStore;

async fn harness() -> (Arc<Registry>, Arc<SqliteConversationStore>, LifecycleManager) {
    let store = Arc::new(SqliteConversationStore::open_in_memory().await.expect("open in-memory store"));
    let registry = Arc::new(Registry::new(Duration::from_secs(60)));
    let lifecycle = LifecycleManager::new(Arc::clone(&registry), Arc::clone(&store) as Arc<dyn ConversationStore>);
    (registry, store, lifecycle)
}

async fn online_agent(registry: &Registry, store: &SqliteConversationStore, id: AgentId, capacity: i64) {
    store
        .upsert_agent(&Agent { id, display_name: format!("agent-{id}"), capacity, enabled: true, admin: false })
        .await
        .expect("upsert agent");
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = registry.new_session_handle();
    let session = registry.new_session(handle, tx);
    registry.bind_agent(id, session).await;
    registry.set_status(id, AgentStatus::Online).await;
}

#[tokio::test]
async fn customer_message_with_no_agents_online_queues_the_conversation() {
    let (_registry, store, lifecycle) = harness().await;
    let customer = store.get_or_create_customer("c-no-agents").await.expect("customer");

    lifecycle.handle_customer_message(customer.id, ContentKind::Text, "hello?").await.expect("handle message");

    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    assert_eq!(conv.status, ConversationStatus::Waiting);
    assert!(conv.agent_id.is_none());
}

#[tokio::test]
async fn customer_message_assigns_the_least_loaded_online_agent() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;
    online_agent(&registry, &store, 2, 5).await;

    // Give agent 1 an existing active conversation so its load is higher.
    let busy_customer = store.get_or_create_customer("c-busy").await.expect("customer");
    let busy_conv = store.get_or_open_for(busy_customer.id).await.expect("conversation");
    store.assign(busy_conv.id, 1).await.expect("assign");
    registry.update_load(1, 1.0).await;

    let customer = store.get_or_create_customer("c-new").await.expect("customer");
    lifecycle.handle_customer_message(customer.id, ContentKind::Text, "hi").await.expect("handle message");

    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    assert_eq!(conv.agent_id, Some(2));
    assert_eq!(conv.status, ConversationStatus::Active);
}

#[tokio::test]
async fn agent_message_is_dropped_when_the_agent_does_not_own_the_conversation() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;
    online_agent(&registry, &store, 2, 5).await;

    let customer = store.get_or_create_customer("c-owned").await.expect("customer");
    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    store.assign(conv.id, 1).await.expect("assign");

    lifecycle.handle_agent_message(2, conv.id, ContentKind::Text, "not yours").await.expect("handle message");

    let messages = store.messages(conv.id).await.expect("messages");
    assert!(messages.is_empty(), "message from a non-owning agent must not be persisted");
}

#[tokio::test]
async fn transfer_to_an_agent_at_capacity_is_rejected() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;
    online_agent(&registry, &store, 2, 1).await;

    let filler_customer = store.get_or_create_customer("c-filler").await.expect("customer");
    let filler_conv = store.get_or_open_for(filler_customer.id).await.expect("conversation");
    store.assign(filler_conv.id, 2).await.expect("assign");

    let customer = store.get_or_create_customer("c-transfer-full").await.expect("customer");
    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    store.assign(conv.id, 1).await.expect("assign");

    let result = lifecycle.transfer(conv.id, 2, TransferKind::Manual, Some(1), "rebalance").await;
    assert_eq!(result, Err(TransferError::TargetFull));
}

#[tokio::test]
async fn transfer_to_the_same_agent_is_rejected() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;

    let customer = store.get_or_create_customer("c-same").await.expect("customer");
    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    store.assign(conv.id, 1).await.expect("assign");

    let result = lifecycle.transfer(conv.id, 1, TransferKind::Manual, Some(1), "oops").await;
    assert_eq!(result, Err(TransferError::SameAgent));
}

#[tokio::test]
async fn transfer_leaves_a_hidden_system_message_and_marks_history_unread() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;
    online_agent(&registry, &store, 2, 5).await;

    let customer = store.get_or_create_customer("c-sys-msg").await.expect("customer");
    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    store.assign(conv.id, 1).await.expect("assign");
    store
        .append_message(conv.id, im_dispatch::model::SenderKind::Customer, customer.id, ContentKind::Text, "hi", true)
        .await
        .expect("append message");

    lifecycle.transfer(conv.id, 2, TransferKind::Manual, Some(1), "handing off").await.expect("transfer");

    let messages = store.messages(conv.id).await.expect("messages");
    let system_message = messages
        .iter()
        .find(|m| m.sender_kind == im_dispatch::model::SenderKind::System)
        .expect("transfer appends a system message");
    assert!(!system_message.visible_to_customer);

    let customer_message = messages.iter().find(|m| m.sender_kind == im_dispatch::model::SenderKind::Customer).expect("customer message");
    assert!(!customer_message.read, "transfer marks the whole history unread for the new agent");
}

#[tokio::test]
async fn close_conversation_drains_the_waiting_queue_to_the_freed_agent() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 1).await;

    let active_customer = store.get_or_create_customer("c-active").await.expect("customer");
    let active_conv = store.get_or_open_for(active_customer.id).await.expect("conversation");
    store.assign(active_conv.id, 1).await.expect("assign");

    let waiting_customer = store.get_or_create_customer("c-waiting").await.expect("customer");
    let waiting_conv = store.get_or_open_for(waiting_customer.id).await.expect("conversation");
    assert_eq!(waiting_conv.status, ConversationStatus::Waiting);

    lifecycle.close_conversation(1, active_conv.id).await.expect("close");

    let waiting_conv = store.get_conversation(waiting_conv.id).await.expect("conversation").expect("exists");
    assert_eq!(waiting_conv.status, ConversationStatus::Active);
    assert_eq!(waiting_conv.agent_id, Some(1));
}

#[tokio::test]
async fn agent_offline_transfers_active_conversations_to_another_online_agent() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;
    online_agent(&registry, &store, 2, 5).await;

    let customer = store.get_or_create_customer("c-offline-transfer").await.expect("customer");
    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    store.assign(conv.id, 1).await.expect("assign");

    let outcome = lifecycle.handle_agent_offline(1).await.expect("handoff");
    assert_eq!(outcome.transferred, 1);
    assert_eq!(outcome.reverted, 0);

    let conv = store.get_conversation(conv.id).await.expect("conversation").expect("exists");
    assert_eq!(conv.agent_id, Some(2));
}

#[tokio::test]
async fn agent_offline_reverts_to_waiting_when_no_other_agent_is_available() {
    let (registry, store, lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;

    let customer = store.get_or_create_customer("c-offline-revert").await.expect("customer");
    let conv = store.get_or_open_for(customer.id).await.expect("conversation");
    store.assign(conv.id, 1).await.expect("assign");

    let outcome = lifecycle.handle_agent_offline(1).await.expect("handoff");
    assert_eq!(outcome.transferred, 0);
    assert_eq!(outcome.reverted, 1);

    let conv = store.get_conversation(conv.id).await.expect("conversation").expect("exists");
    assert_eq!(conv.status, ConversationStatus::Waiting);
    assert!(conv.agent_id.is_none());
}

#[tokio::test]
async fn assignment_engine_returns_none_once_the_only_agent_goes_offline() {
    let (registry, store, _lifecycle) = harness().await;
    online_agent(&registry, &store, 1, 5).await;
    registry.set_status(1, AgentStatus::Offline).await;

    let engine = AssignmentEngine::new(&registry, store.as_ref());
    assert_eq!(engine.pick(&std::collections::HashSet::new()).await, None);
}
