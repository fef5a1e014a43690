// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed `ConversationStore`. `rusqlite::Connection` is synchronous,
//! so every call is bridged onto a blocking thread via
//! `tokio::task::spawn_blocking`, guarded by a `tokio::sync::Mutex` to
//! serialize writes against SQLite's single-writer model. Mirrors
//! `block-builderbot`'s rusqlite wrapper for the same reason: the driver
//! itself has no async story.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::model::{
    Agent, AgentId, ContentKind, Conversation, ConversationId, ConversationStatus, Customer,
    CustomerId, CustomerProfile, Message, SenderKind, TransferId, TransferKind, TransferRecord,
};

use super::ConversationStore;

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial_schema.sql"))])
}

fn parse_dt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn fmt_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_agent(row: &Row) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        display_name: row.get(1)?,
        capacity: row.get(2)?,
        enabled: row.get::<_, i64>(3)? != 0,
        admin: row.get::<_, i64>(4)? != 0,
    })
}

fn row_to_customer(row: &Row) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        external_id: row.get(1)?,
        profile: CustomerProfile {
            address: row.get(2)?,
            user_agent: row.get(3)?,
            locale: row.get(4)?,
            source_page: row.get(5)?,
            device: row.get(6)?,
            os: row.get(7)?,
            browser: row.get(8)?,
        },
    })
}

fn row_to_conversation(row: &Row) -> rusqlite::Result<Conversation> {
    let status_raw: i64 = row.get(3)?;
    Ok(Conversation {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        agent_id: row.get(2)?,
        status: ConversationStatus::from_db_i64(status_raw).unwrap_or(ConversationStatus::Closed),
        last_message_at: parse_dt(row.get(4)?),
        last_agent_reply_at: parse_dt(row.get(5)?),
        last_customer_message_at: parse_dt(row.get(6)?),
        closed_at: parse_dt(row.get(7)?),
    })
}

const CONVERSATION_COLUMNS: &str = "id, customer_id, agent_id, status, last_message_at, last_agent_reply_at, last_customer_message_at, closed_at";

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let sender_kind_raw: i64 = row.get(2)?;
    let content_kind_raw: i64 = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_kind: SenderKind::from_db_i64(sender_kind_raw).unwrap_or(SenderKind::System),
        sender_id: row.get(3)?,
        content_kind: ContentKind::from_db_i64(content_kind_raw).unwrap_or(ContentKind::Text),
        body: row.get(5)?,
        read: row.get::<_, i64>(6)? != 0,
        created_at: parse_dt(Some(created_at)).unwrap_or_else(Utc::now),
        visible_to_customer: row.get::<_, i64>(8)? != 0,
    })
}

fn row_to_transfer(row: &Row) -> rusqlite::Result<TransferRecord> {
    let kind_raw: i64 = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(TransferRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        from_agent_id: row.get(2)?,
        to_agent_id: row.get(3)?,
        kind: TransferKind::from_db_i64(kind_raw).unwrap_or(TransferKind::Manual),
        operator_id: row.get(5)?,
        reason: row.get(6)?,
        created_at: parse_dt(Some(created_at)).unwrap_or_else(Utc::now),
    })
}

#[derive(Clone)]
pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let path = path.to_owned();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let mut conn = Connection::open(path)?;
            conn.pragma_update(None, "foreign_keys", true)?;
            migrations().to_latest(&mut conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let mut conn = Connection::open_in_memory()?;
            conn.pragma_update(None, "foreign_keys", true)?;
            migrations().to_latest(&mut conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Runs `f` against the held connection on a blocking thread.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, display_name, capacity, enabled, admin FROM agent WHERE id = ?1",
                    [id],
                    row_to_agent,
                )
                .optional()?)
        })
        .await
    }

    async fn upsert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        let agent = agent.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO agent (id, display_name, capacity, enabled, admin) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name,
                     capacity = excluded.capacity, enabled = excluded.enabled, admin = excluded.admin",
                rusqlite::params![
                    agent.id,
                    agent.display_name,
                    agent.capacity,
                    agent.enabled as i64,
                    agent.admin as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn active_conversation_count(&self, agent_id: AgentId) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM conversation WHERE agent_id = ?1 AND status != ?2",
                rusqlite::params![agent_id, ConversationStatus::Closed.as_db_i64()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    async fn get_or_create_customer(&self, external_id: &str) -> Result<Customer, StoreError> {
        let external_id = external_id.to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO customer (external_id) VALUES (?1) ON CONFLICT(external_id) DO NOTHING",
                [&external_id],
            )?;
            Ok(conn.query_row(
                "SELECT id, external_id, address, user_agent, locale, source_page, device, os, browser
                 FROM customer WHERE external_id = ?1",
                [&external_id],
                row_to_customer,
            )?)
        })
        .await
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, external_id, address, user_agent, locale, source_page, device, os, browser
                     FROM customer WHERE id = ?1",
                    [id],
                    row_to_customer,
                )
                .optional()?)
        })
        .await
    }

    async fn update_customer_profile(
        &self,
        id: CustomerId,
        profile: &CustomerProfile,
    ) -> Result<(), StoreError> {
        let profile = profile.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE customer SET address = ?2, user_agent = ?3, locale = ?4, source_page = ?5,
                     device = ?6, os = ?7, browser = ?8 WHERE id = ?1",
                rusqlite::params![
                    id,
                    profile.address,
                    profile.user_agent,
                    profile.locale,
                    profile.source_page,
                    profile.device,
                    profile.os,
                    profile.browser,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE id = ?1"),
                    [id],
                    row_to_conversation,
                )
                .optional()?)
        })
        .await
    }

    async fn get_or_open_for(&self, customer_id: CustomerId) -> Result<Conversation, StoreError> {
        self.with_conn(move |conn| {
            let existing = conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE customer_id = ?1 AND status != ?2"
                    ),
                    rusqlite::params![customer_id, ConversationStatus::Closed.as_db_i64()],
                    row_to_conversation,
                )
                .optional()?;
            if let Some(conv) = existing {
                return Ok(conv);
            }
            let now = fmt_dt(Utc::now());
            conn.execute(
                "INSERT INTO conversation (customer_id, agent_id, status, created_at) VALUES (?1, NULL, ?2, ?3)",
                rusqlite::params![customer_id, ConversationStatus::Waiting.as_db_i64(), now],
            )?;
            let id = conn.last_insert_rowid();
            Ok(conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE id = ?1"),
                [id],
                row_to_conversation,
            )?)
        })
        .await
    }

    async fn assign(&self, conversation_id: ConversationId, agent_id: AgentId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let conv = conn
                .query_row(
                    &format!("SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE id = ?1"),
                    [conversation_id],
                    row_to_conversation,
                )
                .optional()?
                .ok_or(StoreError::ConversationNotFound)?;

            match conv.status {
                ConversationStatus::Closed => return Err(StoreError::ConversationClosed),
                ConversationStatus::Active => {
                    if conv.agent_id == Some(agent_id) {
                        return Ok(());
                    }
                    return Err(StoreError::AlreadyActiveElsewhere);
                }
                ConversationStatus::Waiting => {}
            }

            conn.execute(
                "UPDATE conversation SET agent_id = ?2, status = ?3 WHERE id = ?1",
                rusqlite::params![conversation_id, agent_id, ConversationStatus::Active.as_db_i64()],
            )?;
            Ok(())
        })
        .await
    }

    async fn reassign(&self, conversation_id: ConversationId, new_agent_id: AgentId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE conversation SET agent_id = ?2 WHERE id = ?1 AND status != ?3",
                rusqlite::params![conversation_id, new_agent_id, ConversationStatus::Closed.as_db_i64()],
            )?;
            if updated == 0 {
                return Err(StoreError::ConversationClosed);
            }
            Ok(())
        })
        .await
    }

    async fn close(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let now = fmt_dt(Utc::now());
            conn.execute(
                "UPDATE conversation SET status = ?2, closed_at = ?3 WHERE id = ?1 AND status != ?2",
                rusqlite::params![conversation_id, ConversationStatus::Closed.as_db_i64(), now],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_kind: SenderKind,
        sender_id: i64,
        content_kind: ContentKind,
        body: &str,
        visible_to_customer: bool,
    ) -> Result<Message, StoreError> {
        let body = body.to_owned();
        self.with_conn(move |conn| {
            let now = fmt_dt(Utc::now());
            conn.execute(
                "INSERT INTO message (conversation_id, sender_kind, sender_id, content_kind, body, read, visible_to_customer, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
                rusqlite::params![
                    conversation_id,
                    sender_kind.as_db_i64(),
                    sender_id,
                    content_kind.as_db_i64(),
                    body,
                    visible_to_customer as i64,
                    now,
                ],
            )?;
            let id = conn.last_insert_rowid();
            conn.execute(
                "UPDATE conversation SET last_message_at = ?2 WHERE id = ?1",
                rusqlite::params![conversation_id, now],
            )?;
            Ok(conn.query_row(
                "SELECT id, conversation_id, sender_kind, sender_id, content_kind, body, read, created_at, visible_to_customer
                 FROM message WHERE id = ?1",
                [id],
                row_to_message,
            )?)
        })
        .await
    }

    async fn messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_kind, sender_id, content_kind, body, read, created_at, visible_to_customer
                 FROM message WHERE conversation_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([conversation_id], row_to_message)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn touch_last_customer_message(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let now = fmt_dt(Utc::now());
            conn.execute(
                "UPDATE conversation SET last_customer_message_at = ?2 WHERE id = ?1",
                rusqlite::params![conversation_id, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn touch_last_agent_reply(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let now = fmt_dt(Utc::now());
            conn.execute(
                "UPDATE conversation SET last_agent_reply_at = ?2 WHERE id = ?1",
                rusqlite::params![conversation_id, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_read(&self, conversation_id: ConversationId, reader_kind: SenderKind) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE message SET read = 1 WHERE conversation_id = ?1 AND sender_kind = ?2",
                rusqlite::params![conversation_id, reader_kind.opposite().as_db_i64()],
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_all_unread(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE message SET read = 0 WHERE conversation_id = ?1",
                [conversation_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn unread_agent_messages(&self, customer_id: CustomerId) -> Result<Vec<Message>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_kind, m.sender_id, m.content_kind, m.body, m.read, m.created_at, m.visible_to_customer
                 FROM message m JOIN conversation c ON c.id = m.conversation_id
                 WHERE c.customer_id = ?1 AND c.status != ?2 AND m.sender_kind = ?3 AND m.read = 0
                 ORDER BY m.id ASC",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![customer_id, ConversationStatus::Closed.as_db_i64(), SenderKind::Agent.as_db_i64()],
                row_to_message,
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn append_transfer(
        &self,
        conversation_id: ConversationId,
        from_agent_id: AgentId,
        to_agent_id: AgentId,
        kind: TransferKind,
        operator_id: Option<AgentId>,
        reason: &str,
    ) -> Result<TransferRecord, StoreError> {
        let reason = reason.to_owned();
        self.with_conn(move |conn| {
            let now = fmt_dt(Utc::now());
            conn.execute(
                "INSERT INTO conversation_transfer (conversation_id, from_agent_id, to_agent_id, kind, operator_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![conversation_id, from_agent_id, to_agent_id, kind.as_db_i64(), operator_id, reason, now],
            )?;
            let id: TransferId = conn.last_insert_rowid();
            Ok(conn.query_row(
                "SELECT id, conversation_id, from_agent_id, to_agent_id, kind, operator_id, reason, created_at
                 FROM conversation_transfer WHERE id = ?1",
                [id],
                row_to_transfer,
            )?)
        })
        .await
    }

    async fn transfer_history(&self, conversation_id: ConversationId) -> Result<Vec<TransferRecord>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, from_agent_id, to_agent_id, kind, operator_id, reason, created_at
                 FROM conversation_transfer WHERE conversation_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([conversation_id], row_to_transfer)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn timeout_candidates(&self, threshold_minutes: i64) -> Result<Vec<Conversation>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversation
                 WHERE status = ?1 AND last_customer_message_at IS NOT NULL
                 AND (last_agent_reply_at IS NULL OR last_agent_reply_at < last_customer_message_at)
                 AND datetime(last_customer_message_at) <= datetime('now', ?2)"
            ))?;
            let threshold = format!("-{threshold_minutes} minutes");
            let rows = stmt.query_map(
                rusqlite::params![ConversationStatus::Active.as_db_i64(), threshold],
                row_to_conversation,
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn waiting_queue(&self) -> Result<Vec<Conversation>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE status = ?1 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map([ConversationStatus::Waiting.as_db_i64()], row_to_conversation)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn waiting_queue_head(&self, limit: i64) -> Result<Vec<Conversation>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE status = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![ConversationStatus::Waiting.as_db_i64(), limit],
                row_to_conversation,
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn active_conversations_for_agent(&self, agent_id: AgentId) -> Result<Vec<Conversation>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversation WHERE agent_id = ?1 AND status = ?2 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![agent_id, ConversationStatus::Active.as_db_i64()],
                row_to_conversation,
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn revert_to_waiting(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE conversation SET agent_id = NULL, status = ?2 WHERE id = ?1 AND status != ?3",
                rusqlite::params![
                    conversation_id,
                    ConversationStatus::Waiting.as_db_i64(),
                    ConversationStatus::Closed.as_db_i64(),
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Agent;

    #[tokio::test]
    async fn open_or_create_customer_is_idempotent() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let a = store.get_or_create_customer("ext-1").await.unwrap();
        let b = store.get_or_create_customer("ext-1").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn get_or_open_for_reuses_non_closed_conversation() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let customer = store.get_or_create_customer("ext-2").await.unwrap();
        let c1 = store.get_or_open_for(customer.id).await.unwrap();
        let c2 = store.get_or_open_for(customer.id).await.unwrap();
        assert_eq!(c1.id, c2.id);
        assert_eq!(c1.status, ConversationStatus::Waiting);
    }

    #[tokio::test]
    async fn assign_then_get_or_open_for_new_conversation_after_close() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        store
            .upsert_agent(&Agent { id: 1, display_name: "a".into(), capacity: 5, enabled: true, admin: false })
            .await
            .unwrap();
        let customer = store.get_or_create_customer("ext-3").await.unwrap();
        let conv = store.get_or_open_for(customer.id).await.unwrap();
        store.assign(conv.id, 1).await.unwrap();
        store.close(conv.id).await.unwrap();

        let conv2 = store.get_or_open_for(customer.id).await.unwrap();
        assert_ne!(conv.id, conv2.id);
        assert_eq!(conv2.status, ConversationStatus::Waiting);
    }

    #[tokio::test]
    async fn assign_to_different_agent_while_active_conflicts() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        store
            .upsert_agent(&Agent { id: 1, display_name: "a".into(), capacity: 5, enabled: true, admin: false })
            .await
            .unwrap();
        store
            .upsert_agent(&Agent { id: 2, display_name: "b".into(), capacity: 5, enabled: true, admin: false })
            .await
            .unwrap();
        let customer = store.get_or_create_customer("ext-4").await.unwrap();
        let conv = store.get_or_open_for(customer.id).await.unwrap();
        store.assign(conv.id, 1).await.unwrap();
        let err = store.assign(conv.id, 2).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyActiveElsewhere));
    }

    #[tokio::test]
    async fn append_message_updates_last_message_at() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let customer = store.get_or_create_customer("ext-5").await.unwrap();
        let conv = store.get_or_open_for(customer.id).await.unwrap();
        assert!(conv.last_message_at.is_none());
        store
            .append_message(conv.id, SenderKind::Customer, customer.id, ContentKind::Text, "hi", true)
            .await
            .unwrap();
        let conv = store.get_conversation(conv.id).await.unwrap().unwrap();
        assert!(conv.last_message_at.is_some());
    }

    #[tokio::test]
    async fn mark_read_flips_only_opposite_sender() {
        let store = SqliteConversationStore::open_in_memory().await.unwrap();
        let customer = store.get_or_create_customer("ext-6").await.unwrap();
        let conv = store.get_or_open_for(customer.id).await.unwrap();
        store
            .append_message(conv.id, SenderKind::Customer, customer.id, ContentKind::Text, "hi", true)
            .await
            .unwrap();
        store
            .append_message(conv.id, SenderKind::Agent, 1, ContentKind::Text, "hello", true)
            .await
            .unwrap();
        store.mark_read(conv.id, SenderKind::Customer).await.unwrap();
        let messages = store.messages(conv.id).await.unwrap();
        let customer_msg = messages.iter().find(|m| m.sender_kind == SenderKind::Customer).unwrap();
        let agent_msg = messages.iter().find(|m| m.sender_kind == SenderKind::Agent).unwrap();
        assert!(agent_msg.read);
        assert!(!customer_msg.read);
    }
}
