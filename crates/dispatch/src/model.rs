// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain types shared by the registry, store, and lifecycle layers.
//!
//! The legacy system encodes status, sender kind, content kind, and
//! transfer kind as bare integers. We keep sum types as the in-process
//! representation and give each one an explicit `i64` mapping at the
//! single serde/SQLite boundary (`store::sqlite`), per the spec's design
//! note on tagged variants.

use serde::{Deserialize, Serialize};

pub type AgentId = i64;
pub type CustomerId = i64;
pub type ConversationId = i64;
pub type MessageId = i64;
pub type TransferId = i64;

/// Default per-agent concurrent-conversation capacity when not configured.
pub const DEFAULT_AGENT_CAPACITY: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub capacity: i64,
    pub enabled: bool,
    pub admin: bool,
}

impl Agent {
    /// Admins and disabled agents are never assignment candidates.
    pub fn is_assignable(&self) -> bool {
        self.enabled && !self.admin
    }
}

/// Stable client-supplied identifier plus derived/declared profile fields.
/// Populated lazily on first connection, refreshed on reconnect, never
/// deleted by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub address: Option<String>,
    pub user_agent: Option<String>,
    pub locale: Option<String>,
    pub source_page: Option<String>,
    pub device: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub external_id: String,
    pub profile: CustomerProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Waiting,
    Active,
    Closed,
}

impl ConversationStatus {
    pub fn as_db_i64(self) -> i64 {
        match self {
            Self::Waiting => 0,
            Self::Active => 1,
            Self::Closed => 2,
        }
    }

    pub fn from_db_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Waiting),
            1 => Some(Self::Active),
            2 => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub customer_id: CustomerId,
    pub agent_id: Option<AgentId>,
    pub status: ConversationStatus,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_agent_reply_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_customer_message_at: Option<chrono::DateTime<chrono::Utc>>,
    pub closed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Conversation {
    pub fn is_closed(&self) -> bool {
        self.status == ConversationStatus::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Customer,
    Agent,
    System,
}

impl SenderKind {
    pub fn as_db_i64(self) -> i64 {
        match self {
            Self::Customer => 0,
            Self::Agent => 1,
            Self::System => 2,
        }
    }

    pub fn from_db_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Customer),
            1 => Some(Self::Agent),
            2 => Some(Self::System),
            _ => None,
        }
    }

    /// The kind whose unread messages are flipped when `self` marks read.
    pub fn opposite(self) -> Self {
        match self {
            Self::Customer => Self::Agent,
            Self::Agent => Self::Customer,
            Self::System => Self::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Image,
}

impl ContentKind {
    pub fn as_db_i64(self) -> i64 {
        match self {
            Self::Text => 0,
            Self::Image => 1,
        }
    }

    pub fn from_db_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Text),
            1 => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_kind: SenderKind,
    pub sender_id: i64,
    pub content_kind: ContentKind,
    pub body: String,
    pub read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Supplemented per spec §9: replaces the legacy substring-on-"transfer"
    /// heuristic for hiding SYSTEM messages from customer-facing views.
    pub visible_to_customer: bool,
}

/// First-class transfer kinds. The spec notes the legacy system reused
/// value `3` for an undeclared third kind; here AUTO_AGENT_OFFLINE is a
/// named variant from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Manual,
    AutoTimeout,
    AutoAgentOffline,
}

impl TransferKind {
    pub fn as_db_i64(self) -> i64 {
        match self {
            Self::Manual => 1,
            Self::AutoTimeout => 2,
            Self::AutoAgentOffline => 3,
        }
    }

    pub fn from_db_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(Self::Manual),
            2 => Some(Self::AutoTimeout),
            3 => Some(Self::AutoAgentOffline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutoTimeout => "auto_timeout",
            Self::AutoAgentOffline => "auto_agent_offline",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub conversation_id: ConversationId,
    pub from_agent_id: AgentId,
    pub to_agent_id: AgentId,
    pub kind: TransferKind,
    pub operator_id: Option<AgentId>,
    pub reason: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Registry-side liveness/online status for an agent. Unknown agents are
/// treated as `Offline` (spec §4.1 `AgentStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Busy,
}

/// Identifies the kind of principal bound to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    Agent,
    Customer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub id: i64,
}
