// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire frame shapes for the streaming transport (spec §4.5). Inbound frames
//! decode as `{type, data?}`; outbound frames encode the same shape. Modeled
//! after `coopmux::transport::ws_mux`'s tagged-envelope frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound frame as received from either an agent or customer session.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// An outbound frame pushed through a session's channel. Carries an
/// already-serialized payload so `Registry`/`LifecycleManager` never need
/// to know the concrete JSON shape of every variant.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub kind: &'static str,
    pub payload: Value,
}

impl OutboundFrame {
    pub fn new(kind: &'static str, data: impl Serialize) -> Self {
        Self { kind, payload: serde_json::to_value(data).unwrap_or(Value::Null) }
    }

    pub fn plain(kind: &'static str) -> Self {
        Self { kind, payload: Value::Null }
    }

    pub fn message(kind: &'static str, message: impl Into<String>) -> Self {
        Self { kind, payload: Value::String(message.into()) }
    }

    /// Terminal frame pushed to a session being evicted by a fresher bind
    /// (spec §4.1 `BindAgent`, §4.5 "single-session-per-agent").
    pub fn kicked(message: impl Into<String>) -> Self {
        Self::message("kicked", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::message("error", message)
    }

    /// Renders the frame as the `{type, data?}` / `{type, message?}` wire
    /// envelope (spec §4.5).
    pub fn to_wire(&self) -> WireFrame {
        match &self.payload {
            Value::Null => WireFrame { kind: self.kind, data: None, message: None },
            Value::String(s) if self.kind == "kicked" || self.kind == "error" => {
                WireFrame { kind: self.kind, data: None, message: Some(s.clone()) }
            }
            other => WireFrame { kind: self.kind, data: Some(other.clone()), message: None },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WireFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Inbound frame type discriminators recognized by the gateway (spec §4.5
/// table). Unrecognized types are silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    Ping,
    Message,
    Typing,
    Read,
    CloseConversation,
    Status,
}

impl InboundKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ping" => Some(Self::Ping),
            "message" => Some(Self::Message),
            "typing" => Some(Self::Typing),
            "read" => Some(Self::Read),
            "close_conversation" => Some(Self::CloseConversation),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}
