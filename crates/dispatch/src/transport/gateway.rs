// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session gateway (spec §4.5): accepts streaming connections,
//! authenticates agents or admits customers, demultiplexes inbound frames
//! to `LifecycleManager`, and drives the per-connection outbound channel.
//! Shaped after `coopmux::transport::ws::handle_ws`'s split-socket,
//! `tokio::select!`-driven bridge loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::model::{AgentStatus, ContentKind, CustomerProfile, Principal, PrincipalKind};
use crate::state::AppState;

use super::frame::{InboundFrame, InboundKind, OutboundFrame};

/// Query parameters on the opening handshake (spec §6): `type` discriminates
/// agent vs. customer; `token`/`uuid` carry the credential; the remaining
/// fields populate a customer's `CustomerProfile` on first sight (spec
/// SPEC_FULL §D).
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: Option<String>,
    pub uuid: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub source_page: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
}

impl HandshakeQuery {
    fn profile(&self) -> CustomerProfile {
        CustomerProfile {
            address: self.address.clone(),
            user_agent: self.user_agent.clone(),
            locale: self.locale.clone(),
            source_page: self.source_page.clone(),
            device: self.device.clone(),
            os: self.os.clone(),
            browser: self.browser.clone(),
        }
    }
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HandshakeQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, query))
}

async fn send_and_close(mut socket: WebSocket, frame: OutboundFrame) {
    if let Ok(text) = serde_json::to_string(&frame.to_wire()) {
        let _ = socket.send(Message::Text(text.into())).await;
    }
    let _ = socket.close().await;
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>, query: HandshakeQuery) {
    match query.kind.as_str() {
        "agent" => handle_agent_connection(socket, state, query).await,
        "customer" => handle_customer_connection(socket, state, query).await,
        _ => send_and_close(socket, OutboundFrame::error("unknown connection type")).await,
    }
}

async fn handle_agent_connection(socket: WebSocket, state: Arc<AppState>, query: HandshakeQuery) {
    let Some(token) = query.token else {
        return send_and_close(socket, OutboundFrame::error("missing token")).await;
    };

    let agent_id = match state.verifier.verify(&token) {
        Ok(id) => id,
        Err(e) => return send_and_close(socket, OutboundFrame::error(e.to_string())).await,
    };

    let handle = state.registry.new_session_handle();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let session = state.registry.new_session(handle, tx);
    state.registry.bind_agent(agent_id, session.clone()).await;

    let _ = session.push(OutboundFrame::new("connected", json!({"agent_id": agent_id, "status": "online"})));

    if let Err(e) = state.lifecycle.try_drain_waiting_for(agent_id).await {
        tracing::warn!(agent_id, error = %e, "initial drain on agent connect failed");
    }

    run_session_loop(socket, &state, handle, rx, Principal { kind: PrincipalKind::Agent, id: agent_id }).await;

    state.registry.unbind_by_session(handle).await;
}

async fn handle_customer_connection(socket: WebSocket, state: Arc<AppState>, query: HandshakeQuery) {
    let Some(uuid) = query.uuid.clone() else {
        return send_and_close(socket, OutboundFrame::error("missing uuid")).await;
    };

    let customer = match state.store.get_or_create_customer(&uuid).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to resolve customer");
            return send_and_close(socket, OutboundFrame::error("internal error")).await;
        }
    };

    if let Err(e) = state.store.update_customer_profile(customer.id, &query.profile()).await {
        tracing::warn!(customer_id = customer.id, error = %e, "failed to update customer profile");
    }

    let handle = state.registry.new_session_handle();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let session = state.registry.new_session(handle, tx);
    state.registry.bind_customer(customer.id, session.clone()).await;

    let _ = session.push(OutboundFrame::new("connected", json!({"customer_id": customer.id})));

    match state.store.unread_agent_messages(customer.id).await {
        Ok(messages) if !messages.is_empty() => {
            let _ = session.push(OutboundFrame::new("offline_messages", json!({"messages": messages})));
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(customer_id = customer.id, error = %e, "failed to load offline messages"),
    }

    run_session_loop(socket, &state, handle, rx, Principal { kind: PrincipalKind::Customer, id: customer.id }).await;

    state.registry.unbind_by_session(handle).await;
}

#[derive(Debug, Deserialize, Default)]
struct MessagePayload {
    conversation_id: Option<i64>,
    content_kind: Option<ContentKind>,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize, Default)]
struct ConversationRefPayload {
    conversation_id: i64,
}

#[derive(Debug, Deserialize, Default)]
struct TypingPayload {
    conversation_id: i64,
    #[serde(default)]
    typing: bool,
}

#[derive(Debug, Deserialize, Default)]
struct StatusPayload {
    status: String,
}

/// Drives one connection's bidirectional frame loop until the transport
/// closes or the session is superseded by a `kicked` push (spec §4.1
/// `BindAgent` eviction).
async fn run_session_loop(
    socket: WebSocket,
    state: &Arc<AppState>,
    handle: crate::registry::SessionHandle,
    mut rx: tokio::sync::mpsc::UnboundedReceiver<OutboundFrame>,
    principal: Principal,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        let is_kicked = frame.kind == "kicked";
                        let Ok(text) = serde_json::to_string(&frame.to_wire()) else { continue };
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                        if is_kicked {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    None => break,
                }
            }

            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound_text(state, handle, &principal, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn handle_inbound_text(state: &Arc<AppState>, handle: crate::registry::SessionHandle, principal: &Principal, text: &str) {
    let Ok(frame) = serde_json::from_str::<InboundFrame>(text) else {
        tracing::debug!("dropping malformed inbound frame");
        return;
    };
    let Some(kind) = InboundKind::parse(&frame.kind) else {
        return;
    };

    match kind {
        InboundKind::Ping => {
            if principal.kind == PrincipalKind::Agent {
                state.registry.heartbeat(principal.id).await;
            }
            if let Some(session) = current_session(state, handle, principal).await {
                let _ = session.push(OutboundFrame::plain("pong"));
            }
        }
        InboundKind::Message => {
            let Ok(payload) = serde_json::from_value::<MessagePayload>(frame.data) else { return };
            let content_kind = payload.content_kind.unwrap_or(ContentKind::Text);
            let result = match principal.kind {
                PrincipalKind::Customer => {
                    state.lifecycle.handle_customer_message(principal.id, content_kind, &payload.body).await
                }
                PrincipalKind::Agent => {
                    let Some(conversation_id) = payload.conversation_id else { return };
                    state
                        .lifecycle
                        .handle_agent_message(principal.id, conversation_id, content_kind, &payload.body)
                        .await
                }
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "message handling failed");
            }
        }
        InboundKind::Typing => {
            let Ok(payload) = serde_json::from_value::<TypingPayload>(frame.data) else { return };
            if let Err(e) = state.lifecycle.handle_typing(principal.clone(), payload.conversation_id, payload.typing).await {
                tracing::warn!(error = %e, "typing handling failed");
            }
        }
        InboundKind::Read => {
            let Ok(payload) = serde_json::from_value::<ConversationRefPayload>(frame.data) else { return };
            if let Err(e) = state.lifecycle.handle_read(principal.clone(), payload.conversation_id).await {
                tracing::warn!(error = %e, "read handling failed");
            }
        }
        InboundKind::CloseConversation => {
            if principal.kind != PrincipalKind::Agent {
                return;
            }
            let Ok(payload) = serde_json::from_value::<ConversationRefPayload>(frame.data) else { return };
            if let Err(e) = state.lifecycle.close_conversation(principal.id, payload.conversation_id).await {
                tracing::warn!(error = %e, "close handling failed");
            }
        }
        InboundKind::Status => {
            if principal.kind != PrincipalKind::Agent {
                return;
            }
            let Ok(payload) = serde_json::from_value::<StatusPayload>(frame.data) else { return };
            let status = match payload.status.as_str() {
                "online" => AgentStatus::Online,
                "offline" => AgentStatus::Offline,
                "busy" => AgentStatus::Busy,
                _ => return,
            };
            state.registry.set_status(principal.id, status).await;
            if let Some(session) = current_session(state, handle, principal).await {
                let _ = session.push(OutboundFrame::new("status_changed", json!({"status": payload.status})));
            }
        }
    }
}

async fn current_session(state: &Arc<AppState>, handle: crate::registry::SessionHandle, principal: &Principal) -> Option<crate::registry::Session> {
    let session = match principal.kind {
        PrincipalKind::Agent => state.registry.lookup_agent_session(principal.id).await,
        PrincipalKind::Customer => state.registry.lookup_customer_session(principal.id).await,
    }?;
    if session.handle == handle {
        Some(session)
    } else {
        None
    }
}
