// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connection registry: who is online, over which session (spec §4.1).
//!
//! Shaped after `coopmux::state::MuxState` (a single `RwLock`-guarded map of
//! session id -> entry) and `coopmux::transport::ws::handle_ws`'s
//! single-bridge-per-session bookkeeping. The correctness bar from the spec
//! ("no concurrent `BindAgent` can produce two live session->principal
//! entries for the same agent") is met with one coarse `RwLock`, exactly as
//! the spec allows.

#[cfg(feature = "kv-mirror")]
pub mod kv;

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};

use crate::model::{AgentId, AgentStatus, CustomerId, Principal, PrincipalKind};
use crate::transport::frame::OutboundFrame;

/// Opaque handle identifying one live bidirectional transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(pub u64);

/// A session's outbound channel plus enough bookkeeping to probe transport
/// liveness without touching the actual socket.
#[derive(Clone)]
pub struct Session {
    pub handle: SessionHandle,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl Session {
    /// Best-effort push; failures are logged by the caller, never
    /// propagated across the transport boundary (spec §7).
    pub fn push(&self, frame: OutboundFrame) -> Result<(), OutboundFrame> {
        self.outbound.send(frame).map_err(|e| e.0)
    }

    /// A transport is considered established iff its receiving end (the
    /// per-connection write loop) hasn't dropped yet.
    pub fn is_established(&self) -> bool {
        !self.outbound.is_closed()
    }
}

struct RegistryInner {
    agent_sessions: HashMap<AgentId, Session>,
    customer_sessions: HashMap<CustomerId, Session>,
    by_session: HashMap<SessionHandle, Principal>,
    agent_status: HashMap<AgentId, AgentStatus>,
    /// Liveness marker: last heartbeat instant per agent. Absence means
    /// never bound / already evicted.
    agent_liveness: HashMap<AgentId, Instant>,
    /// Scaled-by-two integer score (load score is `active*1.0 + waiting*1.5`;
    /// doubling keeps every term integral so the ordering set stays `Ord`)
    /// keyed by agent id, plus the sorted `(score, agent_id)` index.
    load_scores: HashMap<AgentId, i64>,
    load_order: BTreeSet<(i64, AgentId)>,
}

impl RegistryInner {
    fn new() -> Self {
        Self {
            agent_sessions: HashMap::new(),
            customer_sessions: HashMap::new(),
            by_session: HashMap::new(),
            agent_status: HashMap::new(),
            agent_liveness: HashMap::new(),
            load_scores: HashMap::new(),
            load_order: BTreeSet::new(),
        }
    }

    fn remove_from_load_order(&mut self, agent_id: AgentId) {
        if let Some(score) = self.load_scores.remove(&agent_id) {
            self.load_order.remove(&(score, agent_id));
        }
    }

    fn insert_into_load_order(&mut self, agent_id: AgentId, score: i64) {
        self.remove_from_load_order(agent_id);
        self.load_scores.insert(agent_id, score);
        self.load_order.insert((score, agent_id));
    }
}

/// Authoritative in-memory connection registry. One instance is shared
/// across the whole dispatch core, passed in by reference rather than
/// accessed through a hidden singleton (spec §9).
pub struct Registry {
    inner: RwLock<RegistryInner>,
    heartbeat_ttl: Duration,
    next_session_id: AtomicU64,
    #[cfg(feature = "kv-mirror")]
    kv: Option<kv::KvMirror>,
}

/// Scale factor turning the spec's `f64` load score into an integral,
/// totally-ordered key.
const SCORE_SCALE: f64 = 2.0;

fn scale_score(score: f64) -> i64 {
    (score * SCORE_SCALE).round() as i64
}

fn unscale_score(scaled: i64) -> f64 {
    scaled as f64 / SCORE_SCALE
}

impl Registry {
    pub fn new(heartbeat_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::new()),
            heartbeat_ttl,
            next_session_id: AtomicU64::new(1),
            #[cfg(feature = "kv-mirror")]
            kv: None,
        }
    }

    #[cfg(feature = "kv-mirror")]
    pub fn with_kv_mirror(mut self, kv: kv::KvMirror) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Allocate a fresh session handle for a newly-accepted connection.
    pub fn new_session_handle(&self) -> SessionHandle {
        SessionHandle(self.next_session_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an outbound channel into a `Session` bound to a handle.
    pub fn new_session(
        &self,
        handle: SessionHandle,
        outbound: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Session {
        Session { handle, outbound }
    }

    /// §4.1 `BindAgent`.
    pub async fn bind_agent(&self, agent_id: AgentId, session: Session) {
        let mut inner = self.inner.write().await;

        if let Some(old) = inner.agent_sessions.get(&agent_id).cloned() {
            if old.is_established() {
                let _ = old.push(OutboundFrame::kicked(
                    "a new session for this agent has been established",
                ));
                tracing::info!(agent_id, "evicted prior established session on re-bind");
            } else {
                tracing::info!(agent_id, "overwriting dead prior session on re-bind");
            }
            inner.by_session.remove(&old.handle);
        }

        let handle = session.handle;
        inner.by_session.insert(handle, Principal { kind: PrincipalKind::Agent, id: agent_id });
        inner.agent_sessions.insert(agent_id, session);
        inner.agent_status.insert(agent_id, AgentStatus::Online);
        inner.agent_liveness.insert(agent_id, Instant::now());
        inner.insert_into_load_order(agent_id, 0);

        drop(inner);
        #[cfg(feature = "kv-mirror")]
        if let Some(kv) = &self.kv {
            kv.mirror_agent_online(agent_id, handle.0).await;
        }
    }

    /// §4.1 `BindCustomer`.
    pub async fn bind_customer(&self, customer_id: CustomerId, session: Session) {
        let mut inner = self.inner.write().await;
        if let Some(old) = inner.customer_sessions.get(&customer_id).cloned() {
            inner.by_session.remove(&old.handle);
        }
        let handle = session.handle;
        inner
            .by_session
            .insert(handle, Principal { kind: PrincipalKind::Customer, id: customer_id });
        inner.customer_sessions.insert(customer_id, session);
    }

    /// §4.1 `UnbindBySession`.
    pub async fn unbind_by_session(&self, session: SessionHandle) {
        let mut inner = self.inner.write().await;
        let Some(principal) = inner.by_session.remove(&session) else {
            return;
        };
        #[allow(unused_assignments, unused_mut, unused_variables)]
        let mut evicted_agent: Option<AgentId> = None;
        match principal.kind {
            PrincipalKind::Agent => {
                let agent_id = principal.id;
                if matches!(inner.agent_sessions.get(&agent_id), Some(s) if s.handle == session) {
                    inner.agent_sessions.remove(&agent_id);
                }
                inner.agent_status.insert(agent_id, AgentStatus::Offline);
                inner.agent_liveness.remove(&agent_id);
                inner.remove_from_load_order(agent_id);
                evicted_agent = Some(agent_id);
            }
            PrincipalKind::Customer => {
                let customer_id = principal.id;
                if matches!(inner.customer_sessions.get(&customer_id), Some(s) if s.handle == session)
                {
                    inner.customer_sessions.remove(&customer_id);
                }
            }
        }
        drop(inner);
        #[cfg(feature = "kv-mirror")]
        if let (Some(kv), Some(agent_id)) = (&self.kv, evicted_agent) {
            kv.mirror_agent_offline(agent_id).await;
        }
    }

    /// §4.1 `Heartbeat`. No-op if the agent is not bound.
    pub async fn heartbeat(&self, agent_id: AgentId) {
        let mut inner = self.inner.write().await;
        if inner.agent_sessions.contains_key(&agent_id) {
            inner.agent_liveness.insert(agent_id, Instant::now());
        }
    }

    pub async fn lookup_agent_session(&self, agent_id: AgentId) -> Option<Session> {
        self.inner.read().await.agent_sessions.get(&agent_id).cloned()
    }

    pub async fn lookup_customer_session(&self, customer_id: CustomerId) -> Option<Session> {
        self.inner.read().await.customer_sessions.get(&customer_id).cloned()
    }

    pub async fn lookup_by_session(&self, session: SessionHandle) -> Option<Principal> {
        self.inner.read().await.by_session.get(&session).cloned()
    }

    /// §4.1 `AgentStatus`. Unknown agents report `Offline`.
    pub async fn agent_status(&self, agent_id: AgentId) -> AgentStatus {
        self.inner.read().await.agent_status.get(&agent_id).copied().unwrap_or(AgentStatus::Offline)
    }

    /// §4.1 `SetStatus`.
    pub async fn set_status(&self, agent_id: AgentId, status: AgentStatus) {
        let mut inner = self.inner.write().await;
        let prev = inner.agent_status.insert(agent_id, status);
        if status != AgentStatus::Online {
            inner.remove_from_load_order(agent_id);
        } else if prev != Some(AgentStatus::Online) {
            inner.insert_into_load_order(agent_id, 0);
            inner.agent_liveness.insert(agent_id, Instant::now());
        }
    }

    /// §4.1 `IsAlive`: true iff a fresh liveness marker exists.
    pub async fn is_alive(&self, agent_id: AgentId) -> bool {
        let inner = self.inner.read().await;
        match inner.agent_liveness.get(&agent_id) {
            Some(last) => last.elapsed() < self.heartbeat_ttl,
            None => false,
        }
    }

    /// §4.1 `AgentsByLoad`: ascending snapshot, safe for concurrent readers.
    pub async fn agents_by_load(&self) -> Vec<(AgentId, f64)> {
        let inner = self.inner.read().await;
        inner.load_order.iter().map(|(score, id)| (*id, unscale_score(*score))).collect()
    }

    /// §4.1 `UpdateLoad`: upsert if present in the ordering, else no-op.
    pub async fn update_load(&self, agent_id: AgentId, score: f64) {
        let mut inner = self.inner.write().await;
        if inner.load_scores.contains_key(&agent_id) {
            inner.insert_into_load_order(agent_id, scale_score(score));
        }
    }

    /// Every agent currently marked `Online`, for the heartbeat sweep
    /// (spec §4.6.1) — independent of the load ordering so a just-evicted
    /// agent mid-transition is never double-counted.
    pub async fn online_agents(&self) -> Vec<AgentId> {
        let inner = self.inner.read().await;
        inner
            .agent_status
            .iter()
            .filter(|(_, status)| **status == AgentStatus::Online)
            .map(|(id, _)| *id)
            .collect()
    }
}
