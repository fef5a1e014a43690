// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent bearer-token verification (spec §4.5, §2 "Auth verifier"). Only
//! verification lives here; issuance is an out-of-scope admin-surface
//! concern (spec §1). Grounded on `frecar-beam`'s `jsonwebtoken` usage for
//! HMAC-signed bearer tokens.

use std::collections::HashSet;
use std::sync::RwLock;

use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::model::AgentId;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject: the agent id this token authenticates.
    agent_id: AgentId,
    exp: i64,
}

/// Directory of agent ids currently permitted to authenticate, independent
/// of token validity (an agent can be disabled without revoking every
/// outstanding token). Backed by the admin surface in a full deployment;
/// here it is a simple in-process allowlist refreshed from the store.
pub trait AgentDirectory: Send + Sync {
    fn is_allowed(&self, agent_id: AgentId) -> bool;
}

/// An `AgentDirectory` that allows every agent id; suitable when the store
/// itself is the source of truth for enabled/disabled and a second check
/// is unnecessary.
pub struct AllowAll;

impl AgentDirectory for AllowAll {
    fn is_allowed(&self, _agent_id: AgentId) -> bool {
        true
    }
}

/// An `AgentDirectory` backed by an explicit, mutable allowlist.
#[derive(Default)]
pub struct AllowlistDirectory {
    allowed: RwLock<HashSet<AgentId>>,
}

impl AllowlistDirectory {
    pub fn new(allowed: impl IntoIterator<Item = AgentId>) -> Self {
        Self { allowed: RwLock::new(allowed.into_iter().collect()) }
    }

    pub fn set(&self, agent_id: AgentId, allowed: bool) {
        let mut guard = self.allowed.write().unwrap_or_else(|e| e.into_inner());
        if allowed {
            guard.insert(agent_id);
        } else {
            guard.remove(&agent_id);
        }
    }
}

impl AgentDirectory for AllowlistDirectory {
    fn is_allowed(&self, agent_id: AgentId) -> bool {
        self.allowed.read().unwrap_or_else(|e| e.into_inner()).contains(&agent_id)
    }
}

/// Verifies an opaque bearer-token credential string, returning the agent
/// id it authenticates or rejecting it.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AgentId, VerifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed or unsigned token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("agent not allowed")]
    NotAllowed,
}

/// HMAC-SHA256-signed bearer tokens carrying `agent_id` plus an expiry
/// claim, checked against a shared signing secret and an `AgentDirectory`
/// allowlist (spec §4.5, §7 fatal-misconfiguration note).
pub struct HmacTokenVerifier<D> {
    decoding_key: DecodingKey,
    validation: Validation,
    directory: D,
}

impl<D: AgentDirectory> HmacTokenVerifier<D> {
    pub fn new(secret: &str, directory: D) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;
        Self { decoding_key: DecodingKey::from_secret(secret.as_bytes()), validation, directory }
    }
}

impl<D: AgentDirectory> TokenVerifier for HmacTokenVerifier<D> {
    fn verify(&self, token: &str) -> Result<AgentId, VerifyError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Malformed,
            })?;

        if !self.directory.is_allowed(data.claims.agent_id) {
            return Err(VerifyError::NotAllowed);
        }

        Ok(data.claims.agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(secret: &str, agent_id: AgentId, exp: i64) -> String {
        encode(&Header::new(jsonwebtoken::Algorithm::HS256), &Claims { agent_id, exp }, &EncodingKey::from_secret(secret.as_bytes()))
            .unwrap()
    }

    #[test]
    fn verifies_well_formed_token() {
        let token = sign("a-long-enough-secret", 7, (chrono::Utc::now().timestamp()) + 3600);
        let verifier = HmacTokenVerifier::new("a-long-enough-secret", AllowAll);
        assert_eq!(verifier.verify(&token), Ok(7));
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign("a-long-enough-secret", 7, chrono::Utc::now().timestamp() - 10);
        let verifier = HmacTokenVerifier::new("a-long-enough-secret", AllowAll);
        assert_eq!(verifier.verify(&token), Err(VerifyError::Expired));
    }

    #[test]
    fn rejects_tokens_signed_with_a_different_secret() {
        let token = sign("wrong-secret-value", 7, chrono::Utc::now().timestamp() + 3600);
        let verifier = HmacTokenVerifier::new("a-long-enough-secret", AllowAll);
        assert_eq!(verifier.verify(&token), Err(VerifyError::Malformed));
    }

    #[test]
    fn rejects_disallowed_agent() {
        let token = sign("a-long-enough-secret", 9, chrono::Utc::now().timestamp() + 3600);
        let verifier = HmacTokenVerifier::new("a-long-enough-secret", AllowlistDirectory::new([1, 2, 3]));
        assert_eq!(verifier.verify(&token), Err(VerifyError::NotAllowed));
    }
}
