// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes surfaced across the dispatch core's external seams (HTTP
/// transfer/close invocation, auth verification). Mirrors
/// `coopmux::error::MuxError`'s shape: a closed code enum with an HTTP
/// status mapping and a JSON error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchError {
    Unauthorized,
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl DispatchError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse { error: self.to_error_body(message) }))
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Typed conflict reasons for `LifecycleManager::transfer` (spec §4.4.6,
/// §8 boundary behaviors 10/11). Returned as a `Result` to the caller —
/// per §7, only the HTTP admin path (out of scope) surfaces these; the
/// streaming path never invokes transfer directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("conversation not found")]
    ConversationNotFound,
    #[error("conversation is closed")]
    ConversationClosed,
    #[error("conversation has no current agent")]
    NoCurrentAgent,
    #[error("same agent")]
    SameAgent,
    #[error("target agent not found or disabled")]
    TargetUnavailable,
    #[error("target agent is not online")]
    TargetOffline,
    #[error("target full")]
    TargetFull,
}

/// Store-layer failures. Transient infrastructure errors (spec §7) are
/// logged by the caller and left for reconcilers to catch up on; they are
/// never retried synchronously inside a frame handler.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),
    #[error("conversation not found")]
    ConversationNotFound,
    #[error("conversation is closed")]
    ConversationClosed,
    #[error("conversation already active with a different agent")]
    AlreadyActiveElsewhere,
    #[error("background task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
