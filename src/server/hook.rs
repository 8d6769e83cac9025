//! Push-hook endpoint.
//!
//! Accepts push notifications from the hook source, authenticates them, and
//! enqueues the commit range for the worker. Rejections are synchronous: no
//! queue entry is created and nothing is retried.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::types::{CommitId, CommitRange, InvalidCommitId};

/// Header carrying the optional payload signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that reject a hook delivery.
#[derive(Debug, Error)]
pub enum HookError {
    /// The client address is not an allowed hook source.
    #[error("origin not allowed")]
    ForbiddenOrigin,

    /// Signature verification failed (or the header is missing while a
    /// secret is configured).
    #[error("invalid signature")]
    InvalidSignature,

    /// The body is not a valid push payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The payload's commit ids are malformed.
    #[error("invalid payload: {0}")]
    InvalidCommit(#[from] InvalidCommitId),

    /// The payload is for some other repository.
    #[error("repository not tracked here")]
    WrongRepository,

    /// The worker is gone; the job cannot be accepted.
    #[error("job queue closed")]
    QueueClosed,
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        let status = match &self {
            HookError::ForbiddenOrigin
            | HookError::InvalidSignature
            | HookError::WrongRepository => StatusCode::FORBIDDEN,
            HookError::InvalidPayload(_) | HookError::InvalidCommit(_) => StatusCode::BAD_REQUEST,
            HookError::QueueClosed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Push payload: the subset of the hook body this service consumes.
#[derive(Debug, Deserialize)]
pub struct HookPayload {
    pub repository: HookRepository,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Deserialize)]
pub struct HookRepository {
    pub url: String,
}

/// Hook handler.
///
/// Authentication happens before parsing: the peer address must be on the
/// configured allowlist, and when a shared secret is configured the raw body
/// must carry a valid HMAC signature. An accepted payload enqueues
/// `before..after` and returns 200 `ok`.
pub async fn hook_handler(
    State(app): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), HookError> {
    if !app.origin_allowed(addr.ip()) {
        warn!(addr = %addr, "Hook from unlisted origin");
        return Err(HookError::ForbiddenOrigin);
    }

    if let Some(secret) = app.webhook_secret() {
        let header = headers
            .get(HEADER_SIGNATURE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !super::verify_signature(&body, header, secret) {
            warn!(addr = %addr, "Hook signature rejected");
            return Err(HookError::InvalidSignature);
        }
    }

    let payload: HookPayload = serde_json::from_slice(&body)?;

    if payload.repository.url != app.upstream_url() {
        warn!(url = %payload.repository.url, "Hook for untracked repository");
        return Err(HookError::WrongRepository);
    }

    let range = CommitRange::new(
        CommitId::parse(payload.before)?,
        CommitId::parse(payload.after)?,
    );

    debug!(range = %range, "Hook accepted");
    if !app.jobs().enqueue(range) {
        return Err(HookError::QueueClosed);
    }

    info!(addr = %addr, "Enqueued push range");
    Ok((StatusCode::OK, "ok"))
}
