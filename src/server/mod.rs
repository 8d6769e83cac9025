//! HTTP surface of the daemon.
//!
//! - `POST /exercise-screens/hook` - push notifications from the hook
//!   source (enqueues a commit range)
//! - `GET /exercise-screens/exercise-file/{*path}` - read-only mirror files
//!   for the render tool
//! - `GET /exercise-screens` - liveness indicator
//!
//! Handlers only ever append to the job queue; repository and checkpoint
//! state belong to the worker.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub mod files;
pub mod hook;
pub mod signature;
pub mod status;

pub use files::exercise_file_handler;
pub use hook::hook_handler;
pub use signature::{compute_signature, format_signature_header, verify_signature};
pub use status::status_handler;

use crate::worker::JobSender;

/// Shared application state, passed to handlers via Axum's `State`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Producer half of the job queue.
    jobs: JobSender,

    /// Upstream repository URL accepted in hook payloads.
    upstream_url: String,

    /// Client addresses allowed to deliver hooks. Empty disables the check
    /// (rely on the signature instead).
    hook_allowlist: Vec<IpAddr>,

    /// Shared secret for payload signatures; `None` disables verification.
    webhook_secret: Option<Vec<u8>>,

    /// Mirror checkout directory for static serving.
    mirror_dir: PathBuf,
}

impl AppState {
    pub fn new(
        jobs: JobSender,
        upstream_url: impl Into<String>,
        hook_allowlist: Vec<IpAddr>,
        webhook_secret: Option<Vec<u8>>,
        mirror_dir: impl Into<PathBuf>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                jobs,
                upstream_url: upstream_url.into(),
                hook_allowlist,
                webhook_secret,
                mirror_dir: mirror_dir.into(),
            }),
        }
    }

    pub fn jobs(&self) -> &JobSender {
        &self.inner.jobs
    }

    pub fn upstream_url(&self) -> &str {
        &self.inner.upstream_url
    }

    /// Whether the client address may deliver hooks.
    pub fn origin_allowed(&self, ip: IpAddr) -> bool {
        self.inner.hook_allowlist.is_empty() || self.inner.hook_allowlist.contains(&ip)
    }

    pub fn webhook_secret(&self) -> Option<&[u8]> {
        self.inner.webhook_secret.as_deref()
    }

    pub fn mirror_dir(&self) -> &PathBuf {
        &self.inner.mirror_dir
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/exercise-screens", get(status_handler))
        .route("/exercise-screens/hook", post(hook_handler))
        .route(
            "/exercise-screens/exercise-file/{*path}",
            get(exercise_file_handler),
        )
        .with_state(app_state)
}
