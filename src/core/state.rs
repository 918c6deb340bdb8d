//! Runtime state for serve mode.
//!
//! Two independent pieces of state:
//! - `ReadinessGate`: deployment status, written only by the deployer and
//!   read lock-free by every request handler through a `GateView`.
//! - `SHUTDOWN`: Has shutdown been requested? (Ctrl+C received)

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use tiny_http::Server;

// =============================================================================
// Deployment status
// =============================================================================

/// Lifecycle of the deployed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatus {
    /// No deployment has run yet.
    Pending,
    /// The first deployment is in progress.
    Deploying,
    /// Content is deployed and may be served.
    Ready,
    /// The first deployment failed; nothing has been served.
    Failed(String),
}

impl DeployStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Failure reason, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ReadinessGate / GateView
// =============================================================================

/// Write side of the readiness cell.
///
/// Not `Clone`: whoever holds the gate is the only writer.
#[derive(Debug)]
pub struct ReadinessGate {
    cell: Arc<ArcSwap<DeployStatus>>,
}

/// Read-only handle on the readiness cell.
#[derive(Debug, Clone)]
pub struct GateView {
    cell: Arc<ArcSwap<DeployStatus>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(ArcSwap::from_pointee(DeployStatus::Pending)),
        }
    }

    pub fn view(&self) -> GateView {
        GateView {
            cell: Arc::clone(&self.cell),
        }
    }

    pub fn status(&self) -> DeployStatus {
        self.cell.load().as_ref().clone()
    }

    pub fn publish(&self, status: DeployStatus) {
        crate::debug!("deploy"; "state -> {}", status);
        self.cell.store(Arc::new(status));
    }

    /// Enter `Deploying` unless content is already being served.
    pub fn begin(&self) {
        if !self.status().is_ready() {
            self.publish(DeployStatus::Deploying);
        }
    }

    /// Record a failed run. A server that is already ready stays ready.
    pub fn fail(&self, reason: impl Into<String>) {
        if !self.status().is_ready() {
            self.publish(DeployStatus::Failed(reason.into()));
        }
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl GateView {
    /// Lock-free snapshot of the current status.
    pub fn status(&self) -> Arc<DeployStatus> {
        self.cell.load_full()
    }

    pub fn is_ready(&self) -> bool {
        self.cell.load().is_ready()
    }
}

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The handler behavior depends on whether a server has been registered:
/// - Before `register_server()`: exit immediately
/// - After `register_server()`: unblock the request loop
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
        } else {
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>) {
    let _ = SERVER.set(server);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

// =============================================================================
// Tests
// =============================================================================
