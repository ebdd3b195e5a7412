//! The fatal error sink.
//!
//! A worker's initialization handshake runs inside an asynchronous
//! context with no caller to report to. A failure there must still become
//! visible, so the bootstrap is injected with a [`FatalErrorSink`] and
//! makes a single `report` call per failure. The host decides how that
//! report escapes; [`ErrorChannel`] surfaces it on two independent paths
//! so it is observed even if one path is ignored.

use tokio::sync::mpsc;
use tracing::{error, warn};

use wasmpool_common::{InitError, WorkerId};

/// Where a worker's fatal initialization error is reported.
///
/// Exactly one `report` call is made per failed handshake. The error is
/// never delivered back to the loader or to any pool-wide structure; if
/// the host wants "k of N workers failed" bookkeeping, it builds that on
/// top of its sink.
pub trait FatalErrorSink: Send + Sync {
    /// Surface a fatal initialization error for `worker`.
    fn report(&self, worker: WorkerId, error: &InitError);
}

/// A fatal worker error as delivered on the host's top-level channel.
#[derive(Debug, Clone)]
pub struct FatalWorkerError {
    /// The worker that failed to initialize.
    pub worker: WorkerId,

    /// The handshake error.
    pub error: InitError,
}

/// The host's top-level error channel.
///
/// `report` escapes the error twice: synchronously as a structured error
/// log, and scheduled onto the channel for whoever holds the receiver.
/// Both paths carry the same error; the redundancy is deliberate, so a
/// host that drops one path still observes the failure on the other.
pub struct ErrorChannel {
    tx: mpsc::UnboundedSender<FatalWorkerError>,
}

impl ErrorChannel {
    /// Create the channel, returning the sink and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FatalWorkerError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FatalErrorSink for ErrorChannel {
    fn report(&self, worker: WorkerId, error: &InitError) {
        // Synchronous escape
        error!(worker = %worker, %error, "Worker initialization failed");

        // Scheduled escape onto the top-level channel
        let delivered = self
            .tx
            .send(FatalWorkerError {
                worker,
                error: error.clone(),
            })
            .is_ok();

        if !delivered {
            warn!(worker = %worker, "Error channel receiver dropped; fatal error only logged");
        }
    }
}

/// A sink for hosts without an error channel: log-only.
pub struct LoggingSink;

impl FatalErrorSink for LoggingSink {
    fn report(&self, worker: WorkerId, error: &InitError) {
        error!(worker = %worker, %error, "Worker initialization failed");
    }
}
