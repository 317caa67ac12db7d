//! SSH transport for stevedore
//!
//! This crate provides the remote-execution seam the job lifecycle
//! machinery is written against: a single authenticated session type, a
//! connection manager with bounded fixed-interval retry, and the
//! [`RemoteExecutor`] trait that abstracts over both so the core can be
//! tested without a network.

mod connection;
mod error;
mod session;

pub use connection::*;
pub use error::*;
pub use session::*;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Remote command execution seam.
///
/// One long-lived shared session backs polling and batched calls;
/// short-lived and dedicated connections keep one-off queries and
/// attached streams from contending with it.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Ensure the shared session is connected, rebuilding it if needed.
    /// Retries up to the configured bound before failing.
    async fn connect(&self) -> Result<()>;

    /// Run a command on the shared session, connecting lazily if no
    /// session exists yet.
    async fn exec(&self, command: &str) -> Result<ExecOutput>;

    /// Run a command on a fresh connection and tear it down immediately.
    /// Used for isolated, infrequent queries so they do not contend with
    /// the shared session.
    async fn exec_once(&self, command: &str) -> Result<ExecOutput>;

    /// Run a command on a dedicated session held open for the command's
    /// full duration, streaming combined output chunks as they arrive.
    /// The returned [`ExecOutput`] carries only the exit code and signal;
    /// all output bytes go through `output`.
    async fn exec_attached(
        &self,
        command: &str,
        output: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<ExecOutput>;

    /// Disconnect and drop the shared session.
    async fn close(&self);
}
