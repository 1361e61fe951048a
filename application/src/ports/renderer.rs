//! Renderer port
//!
//! Renderers consume the bus exactly like a participant does: subscribe,
//! read until the bus closes, then optionally produce an end-of-run summary.

use crate::coordination::bus::Bus;
use parlor_domain::Identity;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors raised while rendering output
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Render failed: {0}")]
    Other(String),
}

/// A bus consumer that presents the conversation.
pub trait Renderer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Subscribe to `bus` and spawn the consuming task.
    ///
    /// The subscription must be taken before this returns so that no message
    /// published afterwards is missed. The task ends when the bus closes.
    fn attach(self: Arc<Self>, bus: &Bus) -> JoinHandle<()>;

    /// Last pass once the bus is drained, with every participant's final state.
    fn finalize(&self, _identities: &[Identity]) -> Result<(), RenderError> {
        Ok(())
    }
}
