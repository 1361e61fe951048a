//! Turn arbitration
//!
//! The floor is a single-slot semaphore so that waiting for it can race an
//! external cancellation signal, which an ordinary lock cannot.

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Read-only access to the conversation's turn counters
pub trait TurnProvider: Send + Sync {
    /// Turns observed so far
    fn current_turn(&self) -> u32;

    /// Ceiling after which the conversation ends
    fn max_turns(&self) -> u32;
}

/// Errors returned by [`TurnArbiter::acquire`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("turn acquisition cancelled")]
    Cancelled,
}

/// Grants at most one holder the right to generate and publish.
pub struct TurnArbiter {
    slot: Semaphore,
    held: AtomicBool,
}

impl TurnArbiter {
    pub fn new() -> Self {
        Self {
            slot: Semaphore::new(1),
            held: AtomicBool::new(false),
        }
    }

    /// Wait until the floor is free and take it.
    ///
    /// Returns [`TurnError::Cancelled`] without taking the floor if `cancel`
    /// fires first (or has already fired). The floor is released when the
    /// returned guard is dropped.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<TurnFloor<'_>, TurnError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TurnError::Cancelled),
            permit = self.slot.acquire() => {
                let permit = permit.map_err(|_| TurnError::Cancelled)?;
                permit.forget();
                self.held.store(true, Ordering::Release);
                Ok(TurnFloor { arbiter: self })
            }
        }
    }

    /// Give the floor back. A no-op when nobody holds it.
    pub fn release(&self) {
        if self.held.swap(false, Ordering::AcqRel) {
            self.slot.add_permits(1);
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl Default for TurnArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of holding the floor; releases it on drop.
#[must_use = "the floor is released as soon as the guard is dropped"]
pub struct TurnFloor<'a> {
    arbiter: &'a TurnArbiter,
}

impl Drop for TurnFloor<'_> {
    fn drop(&mut self) {
        self.arbiter.release();
    }
}
