//! Harness error types.

use dolev_core::{ChannelError, ContextError};
use dolev_handshake::SessionError;
use thiserror::Error;

use crate::integrity::Violation;

/// Errors that stop a run.
///
/// Abandoned adversary attempts and aborted sessions are outcomes, not
/// errors. Everything here means the model is broken or could not start.
#[derive(Debug, Error)]
pub enum SimError {
    /// The world refused an item the adversary derived.
    #[error("model fault: {0}")]
    Fault(#[from] ChannelError),

    /// An honest party built a message the world refused.
    #[error("session fault: {0}")]
    Session(#[from] SessionError),

    /// Principals or directory keys could not be set up.
    #[error("setup failed: {0}")]
    Setup(#[from] ContextError),

    /// The finished run broke an integrity property.
    #[error("integrity violation: {0}")]
    Integrity(#[from] Violation),

    /// A runtime task died.
    #[error("task failed: {reason}")]
    Task {
        /// Join error description.
        reason: String,
    },
}

impl SimError {
    /// True if this error means the oracle and a sender disagree.
    pub fn is_policy_fault(&self) -> bool {
        match self {
            Self::Fault(err) => err.is_fatal(),
            Self::Session(err) => err.is_fatal(),
            Self::Setup(_) | Self::Integrity(_) | Self::Task { .. } => false,
        }
    }
}
