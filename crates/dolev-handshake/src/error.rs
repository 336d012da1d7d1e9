//! Session error types.

use std::fmt;

use dolev_core::{AlgebraError, ChannelError, ContextError, PrincipalId};
use thiserror::Error;

use crate::event::SessionId;

/// Which protocol-level check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The message names a different peer than expected.
    Peer {
        /// Peer the session was opened with.
        expected: PrincipalId,
        /// Peer named in the message.
        found: PrincipalId,
    },
    /// The echoed nonce is not the one this session sent.
    Nonce,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peer { expected, found } => {
                write!(f, "expected peer {expected}, message names {found}")
            },
            Self::Nonce => f.write_str("echoed nonce does not match"),
        }
    }
}

/// Errors from a single handshake session.
///
/// Only [`SessionError::Channel`] can be fatal to the process. Everything
/// else ends the session (or the attempt to open one) and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Message had the wrong shape or was sealed for another key.
    #[error("malformed message: {0}")]
    Algebra(#[from] AlgebraError),

    /// Name or nonce check failed.
    #[error("identity mismatch: {0}")]
    IdentityMismatch(Mismatch),

    /// Directory lookup or key generation failed.
    #[error("directory error: {0}")]
    Directory(#[from] ContextError),

    /// The session cannot accept this event in its current state.
    #[error("invalid state: {reason}")]
    InvalidState {
        /// Description of the state error.
        reason: String,
    },

    /// No session with this id.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Publishing a session message failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl SessionError {
    /// Returns true if this error indicates a fatal condition.
    ///
    /// A fatal error means an honest party built a message the publicity
    /// policy refuses, so the model itself is inconsistent.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Channel(err) => err.is_fatal(),
            Self::Algebra(_)
            | Self::IdentityMismatch(_)
            | Self::Directory(_)
            | Self::InvalidState { .. }
            | Self::UnknownSession(_) => false,
        }
    }

    /// True if an authentication check rejected the peer.
    ///
    /// Other errors mean the message was not addressed to this session at
    /// all.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::IdentityMismatch(_))
    }
}
