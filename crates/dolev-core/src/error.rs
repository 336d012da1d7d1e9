//! Core error types.

use thiserror::Error;

use crate::item::{ItemShape, KeyDirection, KeyId, PrincipalId};

/// Errors from the item algebra.
///
/// All of these are local to one operation: the caller abandons the current
/// attempt or session and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlgebraError {
    /// A specific variant was required and another one was supplied.
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Variant the operation needs.
        expected: ItemShape,
        /// Variant it was given.
        found: ItemShape,
    },

    /// Public half used where the private half is required, or vice versa.
    #[error("wrong key direction: operation requires the {expected} half")]
    WrongKeyDirection {
        /// Direction the operation needs.
        expected: KeyDirection,
    },

    /// The ciphertext was sealed for a different keypair.
    #[error(
        "key mismatch: sealed for {sealed_creator}/{sealed_key}, opened with {key_creator}/{key_id}"
    )]
    KeyMismatch {
        /// Creator of the sealing keypair.
        sealed_creator: PrincipalId,
        /// Id of the sealing keypair.
        sealed_key: KeyId,
        /// Creator of the supplied key.
        key_creator: PrincipalId,
        /// Id of the supplied key.
        key_id: KeyId,
    },
}

/// Errors from the shared world.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// An item that fails the publicity oracle was sent.
    ///
    /// The oracle and a send site disagree. This is a design bug, not a
    /// runtime condition.
    #[error("policy violation: refused to publish {shape} item")]
    PolicyViolation {
        /// Variant of the refused item.
        shape: ItemShape,
    },

    /// Receive on an empty world.
    #[error("no traffic: world is empty")]
    NoTraffic,
}

impl ChannelError {
    /// Returns true if this error must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::PolicyViolation { .. } => true,
            Self::NoTraffic => false,
        }
    }
}

/// Errors from the principal context and directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// Principal was never spawned or has no directory entry.
    #[error("unknown principal: {0}")]
    UnknownPrincipal(PrincipalId),

    /// Principal already has a directory keypair.
    #[error("principal {0} already has registered keys")]
    AlreadyRegistered(PrincipalId),
}

/// Errors from CBOR encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode failed: {reason}")]
    Encode {
        /// Underlying encoder message.
        reason: String,
    },

    /// Deserialization failed.
    #[error("decode failed: {reason}")]
    Decode {
        /// Underlying decoder message.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_violation_is_fatal() {
        let err = ChannelError::PolicyViolation { shape: ItemShape::Key };
        assert!(err.is_fatal());
    }

    #[test]
    fn no_traffic_is_transient() {
        assert!(!ChannelError::NoTraffic.is_fatal());
    }

    #[test]
    fn error_display() {
        let err = AlgebraError::ShapeMismatch { expected: ItemShape::Pair, found: ItemShape::Data };
        assert_eq!(err.to_string(), "shape mismatch: expected pair, found data");

        let err = AlgebraError::WrongKeyDirection { expected: KeyDirection::Private };
        assert_eq!(err.to_string(), "wrong key direction: operation requires the private half");

        let err = AlgebraError::KeyMismatch {
            sealed_creator: PrincipalId::new(1),
            sealed_key: KeyId::new(0),
            key_creator: PrincipalId::new(2),
            key_id: KeyId::new(3),
        };
        assert_eq!(err.to_string(), "key mismatch: sealed for P1/k0, opened with P2/k3");
    }
}
