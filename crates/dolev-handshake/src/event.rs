//! Actions produced by the session state machines.

use std::fmt;

use dolev_core::{Item, KeyItem, KeyPair, PrincipalId};
use serde::{Deserialize, Serialize};

/// Responder-local session number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A party's long-term identity: its name and directory private key.
#[derive(Debug, Clone)]
pub struct Credentials {
    principal: PrincipalId,
    private_key: KeyItem,
}

impl Credentials {
    /// Credentials from a directory keypair.
    pub fn from_keypair(keys: &KeyPair) -> Self {
        Self { principal: keys.private_key().creator(), private_key: keys.private_key().clone() }
    }

    /// Owner of the credentials.
    pub fn principal(&self) -> PrincipalId {
        self.principal
    }

    /// True if `item` is sealed for these credentials.
    pub fn opens(&self, item: &Item) -> bool {
        self.private_key.opens(item)
    }

    pub(crate) fn private_key(&self) -> &KeyItem {
        &self.private_key
    }
}

/// Shared secret of a completed handshake.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl prints nonce shapes only, so
///   session secrets never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKeys {
    /// Initiator of the handshake.
    pub initiator: PrincipalId,
    /// Responder of the handshake.
    pub responder: PrincipalId,
    /// `NA`, minted by the initiator.
    pub initiator_nonce: Item,
    /// `NB`, minted by the responder.
    pub responder_nonce: Item,
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("initiator", &self.initiator)
            .field("responder", &self.responder)
            .field("initiator_nonce", &format!("<redacted {}>", self.initiator_nonce.shape()))
            .field("responder_nonce", &format!("<redacted {}>", self.responder_nonce.shape()))
            .finish()
    }
}

/// Something the caller must do on behalf of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Publish this item to the world.
    Send(Item),
    /// The handshake completed; report the shared secret.
    Established(SessionKeys),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_keys_debug_redacts_nonces() {
        let keys = SessionKeys {
            initiator: PrincipalId::new(0),
            responder: PrincipalId::new(1),
            initiator_nonce: Item::data(123_456),
            responder_nonce: Item::data(654_321),
        };

        let debug = format!("{keys:?}");
        assert!(debug.contains("<redacted data>"));
        assert!(!debug.contains("123456"));
        assert!(!debug.contains("654321"));
    }
}
