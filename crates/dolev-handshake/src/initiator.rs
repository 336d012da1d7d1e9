//! Initiator state machine.
//!
//! ```text
//! Init ──start()──> NonceSent ──handle(m2)──> Established
//!                        │
//!                        └──any failure──> Aborted
//! ```
//!
//! Pure state machine: it returns [`SessionAction`]s and the caller publishes
//! them. Every failure after `start` ends the session, it never retries.

use dolev_core::{Directory, Item, KeyItem, KeySource, PrincipalId};

use crate::{
    error::{Mismatch, SessionError},
    event::{Credentials, SessionAction, SessionKeys},
    tag::NonceTag,
};

/// Where an initiator session is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiatorState {
    /// Created, nothing sent.
    Init,
    /// Message 1 sent, waiting for the challenge.
    NonceSent,
    /// Handshake completed.
    Established(SessionKeys),
    /// Handshake failed; terminal.
    Aborted,
}

/// One initiator session towards a fixed peer.
pub struct Initiator<K> {
    keys: K,
    credentials: Credentials,
    peer: PrincipalId,
    state: InitiatorState,
    /// `NA`, minted in `start`.
    nonce: Option<KeyItem>,
    /// Peer's directory key, looked up in `start`.
    peer_key: Option<KeyItem>,
}

impl<K: KeySource + Directory> Initiator<K> {
    /// New session from `credentials` to `peer`.
    pub fn new(keys: K, credentials: Credentials, peer: PrincipalId) -> Self {
        Self { keys, credentials, peer, state: InitiatorState::Init, nonce: None, peer_key: None }
    }

    /// Our name.
    pub fn principal(&self) -> PrincipalId {
        self.credentials.principal()
    }

    /// The intended responder.
    pub fn peer(&self) -> PrincipalId {
        self.peer
    }

    /// Current state.
    pub fn state(&self) -> &InitiatorState {
        &self.state
    }

    /// Shared secret, once established.
    pub fn session_keys(&self) -> Option<&SessionKeys> {
        match &self.state {
            InitiatorState::Established(keys) => Some(keys),
            _ => None,
        }
    }

    /// True once the session can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, InitiatorState::Established(_) | InitiatorState::Aborted)
    }

    /// True if `item` is addressed to this session's owner.
    pub fn accepts(&self, item: &Item) -> bool {
        self.state == InitiatorState::NonceSent && self.credentials.opens(item)
    }

    /// Mint `NA` and send `{A, NA}_K(B)`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidState`] if already started
    /// - [`SessionError::Directory`] if the peer has no directory key
    pub fn start(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != InitiatorState::Init {
            return Err(SessionError::InvalidState {
                reason: format!("start in state {:?}", self.state),
            });
        }

        let result = self.send_offer();
        if result.is_err() {
            self.state = InitiatorState::Aborted;
        }
        result
    }

    /// Handle the responder's challenge `{B, NA, NB}_K(A)`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidState`] if not waiting for a challenge
    /// - [`SessionError::Algebra`] if the message is not a challenge for us
    /// - [`SessionError::IdentityMismatch`] if the name is wrong or the echo
    ///   is anything but our nonce
    ///
    /// Every error except `InvalidState` aborts the session.
    pub fn handle(&mut self, message: &Item) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != InitiatorState::NonceSent {
            return Err(SessionError::InvalidState {
                reason: format!("message in state {:?}", self.state),
            });
        }

        match self.confirm(message) {
            Ok((keys, actions)) => {
                tracing::info!(
                    initiator = %keys.initiator,
                    responder = %keys.responder,
                    "initiator established"
                );
                self.state = InitiatorState::Established(keys);
                Ok(actions)
            },
            Err(err) => {
                tracing::warn!(
                    initiator = %self.principal(),
                    peer = %self.peer,
                    error = %err,
                    "initiator aborted"
                );
                self.state = InitiatorState::Aborted;
                Err(err)
            },
        }
    }

    fn send_offer(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let me = self.principal();
        let peer_key = self.keys.lookup_public_key(self.peer)?;
        let nonce = self
            .keys
            .create_keypair(me, NonceTag::InitiatorNonce { responder: self.peer }.to_info())?
            .private_key()
            .clone();

        let offer = peer_key.encrypt(Item::pair(Item::principal(me), Item::Key(nonce.clone())))?;

        tracing::debug!(initiator = %me, peer = %self.peer, "sent nonce offer");
        self.nonce = Some(nonce);
        self.peer_key = Some(peer_key);
        self.state = InitiatorState::NonceSent;
        Ok(vec![SessionAction::Send(offer)])
    }

    fn confirm(&self, message: &Item) -> Result<(SessionKeys, Vec<SessionAction>), SessionError> {
        let (Some(nonce), Some(peer_key)) = (&self.nonce, &self.peer_key) else {
            return Err(SessionError::InvalidState { reason: "no nonce in flight".to_string() });
        };

        let opened = self.credentials.private_key().decrypt(message)?;
        let (name, rest) = opened.split()?;
        let (echo, responder_nonce) = rest.split()?;

        let found = PrincipalId::new(name.as_data()?);
        if found != self.peer {
            return Err(SessionError::IdentityMismatch(Mismatch::Peer {
                expected: self.peer,
                found,
            }));
        }

        let initiator_nonce = Item::Key(nonce.clone());
        if echo != &initiator_nonce {
            return Err(SessionError::IdentityMismatch(Mismatch::Nonce));
        }

        // NB is echoed back whatever its shape.
        let confirmation = peer_key.encrypt(responder_nonce.clone())?;
        let keys = SessionKeys {
            initiator: self.principal(),
            responder: self.peer,
            initiator_nonce,
            responder_nonce: responder_nonce.clone(),
        };

        let actions =
            vec![SessionAction::Send(confirmation), SessionAction::Established(keys.clone())];
        Ok((keys, actions))
    }
}
