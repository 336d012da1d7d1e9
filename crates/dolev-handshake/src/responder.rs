//! Responder state machine.
//!
//! A responder serves any number of independent sessions:
//!
//! ```text
//! (Listening) ──accept(m1)──> Replied ──handle(m3)──> Established
//!                                │
//!                                └──wrong nonce──> Aborted
//! ```
//!
//! A message that fails to open as a nonce offer creates no session at all,
//! so listening is not a state of any session but of the responder itself.
//! Replaying a message 1 opens a fresh session with a fresh nonce and never
//! touches the sessions already running.

use std::collections::BTreeMap;

use dolev_core::{Directory, Item, KeyItem, KeySource, PrincipalId};

use crate::{
    error::{Mismatch, SessionError},
    event::{Credentials, SessionAction, SessionId, SessionKeys},
    tag::{NonceRef, NonceTag},
};

/// Where a responder session is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderState {
    /// Challenge sent, waiting for the confirmation.
    Replied,
    /// Handshake completed.
    Established(SessionKeys),
    /// Confirmation did not match; terminal.
    Aborted,
}

#[derive(Debug)]
struct ResponderSession {
    initiator: PrincipalId,
    initiator_nonce: KeyItem,
    responder_nonce: KeyItem,
    state: ResponderState,
}

/// All sessions of one responding principal.
pub struct Responder<K> {
    keys: K,
    credentials: Credentials,
    sessions: BTreeMap<SessionId, ResponderSession>,
    next_session: u64,
}

impl<K: KeySource + Directory> Responder<K> {
    /// Responder with no sessions.
    pub fn new(keys: K, credentials: Credentials) -> Self {
        Self { keys, credentials, sessions: BTreeMap::new(), next_session: 0 }
    }

    /// Our name.
    pub fn principal(&self) -> PrincipalId {
        self.credentials.principal()
    }

    /// Number of sessions ever accepted.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// State of `session`.
    pub fn state(&self, session: SessionId) -> Option<&ResponderState> {
        self.sessions.get(&session).map(|s| &s.state)
    }

    /// Claimed initiator of `session`.
    pub fn initiator_of(&self, session: SessionId) -> Option<PrincipalId> {
        self.sessions.get(&session).map(|s| s.initiator)
    }

    /// Sessions waiting for a confirmation, oldest first.
    pub fn pending(&self) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.state == ResponderState::Replied)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Shared secrets of every established session, oldest first.
    pub fn established(&self) -> Vec<(SessionId, &SessionKeys)> {
        self.sessions
            .iter()
            .filter_map(|(id, s)| match &s.state {
                ResponderState::Established(keys) => Some((*id, keys)),
                _ => None,
            })
            .collect()
    }

    /// `(NA, NB)` of `session`, known from the moment it was accepted.
    pub fn nonces(&self, session: SessionId) -> Option<(&KeyItem, &KeyItem)> {
        self.sessions.get(&session).map(|s| (&s.initiator_nonce, &s.responder_nonce))
    }

    /// Nonces minted by every session, in session order.
    pub fn minted_nonces(&self) -> Vec<&KeyItem> {
        self.sessions.values().map(|s| &s.responder_nonce).collect()
    }

    /// True if `item` is addressed to this responder.
    pub fn accepts(&self, item: &Item) -> bool {
        self.credentials.opens(item)
    }

    /// The waiting session `message` confirms, if any.
    ///
    /// Opens `message` and looks for a `Replied` session whose nonce it
    /// carries. Nothing changes; [`Self::handle`] does the transition.
    pub fn confirming(&self, message: &Item) -> Option<SessionId> {
        let opened = self.credentials.private_key().decrypt(message).ok()?;
        let nonce = opened.as_key().ok()?;
        self.sessions
            .iter()
            .find(|(_, s)| s.state == ResponderState::Replied && &s.responder_nonce == nonce)
            .map(|(id, _)| *id)
    }

    /// Open a new session from a nonce offer `{A, NA}_K(B)`.
    ///
    /// On success the session is `Replied` and the challenge
    /// `{B, NA, NB}_K(A)` is returned for sending.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Algebra`] if the message is not an offer for us
    /// - [`SessionError::Directory`] if the claimed initiator has no directory
    ///   key
    ///
    /// A failed offer leaves no trace.
    pub fn accept(
        &mut self,
        message: &Item,
    ) -> Result<(SessionId, Vec<SessionAction>), SessionError> {
        let me = self.principal();
        let opened = self.credentials.private_key().decrypt(message)?;
        let (name, offered) = opened.split()?;
        let initiator = PrincipalId::new(name.as_data()?);
        let initiator_nonce = offered.as_key()?.clone();

        let initiator_key = self.keys.lookup_public_key(initiator)?;
        let tag =
            NonceTag::ResponderNonce { initiator, echoed: NonceRef::of(&initiator_nonce) };
        let responder_nonce = self.keys.create_keypair(me, tag.to_info())?.private_key().clone();

        let challenge = initiator_key.encrypt(Item::pair(
            Item::principal(me),
            Item::pair(Item::Key(initiator_nonce.clone()), Item::Key(responder_nonce.clone())),
        ))?;

        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.sessions.insert(id, ResponderSession {
            initiator,
            initiator_nonce,
            responder_nonce,
            state: ResponderState::Replied,
        });

        tracing::debug!(responder = %me, %initiator, session = %id, "accepted nonce offer");
        Ok((id, vec![SessionAction::Send(challenge)]))
    }

    /// Handle the confirmation `{NB}_K(B)` for `session`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::UnknownSession`] if `session` was never accepted
    /// - [`SessionError::InvalidState`] if `session` is not waiting
    /// - [`SessionError::Algebra`] if the confirmation is not sealed for us
    /// - [`SessionError::IdentityMismatch`] if it opens to anything but our
    ///   nonce
    ///
    /// Both abort the session.
    pub fn handle(
        &mut self,
        session: SessionId,
        message: &Item,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let me = self.principal();
        let opened = self.credentials.private_key().decrypt(message);

        let entry = self.sessions.get_mut(&session).ok_or(SessionError::UnknownSession(session))?;
        if entry.state != ResponderState::Replied {
            return Err(SessionError::InvalidState {
                reason: format!("session {session} in state {:?}", entry.state),
            });
        }

        let expected = Item::Key(entry.responder_nonce.clone());
        let verdict = opened.map_err(SessionError::from).and_then(|opened| {
            if opened == expected {
                Ok(())
            } else {
                Err(SessionError::IdentityMismatch(Mismatch::Nonce))
            }
        });

        match verdict {
            Ok(()) => {
                let keys = SessionKeys {
                    initiator: entry.initiator,
                    responder: me,
                    initiator_nonce: Item::Key(entry.initiator_nonce.clone()),
                    responder_nonce: expected,
                };
                tracing::info!(
                    responder = %me,
                    initiator = %entry.initiator,
                    %session,
                    "responder established"
                );
                entry.state = ResponderState::Established(keys.clone());
                Ok(vec![SessionAction::Established(keys)])
            },
            Err(err) => {
                tracing::warn!(responder = %me, %session, error = %err, "responder aborted");
                entry.state = ResponderState::Aborted;
                Err(err)
            },
        }
    }
}
