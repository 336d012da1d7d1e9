//! Session journal.
//!
//! Every honest session reports into one journal: step mode from the
//! simulation loop, concurrent mode from many tasks at once. The integrity
//! checker reads nothing else, so both modes are checked the same way.

use std::sync::{Mutex, PoisonError};

use dolev_core::{Item, PrincipalId};
use dolev_handshake::SessionKeys;
use serde::{Deserialize, Serialize};

/// Which side of the handshake a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Sends message 1 and 3.
    Initiator,
    /// Sends message 2.
    Responder,
}

/// Something that happened to an honest session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// An initiator sent its nonce offer.
    Started {
        /// The initiator.
        initiator: PrincipalId,
        /// Its intended peer.
        responder: PrincipalId,
    },

    /// A responder accepted an offer and sent its challenge.
    Accepted {
        /// The responder.
        responder: PrincipalId,
        /// The initiator named in the offer.
        initiator: PrincipalId,
        /// `NA` as received.
        initiator_nonce: Item,
        /// `NB` as minted.
        responder_nonce: Item,
    },

    /// A responder could not open a message as an offer.
    Rejected {
        /// The responder.
        responder: PrincipalId,
        /// Why.
        reason: String,
    },

    /// A session completed.
    Established {
        /// Side of the session.
        role: Role,
        /// The shared secret.
        keys: SessionKeys,
    },

    /// A session failed.
    Aborted {
        /// Side of the session.
        role: Role,
        /// Principal running the session.
        owner: PrincipalId,
        /// Principal it was talking to.
        peer: PrincipalId,
        /// Why.
        reason: String,
    },
}

/// Append-only record of session events.
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<SessionEvent>>,
}

impl Journal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: SessionEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    /// Copy of all events in recording order.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Shared secrets of sessions that completed on `role`'s side.
    pub fn established(&self, role: Role) -> Vec<SessionKeys> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Established { role: r, keys } if r == role => Some(keys),
                _ => None,
            })
            .collect()
    }

    /// Number of aborted sessions on either side.
    pub fn aborted(&self) -> usize {
        self.count(|event| matches!(event, SessionEvent::Aborted { .. }))
    }

    /// Number of offers accepted by responders.
    pub fn accepted(&self) -> usize {
        self.count(|event| matches!(event, SessionEvent::Accepted { .. }))
    }

    /// Number of initiator sessions that sent an offer.
    pub fn started(&self) -> usize {
        self.count(|event| matches!(event, SessionEvent::Started { .. }))
    }

    fn count(&self, predicate: impl Fn(&SessionEvent) -> bool) -> usize {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.iter().filter(|event| predicate(event)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(a: u64, b: u64) -> SessionKeys {
        SessionKeys {
            initiator: PrincipalId::new(a),
            responder: PrincipalId::new(b),
            initiator_nonce: Item::data(a),
            responder_nonce: Item::data(b),
        }
    }

    #[test]
    fn established_filters_by_role() {
        let journal = Journal::new();
        journal.record(SessionEvent::Established { role: Role::Initiator, keys: keys(0, 1) });
        journal.record(SessionEvent::Established { role: Role::Responder, keys: keys(0, 1) });
        journal.record(SessionEvent::Established { role: Role::Initiator, keys: keys(2, 1) });

        assert_eq!(journal.established(Role::Initiator), vec![keys(0, 1), keys(2, 1)]);
        assert_eq!(journal.established(Role::Responder), vec![keys(0, 1)]);
    }

    #[test]
    fn counters() {
        let journal = Journal::new();
        journal.record(SessionEvent::Started {
            initiator: PrincipalId::new(0),
            responder: PrincipalId::new(1),
        });
        journal.record(SessionEvent::Aborted {
            role: Role::Initiator,
            owner: PrincipalId::new(0),
            peer: PrincipalId::new(1),
            reason: "echoed nonce does not match".to_string(),
        });

        assert_eq!(journal.started(), 1);
        assert_eq!(journal.aborted(), 1);
        assert_eq!(journal.accepted(), 0);
        assert_eq!(journal.events().len(), 2);
    }
}
