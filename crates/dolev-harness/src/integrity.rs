//! Integrity checks over a finished (or paused) run.
//!
//! # Properties
//!
//! - Soundness: every item in the world satisfies the oracle
//! - Secrecy: nonces of a session between two good principals are not
//!   public and were never sent in the clear
//! - Agreement: an established initiator with a good peer has a responder
//!   session at that peer with the same nonces, and an established
//!   responder with a good peer has an established initiator with the same
//!   secret
//! - Freshness: no two responder sessions minted the same nonce

use std::collections::HashSet;

use dolev_core::{ItemShape, PrincipalId, Publicity, World};
use dolev_handshake::SessionKeys;
use thiserror::Error;

use crate::journal::{Journal, Role, SessionEvent};

/// A broken integrity property.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// The world holds an item the oracle rejects.
    #[error("world holds non-public {shape} item")]
    NonPublicItem {
        /// Shape of the offending item.
        shape: ItemShape,
    },

    /// A good-good session secret is known to the adversary.
    #[error("secret of {initiator} <-> {responder} is public")]
    SecretLeaked {
        /// Initiator of the session.
        initiator: PrincipalId,
        /// Responder of the session.
        responder: PrincipalId,
    },

    /// A session completed with no matching partner session.
    #[error("{role:?} {owner} established with {peer} but {peer} ran no matching session")]
    Impersonation {
        /// Side that was fooled.
        role: Role,
        /// Principal that was fooled.
        owner: PrincipalId,
        /// Principal it believes it talked to.
        peer: PrincipalId,
    },

    /// Two responder sessions share a nonce.
    #[error("{responder} minted the same nonce twice")]
    ReusedNonce {
        /// Responder with the duplicate.
        responder: PrincipalId,
    },
}

/// Checks a world and a journal against the integrity properties.
pub struct IntegrityChecker<'a, P> {
    world: &'a World<P>,
}

impl<'a, P: Publicity> IntegrityChecker<'a, P> {
    /// Checker reading `world` and its oracle.
    pub fn new(world: &'a World<P>) -> Self {
        Self { world }
    }

    /// Check every property; the first violation found is returned.
    pub fn check(&self, journal: &Journal) -> Result<(), Violation> {
        let events = journal.events();
        self.check_world()?;
        self.check_secrecy(&events)?;
        self.check_agreement(&events)?;
        check_freshness(&events)
    }

    fn is_good(&self, principal: PrincipalId) -> bool {
        !self.world.policy().is_bad(principal)
    }

    fn check_world(&self) -> Result<(), Violation> {
        let policy = self.world.policy();
        match self.world.snapshot().into_iter().find(|item| !policy.is_public(item)) {
            Some(item) => Err(Violation::NonPublicItem { shape: item.shape() }),
            None => Ok(()),
        }
    }

    fn check_secrecy(&self, events: &[SessionEvent]) -> Result<(), Violation> {
        let policy = self.world.policy();
        for event in events {
            let SessionEvent::Established { keys, .. } = event else { continue };
            if !self.is_good(keys.initiator) || !self.is_good(keys.responder) {
                continue;
            }

            let leaked = [&keys.initiator_nonce, &keys.responder_nonce]
                .into_iter()
                .any(|nonce| policy.is_public(nonce) || self.world.contains(nonce));
            if leaked {
                return Err(Violation::SecretLeaked {
                    initiator: keys.initiator,
                    responder: keys.responder,
                });
            }
        }
        Ok(())
    }

    fn check_agreement(&self, events: &[SessionEvent]) -> Result<(), Violation> {
        let accepted: HashSet<SessionKeys> = events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Accepted {
                    responder,
                    initiator,
                    initiator_nonce,
                    responder_nonce,
                } => Some(SessionKeys {
                    initiator: *initiator,
                    responder: *responder,
                    initiator_nonce: initiator_nonce.clone(),
                    responder_nonce: responder_nonce.clone(),
                }),
                _ => None,
            })
            .collect();

        let initiated: HashSet<&SessionKeys> = events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Established { role: Role::Initiator, keys } => Some(keys),
                _ => None,
            })
            .collect();

        for event in events {
            let SessionEvent::Established { role, keys } = event else { continue };
            let (owner, peer) = match role {
                Role::Initiator => (keys.initiator, keys.responder),
                Role::Responder => (keys.responder, keys.initiator),
            };
            if !self.is_good(owner) || !self.is_good(peer) {
                continue;
            }

            let matched = match role {
                Role::Initiator => accepted.contains(keys),
                Role::Responder => initiated.contains(keys),
            };
            if !matched {
                return Err(Violation::Impersonation { role: *role, owner, peer });
            }
        }
        Ok(())
    }
}

fn check_freshness(events: &[SessionEvent]) -> Result<(), Violation> {
    let mut minted = HashSet::new();
    for event in events {
        if let SessionEvent::Accepted { responder, responder_nonce, .. } = event
            && !minted.insert(responder_nonce)
        {
            return Err(Violation::ReusedNonce { responder: *responder });
        }
    }
    Ok(())
}
