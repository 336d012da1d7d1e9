//! Publicity oracle.
//!
//! `pub(item)` decides which items the adversary may legitimately hold. It is
//! checked on every send and assumed on every receive, so it must be a pure,
//! monotone function of the item and the (fixed) standing of principals.
//!
//! The general shape is shared by all protocols:
//!
//! - Data is public.
//! - A key is public if it is a public half, its owner is bad, or the
//!   protocol agreed to disclose it ([`Publicity::disclosed_key`]).
//! - A pair is public if both components are.
//! - A ciphertext is public if its payload is, or if the protocol declares
//!   the sealed shape safe ([`Publicity::sealed_exception`]).
//!
//! A protocol supplies the two hooks; the recursion lives here.

use crate::{
    context::Standings,
    item::{Ciphertext, Item, KeyItem, PrincipalId},
};

/// The security policy of a model.
pub trait Publicity: Send + Sync {
    /// True if `principal` leaks everything it creates.
    fn is_bad(&self, principal: PrincipalId) -> bool;

    /// Private keys the protocol hands out to a bad peer.
    fn disclosed_key(&self, _key: &KeyItem) -> bool {
        false
    }

    /// Ciphertexts that are safe to publish although their payload is not.
    fn sealed_exception(&self, _sealed: &Ciphertext) -> bool {
        false
    }

    /// The oracle `pub`.
    fn is_public(&self, item: &Item) -> bool {
        match item {
            Item::Data(_) => true,
            Item::Key(key) => {
                key.is_public() || self.is_bad(key.creator()) || self.disclosed_key(key)
            },
            Item::Pair(first, second) => self.is_public(first) && self.is_public(second),
            Item::Ciphertext(sealed) => {
                self.is_public(sealed.payload()) || self.sealed_exception(sealed)
            },
        }
    }
}

/// Policy with no protocol exceptions: only the general shape.
#[derive(Debug, Clone)]
pub struct BaselinePolicy<S> {
    standings: S,
}

impl<S: Standings> BaselinePolicy<S> {
    /// Policy judging badness by `standings`.
    pub fn new(standings: S) -> Self {
        Self { standings }
    }
}

impl<S: Standings> Publicity for BaselinePolicy<S> {
    fn is_bad(&self, principal: PrincipalId) -> bool {
        self.standings.is_bad(principal)
    }
}

impl<T: Publicity + ?Sized> Publicity for std::sync::Arc<T> {
    fn is_bad(&self, principal: PrincipalId) -> bool {
        (**self).is_bad(principal)
    }

    fn disclosed_key(&self, key: &KeyItem) -> bool {
        (**self).disclosed_key(key)
    }

    fn sealed_exception(&self, sealed: &Ciphertext) -> bool {
        (**self).sealed_exception(sealed)
    }

    fn is_public(&self, item: &Item) -> bool {
        (**self).is_public(item)
    }
}
