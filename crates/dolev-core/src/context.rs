//! Simulation context: principals, key counters and the key directory.
//!
//! Principal ids are handed out from a single counter and each principal owns
//! a key counter, so `(creator, key_id)` never repeats within a run. Standing
//! (good or bad) is fixed when a principal is spawned.
//!
//! All methods take `&self` and are safe to call from concurrent tasks.

use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::{
    error::ContextError,
    item::{Info, KeyId, KeyItem, KeyPair, PrincipalId},
};

/// Whether a principal follows the protocol.
///
/// Bad principals publish every key they create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Standing {
    /// Keeps its private keys private.
    Good,
    /// Leaks everything.
    Bad,
}

/// Read access to principal standing.
pub trait Standings: Send + Sync {
    /// Standing of `principal`, `None` if it was never spawned.
    fn standing(&self, principal: PrincipalId) -> Option<Standing>;

    /// True only for spawned principals marked bad.
    fn is_bad(&self, principal: PrincipalId) -> bool {
        self.standing(principal) == Some(Standing::Bad)
    }
}

/// Key generation (the crypto provider).
///
/// Implementations MUST never return two keypairs with the same
/// `(creator, key_id)`.
pub trait KeySource: Send + Sync {
    /// Generate a fresh keypair owned by `owner` and tagged with `info`.
    fn create_keypair(&self, owner: PrincipalId, info: Info) -> Result<KeyPair, ContextError>;
}

/// Principal directory.
///
/// Lookups are consistent: the same principal always resolves to the same
/// public key within a run.
pub trait Directory: Send + Sync {
    /// Public directory key of `principal`.
    fn lookup_public_key(&self, principal: PrincipalId) -> Result<KeyItem, ContextError>;
}

#[derive(Debug)]
struct PrincipalEntry {
    standing: Standing,
    next_key: AtomicU64,
}

/// Owns every counter of a run.
#[derive(Debug, Default)]
pub struct SimContext {
    principals: RwLock<Vec<Arc<PrincipalEntry>>>,
    directory: RwLock<HashMap<PrincipalId, KeyPair>>,
}

impl SimContext {
    /// Empty context: no principals, no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a principal whose standing never changes.
    pub fn spawn_principal(&self, standing: Standing) -> PrincipalId {
        let mut principals = self.principals.write().unwrap_or_else(PoisonError::into_inner);
        let id = PrincipalId::new(principals.len() as u64);
        principals.push(Arc::new(PrincipalEntry { standing, next_key: AtomicU64::new(0) }));

        tracing::debug!(principal = %id, ?standing, "spawned principal");
        id
    }

    /// Number of spawned principals.
    pub fn principal_count(&self) -> usize {
        self.principals.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of keypairs `principal` has created so far.
    pub fn key_count(&self, principal: PrincipalId) -> Option<u64> {
        self.entry(principal).map(|entry| entry.next_key.load(Ordering::SeqCst))
    }

    /// Create and publish `owner`'s directory keypair.
    ///
    /// Each principal has at most one directory keypair.
    pub fn register_long_term_keys(
        &self,
        owner: PrincipalId,
        info: Info,
    ) -> Result<KeyPair, ContextError> {
        let mut directory = self.directory.write().unwrap_or_else(PoisonError::into_inner);
        if directory.contains_key(&owner) {
            return Err(ContextError::AlreadyRegistered(owner));
        }

        let keys = self.create_keypair(owner, info)?;
        directory.insert(owner, keys.clone());
        Ok(keys)
    }

    /// `owner`'s directory keypair, including the private half.
    ///
    /// Only the owner's own session code should ask for this.
    pub fn long_term_keys(&self, owner: PrincipalId) -> Result<KeyPair, ContextError> {
        self.directory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner)
            .cloned()
            .ok_or(ContextError::UnknownPrincipal(owner))
    }

    /// Every registered directory public key, ordered by principal.
    pub fn published_keys(&self) -> Vec<KeyItem> {
        let directory = self.directory.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = directory.values().map(|pair| pair.public_key().clone()).collect();
        keys.sort_by_key(KeyItem::creator);
        keys
    }

    fn entry(&self, principal: PrincipalId) -> Option<Arc<PrincipalEntry>> {
        let principals = self.principals.read().unwrap_or_else(PoisonError::into_inner);
        usize::try_from(principal.as_u64()).ok().and_then(|index| principals.get(index)).cloned()
    }
}

impl Standings for SimContext {
    fn standing(&self, principal: PrincipalId) -> Option<Standing> {
        self.entry(principal).map(|entry| entry.standing)
    }
}

impl KeySource for SimContext {
    fn create_keypair(&self, owner: PrincipalId, info: Info) -> Result<KeyPair, ContextError> {
        let entry = self.entry(owner).ok_or(ContextError::UnknownPrincipal(owner))?;
        let key_id = KeyId::new(entry.next_key.fetch_add(1, Ordering::SeqCst));

        tracing::trace!(principal = %owner, key = %key_id, "created keypair");
        Ok(KeyPair::new(owner, key_id, info))
    }
}

impl Directory for SimContext {
    fn lookup_public_key(&self, principal: PrincipalId) -> Result<KeyItem, ContextError> {
        self.directory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&principal)
            .map(|pair| pair.public_key().clone())
            .ok_or(ContextError::UnknownPrincipal(principal))
    }
}

impl<T: Standings + ?Sized> Standings for Arc<T> {
    fn standing(&self, principal: PrincipalId) -> Option<Standing> {
        (**self).standing(principal)
    }
}

impl<T: KeySource + ?Sized> KeySource for Arc<T> {
    fn create_keypair(&self, owner: PrincipalId, info: Info) -> Result<KeyPair, ContextError> {
        (**self).create_keypair(owner, info)
    }
}

impl<T: Directory + ?Sized> Directory for Arc<T> {
    fn lookup_public_key(&self, principal: PrincipalId) -> Result<KeyItem, ContextError> {
        (**self).lookup_public_key(principal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn principal_ids_are_sequential() {
        let ctx = SimContext::new();
        let a = ctx.spawn_principal(Standing::Good);
        let b = ctx.spawn_principal(Standing::Bad);

        assert_eq!(a.as_u64(), 0);
        assert_eq!(b.as_u64(), 1);
        assert_eq!(ctx.principal_count(), 2);
    }

    #[test]
    fn standing_is_fixed_at_spawn() {
        let ctx = SimContext::new();
        let good = ctx.spawn_principal(Standing::Good);
        let bad = ctx.spawn_principal(Standing::Bad);

        assert!(!ctx.is_bad(good));
        assert!(ctx.is_bad(bad));
        assert_eq!(ctx.standing(PrincipalId::new(99)), None);
        assert!(!ctx.is_bad(PrincipalId::new(99)));
    }

    #[test]
    fn keys_are_unique_across_principals() {
        let ctx = SimContext::new();
        let owners: Vec<_> = (0..4).map(|_| ctx.spawn_principal(Standing::Good)).collect();

        let mut seen = HashSet::new();
        for round in 0..50 {
            let owner = owners[round % owners.len()];
            let keys = ctx.create_keypair(owner, Info::atom(0)).unwrap();
            assert!(seen.insert(keys.identity()), "duplicate keypair {:?}", keys.identity());
        }

        assert_eq!(seen.len(), 50);
        assert_eq!(ctx.key_count(owners[0]), Some(13));
    }

    #[test]
    fn keys_are_unique_under_concurrency() {
        let ctx = Arc::new(SimContext::new());
        let owner = ctx.spawn_principal(Standing::Good);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| ctx.create_keypair(owner, Info::atom(1)).unwrap().identity())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for identity in handle.join().unwrap() {
                assert!(seen.insert(identity));
            }
        }
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn unknown_owner_cannot_create_keys() {
        let ctx = SimContext::new();
        let result = ctx.create_keypair(PrincipalId::new(3), Info::atom(0));
        assert_eq!(result, Err(ContextError::UnknownPrincipal(PrincipalId::new(3))));
    }

    #[test]
    fn directory_lookup_is_consistent() {
        let ctx = SimContext::new();
        let owner = ctx.spawn_principal(Standing::Good);
        let keys = ctx.register_long_term_keys(owner, Info::atom(0)).unwrap();

        let first = ctx.lookup_public_key(owner).unwrap();
        let second = ctx.lookup_public_key(owner).unwrap();
        assert_eq!(first, second);
        assert_eq!(&first, keys.public_key());
        assert!(first.is_public());
        assert_eq!(ctx.long_term_keys(owner).unwrap(), keys);
    }

    #[test]
    fn directory_rejects_second_registration() {
        let ctx = SimContext::new();
        let owner = ctx.spawn_principal(Standing::Good);
        ctx.register_long_term_keys(owner, Info::atom(0)).unwrap();

        let result = ctx.register_long_term_keys(owner, Info::atom(0));
        assert_eq!(result, Err(ContextError::AlreadyRegistered(owner)));
    }

    #[test]
    fn directory_lookup_of_unregistered_principal_fails() {
        let ctx = SimContext::new();
        let owner = ctx.spawn_principal(Standing::Good);
        assert_eq!(ctx.lookup_public_key(owner), Err(ContextError::UnknownPrincipal(owner)));
    }
}
