//! Publicity policy of the handshake.
//!
//! ```text
//! 1. A -> B: {A, NA}_K(B)
//! 2. B -> A: {B, NA, NB}_K(A)
//! 3. A -> B: {NB}_K(B)
//! ```
//!
//! Nonces are private keys. A nonce is public when it was meant for a bad
//! peer. The three messages are public although their payloads are not,
//! provided they are sealed under the directory key of the party the nonces
//! were meant for and are shaped exactly as an honest party builds them.
//! Anything looser would let the adversary receive a ciphertext it could
//! open with a bad key and obtain a secret nonce.

use dolev_core::{Ciphertext, Item, KeyDirection, KeyItem, PrincipalId, Publicity, Standings};

use crate::tag::NonceTag;

/// Oracle `pub` for the handshake.
#[derive(Debug, Clone)]
pub struct NslPolicy<S> {
    standings: S,
}

impl<S: Standings> NslPolicy<S> {
    /// Policy judging badness by `standings`.
    pub fn new(standings: S) -> Self {
        Self { standings }
    }

    /// Message 1: `(Data(c), N)` with `N` the private nonce of `c` meant for
    /// `recipient`.
    fn is_nonce_offer(&self, recipient: PrincipalId, name: &Item, nonce: &KeyItem) -> bool {
        !nonce.is_public()
            && name == &Item::principal(nonce.creator())
            && NonceTag::of(nonce) == Some(NonceTag::InitiatorNonce { responder: recipient })
    }

    /// Message 2: `(Data(c), (X, M))` with `M` the private nonce of `c`
    /// minted for `recipient`, and `X` public or exactly the initiator nonce
    /// `M` echoes.
    fn is_challenge(
        &self,
        recipient: PrincipalId,
        name: &Item,
        echo: &Item,
        nonce: &KeyItem,
    ) -> bool {
        if nonce.is_public() || name != &Item::principal(nonce.creator()) {
            return false;
        }

        let Some(NonceTag::ResponderNonce { initiator, echoed }) = NonceTag::of(nonce) else {
            return false;
        };
        if initiator != recipient {
            return false;
        }

        self.is_public(echo)
            || match echo {
                Item::Key(offered) => {
                    echoed.matches(offered)
                        && offered.creator() == recipient
                        && !offered.is_public()
                        && NonceTag::of(offered)
                            == Some(NonceTag::InitiatorNonce { responder: nonce.creator() })
                },
                Item::Data(_) | Item::Ciphertext(_) | Item::Pair(..) => false,
            }
    }

    /// Message 3: `M` alone, the private nonce of `recipient` minted in reply
    /// to a private initiator nonce that was meant for `recipient`.
    fn is_confirmation(&self, recipient: PrincipalId, nonce: &KeyItem) -> bool {
        if nonce.is_public() || nonce.creator() != recipient {
            return false;
        }

        match NonceTag::of(nonce) {
            Some(NonceTag::ResponderNonce { initiator, echoed }) => {
                echoed.creator == initiator
                    && echoed.direction == KeyDirection::Private
                    && NonceTag::from_info(&echoed.info)
                        == Some(NonceTag::InitiatorNonce { responder: recipient })
            },
            _ => false,
        }
    }
}

impl<S: Standings> Publicity for NslPolicy<S> {
    fn is_bad(&self, principal: PrincipalId) -> bool {
        self.standings.is_bad(principal)
    }

    fn disclosed_key(&self, key: &KeyItem) -> bool {
        match NonceTag::of(key) {
            Some(NonceTag::InitiatorNonce { responder }) => self.is_bad(responder),
            Some(NonceTag::ResponderNonce { initiator, .. }) => self.is_bad(initiator),
            Some(NonceTag::Encryption) | None => false,
        }
    }

    fn sealed_exception(&self, sealed: &Ciphertext) -> bool {
        if NonceTag::from_info(sealed.key_info()) != Some(NonceTag::Encryption) {
            return false;
        }
        let recipient = sealed.key_creator();

        match sealed.payload() {
            Item::Key(nonce) => self.is_confirmation(recipient, nonce),
            Item::Pair(name, rest) => match rest.as_ref() {
                Item::Key(nonce) => self.is_nonce_offer(recipient, name, nonce),
                Item::Pair(echo, nonce) => match nonce.as_ref() {
                    Item::Key(nonce) => self.is_challenge(recipient, name, echo, nonce),
                    Item::Data(_) | Item::Ciphertext(_) | Item::Pair(..) => false,
                },
                Item::Data(_) | Item::Ciphertext(_) => false,
            },
            Item::Data(_) | Item::Ciphertext(_) => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use dolev_core::{KeyPair, KeySource, SimContext, Standing};

    use super::*;
    use crate::tag::NonceRef;

    struct Fixture {
        ctx: Arc<SimContext>,
        policy: NslPolicy<Arc<SimContext>>,
        alice: PrincipalId,
        bob: PrincipalId,
        mallory: PrincipalId,
        bob_keys: KeyPair,
        alice_keys: KeyPair,
        mallory_keys: KeyPair,
    }

    fn fixture() -> Fixture {
        let ctx = Arc::new(SimContext::new());
        let alice = ctx.spawn_principal(Standing::Good);
        let bob = ctx.spawn_principal(Standing::Good);
        let mallory = ctx.spawn_principal(Standing::Bad);
        let alice_keys =
            ctx.register_long_term_keys(alice, NonceTag::Encryption.to_info()).unwrap();
        let bob_keys = ctx.register_long_term_keys(bob, NonceTag::Encryption.to_info()).unwrap();
        let mallory_keys =
            ctx.register_long_term_keys(mallory, NonceTag::Encryption.to_info()).unwrap();
        let policy = NslPolicy::new(Arc::clone(&ctx));
        Fixture { ctx, policy, alice, bob, mallory, bob_keys, alice_keys, mallory_keys }
    }

    fn initiator_nonce(f: &Fixture, owner: PrincipalId, responder: PrincipalId) -> KeyItem {
        f.ctx
            .create_keypair(owner, NonceTag::InitiatorNonce { responder }.to_info())
            .unwrap()
            .private_key()
            .clone()
    }

    fn responder_nonce(
        f: &Fixture,
        owner: PrincipalId,
        initiator: PrincipalId,
        echoed: &KeyItem,
    ) -> KeyItem {
        let tag = NonceTag::ResponderNonce { initiator, echoed: NonceRef::of(echoed) };
        f.ctx.create_keypair(owner, tag.to_info()).unwrap().private_key().clone()
    }

    #[test]
    fn nonce_for_good_peer_is_secret() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.bob);
        assert!(!f.policy.is_public(&Item::Key(na)));
    }

    #[test]
    fn nonce_for_bad_peer_is_public() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.mallory);
        assert!(f.policy.is_public(&Item::Key(na.clone())));

        let nb = responder_nonce(&f, f.bob, f.mallory, &na);
        assert!(f.policy.is_public(&Item::Key(nb)));
    }

    #[test]
    fn honest_messages_are_public() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.bob);
        let nb = responder_nonce(&f, f.bob, f.alice, &na);

        let m1 = f
            .bob_keys
            .public_key()
            .encrypt(Item::pair(Item::principal(f.alice), Item::Key(na.clone())))
            .unwrap();
        let m2 = f
            .alice_keys
            .public_key()
            .encrypt(Item::pair(
                Item::principal(f.bob),
                Item::pair(Item::Key(na.clone()), Item::Key(nb.clone())),
            ))
            .unwrap();
        let m3 = f.bob_keys.public_key().encrypt(Item::Key(nb.clone())).unwrap();

        assert!(f.policy.is_public(&m1));
        assert!(f.policy.is_public(&m2));
        assert!(f.policy.is_public(&m3));
        assert!(!f.policy.is_public(&Item::Key(na)));
        assert!(!f.policy.is_public(&Item::Key(nb)));
    }

    #[test]
    fn offer_under_wrong_key_is_not_public() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.bob);

        // Sealed for mallory although the nonce was meant for bob.
        let leaked = f
            .mallory_keys
            .public_key()
            .encrypt(Item::pair(Item::principal(f.alice), Item::Key(na)))
            .unwrap();
        assert!(!f.policy.is_public(&leaked));
    }

    #[test]
    fn offer_with_wrong_name_is_not_public() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.bob);
        let forged = f
            .bob_keys
            .public_key()
            .encrypt(Item::pair(Item::principal(f.mallory), Item::Key(na)))
            .unwrap();
        assert!(!f.policy.is_public(&forged));
    }

    #[test]
    fn challenge_for_other_initiator_is_not_public() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.bob);
        let nb = responder_nonce(&f, f.bob, f.alice, &na);

        let misdirected = f
            .mallory_keys
            .public_key()
            .encrypt(Item::pair(
                Item::principal(f.bob),
                Item::pair(Item::Key(na), Item::Key(nb)),
            ))
            .unwrap();
        assert!(!f.policy.is_public(&misdirected));
    }

    #[test]
    fn confirmation_under_other_key_is_not_public() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.bob);
        let nb = responder_nonce(&f, f.bob, f.alice, &na);

        let leaked = f.mallory_keys.public_key().encrypt(Item::Key(nb)).unwrap();
        assert!(!f.policy.is_public(&leaked));
    }

    #[test]
    fn exceptions_require_directory_key() {
        let f = fixture();
        let na = initiator_nonce(&f, f.alice, f.bob);
        let side_keys = f.ctx.create_keypair(f.bob, dolev_core::Info::atom(5)).unwrap();

        let sealed = side_keys
            .public_key()
            .encrypt(Item::pair(Item::principal(f.alice), Item::Key(na)))
            .unwrap();
        assert!(!f.policy.is_public(&sealed));
    }

    #[test]
    fn bad_principal_keys_are_public_whatever_the_tag() {
        let f = fixture();
        let forged_tag = NonceTag::InitiatorNonce { responder: f.bob }.to_info();
        let keys = f.ctx.create_keypair(f.mallory, forged_tag).unwrap();
        assert!(f.policy.is_public(&keys.private_item()));
    }
}
