//! Key tagging scheme of the handshake.
//!
//! Every keypair an honest party creates carries a [`NonceTag`] encoded into
//! its opaque [`Info`]. The publicity policy decodes the tag to learn who a
//! nonce was meant for. Tags the adversary invents decode to `None`.
//!
//! ```text
//! Encryption                    (0, 0)
//! InitiatorNonce{r}             (1, r)
//! ResponderNonce{i, echoed}     (2, (i, (creator, (key_id, (direction, info)))))
//! ```

use dolev_core::{Info, KeyDirection, KeyId, KeyItem, PrincipalId};
use serde::{Deserialize, Serialize};

const ENCRYPTION: u64 = 0;
const INITIATOR_NONCE: u64 = 1;
const RESPONDER_NONCE: u64 = 2;

/// Full identity of a received nonce, embedded in the responder's tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonceRef {
    /// Creator of the echoed nonce.
    pub creator: PrincipalId,
    /// Key id of the echoed nonce.
    pub key_id: KeyId,
    /// Direction of the echoed nonce.
    pub direction: KeyDirection,
    /// Raw tag of the echoed nonce.
    pub info: Info,
}

impl NonceRef {
    /// Reference to `key`.
    pub fn of(key: &KeyItem) -> Self {
        Self {
            creator: key.creator(),
            key_id: key.key_id(),
            direction: key.direction(),
            info: key.info().clone(),
        }
    }

    /// True if `key` is exactly the referenced key.
    pub fn matches(&self, key: &KeyItem) -> bool {
        self.creator == key.creator()
            && self.key_id == key.key_id()
            && self.direction == key.direction()
            && &self.info == key.info()
    }
}

/// Protocol meaning of a keypair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NonceTag {
    /// Long-term directory keypair.
    Encryption,
    /// Initiator nonce meant for `responder`.
    InitiatorNonce {
        /// Intended responder.
        responder: PrincipalId,
    },
    /// Responder nonce minted in reply to `echoed`, claimed to be from
    /// `initiator`.
    ResponderNonce {
        /// Claimed initiator.
        initiator: PrincipalId,
        /// The initiator nonce the responder received.
        echoed: NonceRef,
    },
}

impl NonceTag {
    /// Encode into an opaque tag.
    pub fn to_info(&self) -> Info {
        match self {
            Self::Encryption => Info::pair(Info::atom(ENCRYPTION), Info::atom(0)),
            Self::InitiatorNonce { responder } => {
                Info::pair(Info::atom(INITIATOR_NONCE), Info::atom(responder.as_u64()))
            },
            Self::ResponderNonce { initiator, echoed } => {
                let direction = match echoed.direction {
                    KeyDirection::Private => 0,
                    KeyDirection::Public => 1,
                };
                let nonce = Info::pair(
                    Info::atom(echoed.creator.as_u64()),
                    Info::pair(
                        Info::atom(echoed.key_id.as_u64()),
                        Info::pair(Info::atom(direction), echoed.info.clone()),
                    ),
                );
                Info::pair(
                    Info::atom(RESPONDER_NONCE),
                    Info::pair(Info::atom(initiator.as_u64()), nonce),
                )
            },
        }
    }

    /// Decode an opaque tag. `None` for tags outside the scheme.
    pub fn from_info(info: &Info) -> Option<Self> {
        let (kind, body) = info.as_pair()?;
        match kind.as_atom()? {
            ENCRYPTION => (body.as_atom()? == 0).then_some(Self::Encryption),
            INITIATOR_NONCE => {
                Some(Self::InitiatorNonce { responder: PrincipalId::new(body.as_atom()?) })
            },
            RESPONDER_NONCE => {
                let (initiator, nonce) = body.as_pair()?;
                let (creator, rest) = nonce.as_pair()?;
                let (key_id, rest) = rest.as_pair()?;
                let (direction, echoed_info) = rest.as_pair()?;
                let direction = match direction.as_atom()? {
                    0 => KeyDirection::Private,
                    1 => KeyDirection::Public,
                    _ => return None,
                };

                Some(Self::ResponderNonce {
                    initiator: PrincipalId::new(initiator.as_atom()?),
                    echoed: NonceRef {
                        creator: PrincipalId::new(creator.as_atom()?),
                        key_id: KeyId::new(key_id.as_atom()?),
                        direction,
                        info: echoed_info.clone(),
                    },
                })
            },
            _ => None,
        }
    }

    /// Decode the tag carried by `key`.
    pub fn of(key: &KeyItem) -> Option<Self> {
        Self::from_info(key.info())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dolev_core::{KeySource, SimContext, Standing};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encryption_tag_decodes() {
        let info = NonceTag::Encryption.to_info();
        assert_eq!(NonceTag::from_info(&info), Some(NonceTag::Encryption));
    }

    #[test]
    fn responder_tag_decodes_with_nested_info() {
        let ctx = SimContext::new();
        let alice = ctx.spawn_principal(Standing::Good);
        let bob = ctx.spawn_principal(Standing::Good);
        let nonce = ctx
            .create_keypair(alice, NonceTag::InitiatorNonce { responder: bob }.to_info())
            .unwrap();

        let tag = NonceTag::ResponderNonce {
            initiator: alice,
            echoed: NonceRef::of(nonce.private_key()),
        };
        let decoded = NonceTag::from_info(&tag.to_info()).unwrap();
        assert_eq!(decoded, tag);

        let NonceTag::ResponderNonce { echoed, .. } = decoded else {
            unreachable!("decoded responder tag");
        };
        assert!(echoed.matches(nonce.private_key()));
        assert!(!echoed.matches(nonce.public_key()));
        assert_eq!(
            NonceTag::from_info(&echoed.info),
            Some(NonceTag::InitiatorNonce { responder: bob })
        );
    }

    #[test]
    fn foreign_tags_have_no_meaning() {
        assert_eq!(NonceTag::from_info(&Info::atom(0)), None);
        assert_eq!(NonceTag::from_info(&Info::pair(Info::atom(0), Info::atom(7))), None);
        assert_eq!(NonceTag::from_info(&Info::pair(Info::atom(9), Info::atom(0))), None);
        assert_eq!(
            NonceTag::from_info(&Info::pair(
                Info::atom(1),
                Info::pair(Info::atom(0), Info::atom(0))
            )),
            None
        );
        assert_eq!(
            NonceTag::from_info(&Info::pair(Info::atom(2), Info::atom(3))),
            None
        );
    }

    fn info_strategy() -> impl Strategy<Value = Info> {
        (0u64..4).prop_map(Info::atom).prop_recursive(5, 16, 2, |inner| {
            (inner.clone(), inner).prop_map(|(left, right)| Info::pair(left, right))
        })
    }

    proptest! {
        /// A tag means at most one thing: decoding only accepts the canonical
        /// encoding of what it returns.
        #[test]
        fn decoding_is_canonical(info in info_strategy()) {
            if let Some(tag) = NonceTag::from_info(&info) {
                prop_assert_eq!(tag.to_info(), info);
            }
        }
    }
}
