//! Symbolic item algebra.
//!
//! An [`Item`] stands in for a bitstring sent over the network. Equality is
//! purely structural, which encodes the perfect-cryptography assumption:
//! two keys are equal iff they come from the same keypair half, and a
//! ciphertext can only be opened by the private half of the keypair it was
//! sealed for.
//!
//! Keys can only be minted through [`crate::SimContext`], which guarantees
//! that `(creator, key_id)` is never reused.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AlgebraError;

/// Globally unique principal identifier, assigned at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct PrincipalId(u64);

impl PrincipalId {
    /// Wrap a raw principal number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw principal number.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Per-principal key number. The Nth keypair created by a principal has id N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(u64);

impl KeyId {
    /// Wrap a raw key number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw key number.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k{}", self.0)
    }
}

/// Opaque provenance tag attached to a keypair.
///
/// The core never interprets tags. Protocols encode their own tagging scheme
/// into atoms and pairs and the publicity oracle decodes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Info {
    /// A single number.
    Atom(u64),
    /// Two nested tags.
    Pair(Box<Info>, Box<Info>),
}

impl Info {
    /// Build an atom tag.
    pub const fn atom(value: u64) -> Self {
        Self::Atom(value)
    }

    /// Build a pair tag.
    pub fn pair(left: Self, right: Self) -> Self {
        Self::Pair(Box::new(left), Box::new(right))
    }

    /// The atom value, if this tag is an atom.
    pub fn as_atom(&self) -> Option<u64> {
        match self {
            Self::Atom(value) => Some(*value),
            Self::Pair(..) => None,
        }
    }

    /// Both halves, if this tag is a pair.
    pub fn as_pair(&self) -> Option<(&Self, &Self)> {
        match self {
            Self::Pair(left, right) => Some((left, right)),
            Self::Atom(_) => None,
        }
    }
}

/// Which half of a keypair a key is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyDirection {
    /// Encryption half.
    Public,
    /// Decryption half.
    Private,
}

impl fmt::Display for KeyDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

/// One half of an asymmetric keypair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyItem {
    creator: PrincipalId,
    key_id: KeyId,
    is_public: bool,
    info: Info,
}

impl KeyItem {
    /// Principal that generated the keypair.
    pub fn creator(&self) -> PrincipalId {
        self.creator
    }

    /// Keypair number within the creator's keys.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// True for the encryption half.
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Direction of this half.
    pub fn direction(&self) -> KeyDirection {
        if self.is_public { KeyDirection::Public } else { KeyDirection::Private }
    }

    /// Provenance tag of the keypair.
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// `(creator, key_id)`: uniquely identifies the keypair.
    pub fn identity(&self) -> (PrincipalId, KeyId) {
        (self.creator, self.key_id)
    }

    /// Seal `payload` under this key.
    ///
    /// Fails with [`AlgebraError::WrongKeyDirection`] on a private half.
    pub fn encrypt(&self, payload: Item) -> Result<Item, AlgebraError> {
        if !self.is_public {
            return Err(AlgebraError::WrongKeyDirection { expected: KeyDirection::Public });
        }

        Ok(Item::Ciphertext(Ciphertext {
            key_creator: self.creator,
            key_id: self.key_id,
            key_info: self.info.clone(),
            payload: Box::new(payload),
        }))
    }

    /// Open `item` with this key.
    ///
    /// The key must be a private half, `item` must be a ciphertext, and the
    /// ciphertext must have been sealed under the public half of this very
    /// keypair.
    pub fn decrypt(&self, item: &Item) -> Result<Item, AlgebraError> {
        if self.is_public {
            return Err(AlgebraError::WrongKeyDirection { expected: KeyDirection::Private });
        }

        let sealed = item.as_ciphertext()?;
        if !sealed.opens_with(self) {
            return Err(AlgebraError::KeyMismatch {
                sealed_creator: sealed.key_creator,
                sealed_key: sealed.key_id,
                key_creator: self.creator,
                key_id: self.key_id,
            });
        }

        Ok(sealed.payload.as_ref().clone())
    }

    /// True if [`decrypt`](Self::decrypt) would open `item`.
    pub fn opens(&self, item: &Item) -> bool {
        matches!(item, Item::Ciphertext(sealed) if sealed.opens_with(self))
    }
}

/// Payload sealed under the public half of keypair `(key_creator, key_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ciphertext {
    key_creator: PrincipalId,
    key_id: KeyId,
    key_info: Info,
    payload: Box<Item>,
}

impl Ciphertext {
    /// Creator of the sealing keypair.
    pub fn key_creator(&self) -> PrincipalId {
        self.key_creator
    }

    /// Id of the sealing keypair.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Tag of the sealing keypair.
    pub fn key_info(&self) -> &Info {
        &self.key_info
    }

    /// The sealed payload.
    ///
    /// Only the oracle and the algebra look inside; participants must go
    /// through [`KeyItem::decrypt`].
    pub fn payload(&self) -> &Item {
        &self.payload
    }

    fn opens_with(&self, key: &KeyItem) -> bool {
        !key.is_public
            && key.creator == self.key_creator
            && key.key_id == self.key_id
            && key.info == self.key_info
    }
}

/// Variant name of an [`Item`], used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemShape {
    /// [`Item::Key`]
    Key,
    /// [`Item::Data`]
    Data,
    /// [`Item::Ciphertext`]
    Ciphertext,
    /// [`Item::Pair`]
    Pair,
}

impl fmt::Display for ItemShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Key => "key",
            Self::Data => "data",
            Self::Ciphertext => "ciphertext",
            Self::Pair => "pair",
        };
        f.write_str(name)
    }
}

/// A symbolic network value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Item {
    /// One half of a keypair.
    Key(KeyItem),
    /// Atomic payload.
    Data(u64),
    /// Sealed payload.
    Ciphertext(Ciphertext),
    /// Two items.
    Pair(Box<Item>, Box<Item>),
}

impl Item {
    /// Atomic data item.
    pub const fn data(value: u64) -> Self {
        Self::Data(value)
    }

    /// Data item carrying a principal's name.
    pub const fn principal(id: PrincipalId) -> Self {
        Self::Data(id.as_u64())
    }

    /// Pair two items.
    pub fn pair(first: Self, second: Self) -> Self {
        Self::Pair(Box::new(first), Box::new(second))
    }

    /// Seal `payload` under `key`, which must be a public key item.
    pub fn encrypt(key: &Self, payload: Self) -> Result<Self, AlgebraError> {
        key.as_key()?.encrypt(payload)
    }

    /// Open `sealed` with `key`, which must be the matching private key item.
    pub fn decrypt(key: &Self, sealed: &Self) -> Result<Self, AlgebraError> {
        key.as_key()?.decrypt(sealed)
    }

    /// Variant of this item.
    pub fn shape(&self) -> ItemShape {
        match self {
            Self::Key(_) => ItemShape::Key,
            Self::Data(_) => ItemShape::Data,
            Self::Ciphertext(_) => ItemShape::Ciphertext,
            Self::Pair(..) => ItemShape::Pair,
        }
    }

    /// The key, if this is a key item.
    pub fn as_key(&self) -> Result<&KeyItem, AlgebraError> {
        match self {
            Self::Key(key) => Ok(key),
            Self::Data(_) | Self::Ciphertext(_) | Self::Pair(..) => {
                Err(self.mismatch(ItemShape::Key))
            },
        }
    }

    /// The value, if this is a data item.
    pub fn as_data(&self) -> Result<u64, AlgebraError> {
        match self {
            Self::Data(value) => Ok(*value),
            Self::Key(_) | Self::Ciphertext(_) | Self::Pair(..) => {
                Err(self.mismatch(ItemShape::Data))
            },
        }
    }

    /// The ciphertext, if this is one.
    pub fn as_ciphertext(&self) -> Result<&Ciphertext, AlgebraError> {
        match self {
            Self::Ciphertext(sealed) => Ok(sealed),
            Self::Key(_) | Self::Data(_) | Self::Pair(..) => {
                Err(self.mismatch(ItemShape::Ciphertext))
            },
        }
    }

    /// Both components, if this is a pair.
    pub fn split(&self) -> Result<(&Self, &Self), AlgebraError> {
        match self {
            Self::Pair(first, second) => Ok((first, second)),
            Self::Key(_) | Self::Data(_) | Self::Ciphertext(_) => {
                Err(self.mismatch(ItemShape::Pair))
            },
        }
    }

    /// First component of a pair.
    pub fn first(&self) -> Result<&Self, AlgebraError> {
        self.split().map(|(first, _)| first)
    }

    /// Second component of a pair.
    pub fn second(&self) -> Result<&Self, AlgebraError> {
        self.split().map(|(_, second)| second)
    }

    fn mismatch(&self, expected: ItemShape) -> AlgebraError {
        AlgebraError::ShapeMismatch { expected, found: self.shape() }
    }
}

/// Both halves of a freshly generated keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    public: KeyItem,
    private: KeyItem,
}

impl KeyPair {
    /// Only [`crate::SimContext`] mints keypairs, so ids are never reused.
    pub(crate) fn new(creator: PrincipalId, key_id: KeyId, info: Info) -> Self {
        let public = KeyItem { creator, key_id, is_public: true, info: info.clone() };
        let private = KeyItem { creator, key_id, is_public: false, info };
        Self { public, private }
    }

    /// Encryption half.
    pub fn public_key(&self) -> &KeyItem {
        &self.public
    }

    /// Decryption half.
    pub fn private_key(&self) -> &KeyItem {
        &self.private
    }

    /// Encryption half as a sendable item.
    pub fn public_item(&self) -> Item {
        Item::Key(self.public.clone())
    }

    /// Decryption half as a sendable item.
    pub fn private_item(&self) -> Item {
        Item::Key(self.private.clone())
    }

    /// `(creator, key_id)` of the pair.
    pub fn identity(&self) -> (PrincipalId, KeyId) {
        self.public.identity()
    }
}
