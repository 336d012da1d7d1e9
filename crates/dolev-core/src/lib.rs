//! Dolev-Yao Core
//!
//! Symbolic building blocks for checking protocol integrity against an
//! adversary that controls the network.
//!
//! # Model
//!
//! Values crossing the network are not bitstrings but structured [`Item`]s:
//! keys, data, pairs and ciphertexts. Key generation is collision-free and
//! encryption is perfect, so the only way to learn a payload is to hold the
//! matching private key.
//!
//! Every item that enters the shared [`World`] must satisfy the publicity
//! oracle ([`Publicity`]). Honest parties and the adversary go through the
//! same gate, so the oracle is the single security policy of a model.
//!
//! # Components
//!
//! - [`item`]: The item algebra (constructors, destructors, encryption)
//! - [`context`]: Principal standing, key counters and the key directory
//! - [`policy`]: The publicity oracle trait
//! - [`world`]: The append-only channel shared by all participants
//! - [`env`]: Randomness source for nondeterministic choice
//! - [`codec`]: CBOR encoding of items and reports

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod context;
pub mod env;
pub mod error;
pub mod item;
pub mod policy;
pub mod world;

pub use codec::{decode, decode_item, encode, encode_item};
pub use context::{Directory, KeySource, SimContext, Standing, Standings};
pub use env::Environment;
pub use error::{AlgebraError, ChannelError, CodecError, ContextError};
pub use item::{
    Ciphertext, Info, Item, ItemShape, KeyDirection, KeyId, KeyItem, KeyPair, PrincipalId,
};
pub use policy::{BaselinePolicy, Publicity};
pub use world::{Admission, World};
