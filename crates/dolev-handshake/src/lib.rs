//! Needham-Schroeder-Lowe Handshake
//!
//! Mutual authentication of two principals over an adversary-controlled
//! [`World`](dolev_core::World):
//!
//! ```text
//! 1. A -> B: {A, NA}_K(B)
//! 2. B -> A: {B, NA, NB}_K(A)
//! 3. A -> B: {NB}_K(B)
//! ```
//!
//! Nonces are fresh private keys, so the algebra's collision-free key
//! generation is their freshness. On success both sides hold `(NA, NB)`.
//!
//! # Components
//!
//! - [`Initiator`]: Sans-IO state machine for the `A` side
//! - [`Responder`]: Sans-IO state machine serving many `B` sessions
//! - [`NslPolicy`]: The publicity oracle for this protocol
//! - [`NonceTag`]: How keypairs record who a nonce is meant for
//!
//! The state machines never touch the world. They return [`SessionAction`]s
//! and the caller publishes the items, which keeps every interleaving under
//! the caller's control.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod event;
pub mod initiator;
pub mod policy;
pub mod responder;
pub mod tag;

pub use error::{Mismatch, SessionError};
pub use event::{Credentials, SessionAction, SessionId, SessionKeys};
pub use initiator::{Initiator, InitiatorState};
pub use policy::NslPolicy;
pub use responder::{Responder, ResponderState};
pub use tag::{NonceRef, NonceTag};
