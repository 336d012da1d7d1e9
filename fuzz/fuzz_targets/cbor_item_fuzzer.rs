//! Fuzz target for item decoding.
//!
//! Decoding must never grant publicity: any item that decodes still has to
//! pass the oracle, and the world either admits it or refuses it without
//! changing.
//!
//! # Invariants
//!
//! - NEVER panic on malformed CBOR
//! - Decoded items re-encode to an equal item
//! - The world admits a decoded item iff the oracle calls it public

#![no_main]

use std::sync::Arc;

use dolev_core::{
    ChannelError, Publicity, SimContext, Standing, World, decode_item, encode_item,
};
use dolev_handshake::{NonceTag, NslPolicy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(item) = decode_item(data) else { return };

    let bytes = encode_item(&item).unwrap_or_else(|err| panic!("re-encode failed: {err}"));
    assert_eq!(decode_item(&bytes).ok(), Some(item.clone()));

    let ctx = Arc::new(SimContext::new());
    for standing in [Standing::Good, Standing::Good, Standing::Bad] {
        let id = ctx.spawn_principal(standing);
        if let Err(err) = ctx.register_long_term_keys(id, NonceTag::Encryption.to_info()) {
            panic!("setup failed: {err}");
        }
    }

    let world = World::new(NslPolicy::new(Arc::clone(&ctx)));
    let public = world.policy().is_public(&item);
    match world.send(item) {
        Ok(_) => assert!(public),
        Err(ChannelError::PolicyViolation { .. }) => {
            assert!(!public);
            assert!(world.is_empty());
        },
        Err(err) => panic!("unexpected channel error: {err}"),
    }
});
