//! CBOR encoding for items and run artifacts.
//!
//! A real transport carries bitstrings; this is the 1:1 mapping between an
//! [`Item`] and its bytes.

use serde::{Serialize, de::DeserializeOwned};

use crate::{error::CodecError, item::Item};

/// Encode any serializable value as CBOR.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| CodecError::Encode { reason: e.to_string() })?;
    Ok(bytes)
}

/// Decode a CBOR value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode { reason: e.to_string() })
}

/// Encode an item for the wire.
pub fn encode_item(item: &Item) -> Result<Vec<u8>, CodecError> {
    encode(item)
}

/// Decode an item from the wire.
///
/// Decoding never grants publicity: a forged item still has to pass the
/// oracle before it can enter the world.
pub fn decode_item(bytes: &[u8]) -> Result<Item, CodecError> {
    decode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        context::{KeySource, SimContext, Standing},
        item::Info,
    };

    #[test]
    fn nested_item_survives_the_wire() {
        let ctx = SimContext::new();
        let owner = ctx.spawn_principal(Standing::Good);
        let keys = ctx.create_keypair(owner, Info::pair(Info::atom(1), Info::atom(2))).unwrap();
        let item = keys
            .public_key()
            .encrypt(Item::pair(Item::principal(owner), keys.private_item()))
            .unwrap();

        let bytes = encode_item(&item).unwrap();
        assert_eq!(decode_item(&bytes).unwrap(), item);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result = decode_item(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }
}
