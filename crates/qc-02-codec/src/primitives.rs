//! `Encode`/`Decode` impls for the identity types every record embeds.

use crate::{CodecResult, Encode, Reader, Writer};
use shared_types::{Address, PublicKeyBytes, SignatureBytes};

/// A 32-byte content hash, encoded as a fixed-width field (no length
/// prefix: its size is part of the schema, not the data).
impl Encode for [u8; 32] {
    fn encode(&self, w: &mut Writer) {
        w.fixed_bytes(self);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        r.fixed_bytes::<32>()
    }
}

impl Encode for Address {
    fn encode(&self, w: &mut Writer) {
        w.fixed_bytes(&self.0);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Address(r.fixed_bytes::<25>()?))
    }
}

impl Encode for PublicKeyBytes {
    fn encode(&self, w: &mut Writer) {
        w.var_bytes(&self.0);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(PublicKeyBytes(r.var_bytes()?))
    }
}

impl Encode for SignatureBytes {
    fn encode(&self, w: &mut Writer) {
        w.var_bytes(&self.0);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(SignatureBytes(r.var_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trips() {
        let addr = Address([7u8; 25]);
        let encoded = addr.encode_to_vec();
        assert_eq!(Address::decode_from_slice(&encoded).unwrap(), addr);
    }

    #[test]
    fn public_key_round_trips() {
        let pk = PublicKeyBytes(vec![1, 2, 3, 4, 5]);
        let encoded = pk.encode_to_vec();
        assert_eq!(PublicKeyBytes::decode_from_slice(&encoded).unwrap(), pk);
    }
}
