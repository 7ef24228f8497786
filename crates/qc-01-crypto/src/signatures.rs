//! Falcon-512 signatures and address derivation.
//!
//! Falcon is a lattice-based (NTRU) post-quantum scheme: ~897-byte public
//! keys, signatures up to ~690 bytes (the scheme compresses, so the exact
//! signature length is not fixed). `verify` is pure and side-effect-free
//! other than the telemetry counters, so callers are free to fan it out
//! across threads via `qc_compute::tasks::signatures::batch_verify`.

use crate::errors::CryptoError;
use crate::hashing::hash;
use pqcrypto_falcon::falcon512;
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as _, SecretKey as _, VerificationError,
};
use shared_types::{build_address, Address, PublicKeyBytes, SignatureBytes};
use zeroize::Zeroize;

/// A generated Falcon-512 keypair. The secret key is zeroized on drop.
pub struct KeyPair {
    secret: falcon512::SecretKey,
    public: falcon512::PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the system RNG.
    pub fn generate() -> Self {
        let (public, secret) = falcon512::keypair();
        Self { secret, public }
    }

    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.public.as_bytes().to_vec())
    }

    pub fn secret_key_bytes(&self) -> Vec<u8> {
        self.secret.as_bytes().to_vec()
    }

    /// Sign `message` with this keypair's secret key.
    ///
    /// Callers are responsible for the stateful-signature discipline: the
    /// chain's consensus rule is that a key, once recorded as used for an
    /// address, may never sign for that address again. This function signs
    /// unconditionally; the rule is enforced in transaction state-validation.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        let sig = falcon512::detached_sign(message, &self.secret);
        SignatureBytes(sig.as_bytes().to_vec())
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        let mut bytes = self.secret.as_bytes().to_vec();
        bytes.zeroize();
    }
}

/// Sign `message` with a raw secret-key encoding.
pub fn sign(secret_key: &[u8], message: &[u8]) -> Result<SignatureBytes, CryptoError> {
    let sk = falcon512::SecretKey::from_bytes(secret_key).map_err(|_| CryptoError::InvalidSecretKey)?;
    let sig = falcon512::detached_sign(message, &sk);
    Ok(SignatureBytes(sig.as_bytes().to_vec()))
}

/// Verify `signature` over `message` under `public_key`. Deterministic and
/// side-effect-free beyond the telemetry counters, so it's safe to call
/// concurrently from multiple threads.
pub fn verify(public_key: &PublicKeyBytes, message: &[u8], signature: &SignatureBytes) -> bool {
    let result = (|| -> Result<(), VerificationError> {
        let pk = falcon512::PublicKey::from_bytes(&public_key.0)
            .map_err(|_| VerificationError::InvalidSignature)?;
        let sig = falcon512::DetachedSignature::from_bytes(&signature.0)
            .map_err(|_| VerificationError::InvalidSignature)?;
        falcon512::verify_detached_signature(&sig, message, &pk)
    })();

    quantum_telemetry::SIGNATURE_VERIFICATIONS.inc();
    if result.is_err() {
        quantum_telemetry::SIGNATURE_FAILURES.inc();
    }
    result.is_ok()
}

/// Derive the on-chain address for a public key: `version_byte ||
/// truncated_hash(public_key)[..20] || checksum`. The version byte encodes
/// which network the address belongs to.
pub fn address_of(public_key: &PublicKeyBytes, version: u8) -> Address {
    let digest = hash(&public_key.0);
    let mut truncated = [0u8; 20];
    truncated.copy_from_slice(&digest[..20]);
    build_address(version, &truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let keypair = KeyPair::generate();
        let message = b"quantum-chain transaction envelope";
        let signature = keypair.sign(message);
        assert!(verify(&keypair.public_key_bytes(), message, &signature));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"original message");
        assert!(!verify(&keypair.public_key_bytes(), b"tampered message", &signature));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let message = b"test";
        let signature = signer.sign(message);
        assert!(!verify(&other.public_key_bytes(), message, &signature));
    }

    #[test]
    fn malformed_public_key_fails_closed() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"test");
        let bad_key = PublicKeyBytes(vec![0u8; 4]);
        assert!(!verify(&bad_key, b"test", &signature));
    }

    #[test]
    fn address_derivation_is_deterministic_and_versioned() {
        let keypair = KeyPair::generate();
        let pk = keypair.public_key_bytes();
        let mainnet = address_of(&pk, Address::VERSION_MAINNET);
        let testnet = address_of(&pk, Address::VERSION_TESTNET);

        assert_eq!(mainnet, address_of(&pk, Address::VERSION_MAINNET));
        assert_ne!(mainnet, testnet);
        assert!(mainnet.checksum_valid());
    }
}
