//! Stateless notary: hashes mutation payloads and produces or verifies a
//! detached Ed25519 signature over that digest.
//!
//! The notary holds no state between calls — no key storage, no session,
//! no cache. Every operation takes whatever keys it needs as arguments and
//! returns a plain value.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotaryError {
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
}

pub type Result<T> = std::result::Result<T, NotaryError>;

/// SHA-256 digest of a mutation payload.
pub fn hash(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// Sign the digest of `payload` with `private_key`. The notary signs the
/// hash, not the raw payload, so the signature's fixed size is independent
/// of mutation size.
pub fn sign(payload: &[u8], private_key: &SigningKey) -> Signature {
    private_key.sign(&hash(payload))
}

/// Verify that `signature` is a valid Ed25519 signature over the digest of
/// `payload` under `public_key`. Never propagates a verification error —
/// any failure (malformed signature, wrong key, tampered payload) collapses
/// to `false`.
pub fn verify(payload: &[u8], signature: &Signature, public_key: &VerifyingKey) -> bool {
    public_key.verify(&hash(payload), signature).is_ok()
}

/// Verify a hex-encoded detached signature, as carried on the wire (e.g. the
/// `--sig` argument of an approval command).
pub fn verify_hex(payload: &[u8], signature_hex: &str, public_key_hex: &str) -> Result<bool> {
    let sig_bytes = hex::decode(signature_hex)
        .map_err(|e| NotaryError::InvalidSignature(e.to_string()))?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| NotaryError::InvalidSignature("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_array);

    let key_bytes = hex::decode(public_key_hex)
        .map_err(|e| NotaryError::InvalidPublicKey(e.to_string()))?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| NotaryError::InvalidPublicKey("public key must be 32 bytes".into()))?;
    let public_key = VerifyingKey::from_bytes(&key_array)
        .map_err(|e| NotaryError::InvalidPublicKey(e.to_string()))?;

    Ok(verify(payload, &signature, &public_key))
}

/// Generate a fresh Ed25519 keypair. Used by administrators provisioning an
/// `ADMIN_PUBLIC_KEY`, and by tests.
pub fn keypair() -> (VerifyingKey, SigningKey) {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    (signing_key.verifying_key(), signing_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_own_signature() {
        let (vk, sk) = keypair();
        let payload = b"mutation payload";
        let sig = sign(payload, &sk);
        assert!(verify(payload, &sig, &vk));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let (vk, sk) = keypair();
        let sig = sign(b"original", &sk);
        assert!(!verify(b"tampered", &sig, &vk));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (_, sk) = keypair();
        let (other_vk, _) = keypair();
        let payload = b"mutation payload";
        let sig = sign(payload, &sk);
        assert!(!verify(payload, &sig, &other_vk));
    }

    #[test]
    fn hash_is_deterministic_and_sensitive_to_input() {
        assert_eq!(hash(b"abc"), hash(b"abc"));
        assert_ne!(hash(b"abc"), hash(b"abd"));
    }

    #[test]
    fn verify_hex_round_trips() {
        let (vk, sk) = keypair();
        let payload = b"hex round trip";
        let sig = sign(payload, &sk);
        let sig_hex = hex::encode(sig.to_bytes());
        let key_hex = hex::encode(vk.to_bytes());
        assert!(verify_hex(payload, &sig_hex, &key_hex).unwrap());
    }

    #[test]
    fn verify_hex_rejects_malformed_signature() {
        let (_, sk) = keypair();
        let (vk, _) = keypair();
        let _ = sign(b"x", &sk);
        let key_hex = hex::encode(vk.to_bytes());
        assert!(verify_hex(b"x", "not-hex", &key_hex).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn signature_completeness(payload in proptest::collection::vec(any::<u8>(), 0..256),
                                   other in proptest::collection::vec(any::<u8>(), 0..256)) {
            let (vk, sk) = keypair();
            let sig = sign(&payload, &sk);
            prop_assert!(verify(&payload, &sig, &vk));
            if other != payload {
                prop_assert!(!verify(&other, &sig, &vk));
            }
        }
    }
}
