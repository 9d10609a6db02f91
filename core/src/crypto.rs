//! Ed25519 signing and verification.
//!
//! This is the only variant supported: the source this spec is distilled
//! from carried a second, RSA-keyed code path, treated here as legacy and
//! deliberately not reimplemented (see `DESIGN.md`).

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer};
use rand::rngs::OsRng;

/// Raw 32-byte Ed25519 seed (the private half of a keypair).
pub type SecretSeed = [u8; 32];
/// Raw 32-byte Ed25519 public key.
pub type PublicKeyBytes = [u8; 32];

/// Generates a fresh Ed25519 keypair.
///
/// Returns `(seed, public_key)`; the seed is the 32-byte `SecretKey`
/// encoding, not a signature itself.
pub fn generate() -> (SecretSeed, PublicKeyBytes) {
    let mut csprng = OsRng {};
    let keypair = Keypair::generate(&mut csprng);
    let mut seed = [0u8; 32];
    seed.copy_from_slice(keypair.secret.as_bytes());
    let mut public = [0u8; 32];
    public.copy_from_slice(keypair.public.as_bytes());
    (seed, public)
}

/// Signs `msg` with the key derived from `seed`.
///
/// Deterministic per the Ed25519 spec: signing the same message twice with
/// the same seed yields the same signature.
pub fn sign(msg: &[u8], seed: &SecretSeed) -> Vec<u8> {
    let secret = SecretKey::from_bytes(seed).expect("seed is a valid 32-byte secret key");
    let public = PublicKey::from(&secret);
    let keypair = Keypair { secret, public };
    keypair.sign(msg).to_bytes().to_vec()
}

/// Verifies `sig` over `msg` against `public`.
///
/// Malformed key or signature bytes surface as `false`, never a panic.
pub fn verify(msg: &[u8], sig: &[u8], public: &PublicKeyBytes) -> bool {
    let public = match PublicKey::from_bytes(public) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let signature = match Signature::from_bytes(sig) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    public.verify_strict(msg, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let (seed, public) = generate();
        let msg = b"transfer 40 from A to B";
        let sig = sign(msg, &seed);
        assert!(verify(msg, &sig, &public));
    }

    #[test]
    fn sign_is_deterministic() {
        let (seed, _public) = generate();
        let msg = b"same message twice";
        assert_eq!(sign(msg, &seed), sign(msg, &seed));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let (seed, public) = generate();
        let sig = sign(b"original", &seed);
        assert!(!verify(b"tampered", &sig, &public));
    }

    #[test]
    fn verify_rejects_garbage_key_without_panicking() {
        let sig = vec![0u8; 64];
        assert!(!verify(b"anything", &sig, &[0u8; 32]));
    }
}
