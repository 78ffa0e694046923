//! DM end-to-end encryption (§4.6). Not adapted from the teacher — it
//! has no client-side key-agreement analog — but built against the
//! same three crates the wider example pack reaches for when doing
//! X25519 DM encryption (`nisarsyed-openconv`, `TrustEdge-Labs-trustedge`
//! in `examples/other_examples/manifests/`): `x25519-dalek`, `hkdf`, and
//! `aes-gcm`, used the way their own `Cargo.toml`s pull them in.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha512;
use superchat_common::{ChannelId, SuperchatError};
use x25519_dalek::{PublicKey, StaticSecret};

/// Pinned in `dm.hkdf_salt` (`config.rs`); §4.6 step 4.
const HKDF_SALT: &[u8] = b"superchat-dm-v1";

/// The seven low-order points on Curve25519 (RFC 7748 / libsodium's
/// blocklist). A peer key equal to one of these collapses the shared
/// secret to a small-order value regardless of our own secret, so we
/// refuse to agree on it (§4.6 "reject known low-order points").
const LOW_ORDER_POINTS: [[u8; 32]; 7] = [
    [0; 32],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [
        0xe0, 0xeb, 0x7a, 0x7c, 0x3b, 0x41, 0xb8, 0xae, 0x16, 0x56, 0xe3, 0xfa, 0xf1, 0x9f, 0xc4,
        0x6a, 0xda, 0x09, 0x8d, 0xeb, 0x9c, 0x32, 0xb1, 0xfd, 0x86, 0x62, 0x05, 0x16, 0x5f, 0x49,
        0xb8, 0x00,
    ],
    [
        0x5f, 0x9c, 0x95, 0xbc, 0xa3, 0x50, 0x8c, 0x24, 0xb1, 0xd0, 0xb1, 0x55, 0x9c, 0x83, 0xef,
        0x5b, 0x04, 0x44, 0x5c, 0xc4, 0x58, 0x1c, 0x8e, 0x86, 0xd8, 0x22, 0x4e, 0xdd, 0xd0, 0x9f,
        0x11, 0x57,
    ],
    [
        0xec, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    [
        0xed, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff,
    ],
    [
        0xee, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
];

fn reject_low_order(peer_public: &[u8; 32]) -> Result<(), SuperchatError> {
    if LOW_ORDER_POINTS.iter().any(|p| p == peer_public) {
        return Err(SuperchatError::InvalidMessage(
            "peer public key is a low-order point".to_owned(),
        ));
    }
    Ok(())
}

/// A freshly generated session keypair, held for the lifetime of one DM
/// handshake (§4.6 step 1: "ephemeral, never persisted").
pub struct EphemeralKeypair {
    secret: StaticSecret,
    pub public: [u8; 32],
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        // Built from raw bytes rather than `StaticSecret::random_from_rng`
        // to avoid pinning this crate to whichever `rand_core` version
        // `x25519-dalek` vendors internally.
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret).to_bytes();
        Self { secret, public }
    }

    /// Performs the X25519 agreement and HKDF-SHA512 expansion into a
    /// 32-byte AES-256-GCM key (§4.6 step 4: salt = `dm.hkdf_salt`,
    /// info = the channel id as 8 big-endian bytes).
    pub fn derive_shared_key(
        &self,
        peer_public: [u8; 32],
        channel_id: ChannelId,
    ) -> Result<[u8; 32], SuperchatError> {
        reject_low_order(&peer_public)?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(peer_public));
        if shared.as_bytes().iter().all(|b| *b == 0) {
            return Err(SuperchatError::InvalidMessage(
                "shared secret collapsed to zero".to_owned(),
            ));
        }
        let hk = Hkdf::<Sha512>::new(Some(HKDF_SALT), shared.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(&channel_id.to_be_bytes(), &mut key)
            .map_err(|_| SuperchatError::Internal(anyhow::anyhow!("hkdf expand: invalid length")))?;
        Ok(key)
    }
}

/// Encrypts `plaintext` under `key`, producing `nonce(12) ‖ ciphertext ‖ tag(16)`
/// (§4.6 step 5's wire layout for an encrypted `PostMessage`/`NewMessage` body).
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, SuperchatError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| SuperchatError::Internal(anyhow::anyhow!("aes key: {e}")))?;
    let mut nonce_bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
        .map_err(|e| SuperchatError::Internal(anyhow::anyhow!("aes-gcm encrypt: {e}")))?;
    let mut out = Vec::with_capacity(12 + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of [`encrypt`]; returns [`SuperchatError::InvalidMessage`] on
/// a bad tag (tampered or wrong key) rather than leaking AES internals.
pub fn decrypt(key: &[u8; 32], framed: &[u8]) -> Result<Vec<u8>, SuperchatError> {
    if framed.len() < 12 + 16 {
        return Err(SuperchatError::InvalidMessage("DM payload too short".to_owned()));
    }
    let (nonce_bytes, ciphertext) = framed.split_at(12);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| SuperchatError::Internal(anyhow::anyhow!("aes key: {e}")))?;
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| SuperchatError::InvalidMessage("DM decryption failed".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_round_trip_derives_matching_keys() {
        let alice = EphemeralKeypair::generate();
        let bob = EphemeralKeypair::generate();
        let k1 = alice.derive_shared_key(bob.public, 42).unwrap();
        let k2 = bob.derive_shared_key(alice.public, 42).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_channel_ids_derive_different_keys() {
        let alice = EphemeralKeypair::generate();
        let bob = EphemeralKeypair::generate();
        let k1 = alice.derive_shared_key(bob.public, 1).unwrap();
        let k2 = alice.derive_shared_key(bob.public, 2).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn low_order_point_is_rejected() {
        let alice = EphemeralKeypair::generate();
        assert!(alice.derive_shared_key([0u8; 32], 1).is_err());
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = [7u8; 32];
        let plaintext = b"hello from a dm";
        let framed = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &framed).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let key = [7u8; 32];
        let mut framed = encrypt(&key, b"hello").unwrap();
        let last = framed.len() - 1;
        framed[last] ^= 0xff;
        assert!(decrypt(&key, &framed).is_err());
    }
}
