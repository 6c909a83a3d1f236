//! AES-256-GCM and ChaCha20-Poly1305 AEAD sealing with HKDF key derivation
//!
//! Sealed layout: `[cipher id: 1 byte][nonce: 12 bytes][ciphertext + 16-byte tag]`.
//! The cipher id travels with the sealed bytes so decode needs only a secret,
//! never the cipher choice. A fresh random nonce per call means repeated
//! encryptions of identical plaintext never produce identical output.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{SlugError, SlugResult};

const NONCE_LEN: usize = 12;

/// 256-bit (32-byte) encryption key
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey(pub [u8; 32]);

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

/// AEAD cipher selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EncryptionAlgorithm {
    /// AES-256-GCM — hardware accelerated on x86 with AES-NI
    #[default]
    AesGcm256,
    /// ChaCha20-Poly1305 — constant-time, fast on non-AES hardware
    ChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    fn wire_id(&self) -> u8 {
        match self {
            EncryptionAlgorithm::AesGcm256 => 1,
            EncryptionAlgorithm::ChaCha20Poly1305 => 2,
        }
    }

    fn from_wire_id(id: u8) -> SlugResult<Self> {
        match id {
            1 => Ok(EncryptionAlgorithm::AesGcm256),
            2 => Ok(EncryptionAlgorithm::ChaCha20Poly1305),
            other => Err(SlugError::CorruptPayload(format!(
                "unknown cipher id {other}"
            ))),
        }
    }
}

/// Derive a key from a caller-supplied password using HKDF-SHA256.
/// Deterministic: the same password always yields the same key.
pub fn derive_password_key(password: &str) -> EncryptionKey {
    let hk = Hkdf::<Sha256>::new(None, password.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(b"slugstore-password-key", &mut okm)
        .expect("HKDF expand failed");
    EncryptionKey(okm)
}

/// Generate a cryptographically random 12-byte nonce
fn random_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Seal plaintext with the given key. A random nonce is generated and
/// embedded in the output together with the cipher id.
pub fn seal(
    plaintext: &[u8],
    key: &EncryptionKey,
    algo: EncryptionAlgorithm,
) -> SlugResult<Vec<u8>> {
    let nonce = random_nonce();
    let ciphertext = match algo {
        EncryptionAlgorithm::AesGcm256 => {
            let cipher = Aes256Gcm::new_from_slice(&key.0)
                .map_err(|e| SlugError::EncryptionFailed(e.to_string()))?;
            let n = aes_gcm::Nonce::from_slice(&nonce);
            cipher
                .encrypt(n, plaintext)
                .map_err(|e| SlugError::EncryptionFailed(e.to_string()))?
        }
        EncryptionAlgorithm::ChaCha20Poly1305 => {
            use chacha20poly1305::aead::Aead as _;
            use chacha20poly1305::KeyInit as _;
            let cipher = ChaCha20Poly1305::new_from_slice(&key.0)
                .map_err(|e| SlugError::EncryptionFailed(e.to_string()))?;
            let n = chacha20poly1305::Nonce::from_slice(&nonce);
            cipher
                .encrypt(n, plaintext)
                .map_err(|e| SlugError::EncryptionFailed(e.to_string()))?
        }
    };

    let mut sealed = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    sealed.push(algo.wire_id());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open sealed bytes. Returns `DecryptionFailed` on a wrong secret or
/// tampered ciphertext; structural problems (truncation, unknown cipher id)
/// are reported as `CorruptPayload` instead.
pub fn open(sealed: &[u8], key: &EncryptionKey) -> SlugResult<Vec<u8>> {
    if sealed.len() < 1 + NONCE_LEN + 16 {
        return Err(SlugError::CorruptPayload(format!(
            "sealed payload too short: {} bytes",
            sealed.len()
        )));
    }
    let algo = EncryptionAlgorithm::from_wire_id(sealed[0])?;
    let nonce = &sealed[1..1 + NONCE_LEN];
    let ciphertext = &sealed[1 + NONCE_LEN..];

    match algo {
        EncryptionAlgorithm::AesGcm256 => {
            let cipher = Aes256Gcm::new_from_slice(&key.0)
                .map_err(|e| SlugError::EncryptionFailed(e.to_string()))?;
            let n = aes_gcm::Nonce::from_slice(nonce);
            cipher
                .decrypt(n, ciphertext)
                .map_err(|_| SlugError::DecryptionFailed)
        }
        EncryptionAlgorithm::ChaCha20Poly1305 => {
            use chacha20poly1305::aead::Aead as _;
            use chacha20poly1305::KeyInit as _;
            let cipher = ChaCha20Poly1305::new_from_slice(&key.0)
                .map_err(|e| SlugError::EncryptionFailed(e.to_string()))?;
            let n = chacha20poly1305::Nonce::from_slice(nonce);
            cipher
                .decrypt(n, ciphertext)
                .map_err(|_| SlugError::DecryptionFailed)
        }
    }
}
