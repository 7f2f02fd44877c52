//! Encryption/decryption using PBKDF2-HMAC-SHA256 + AES-256-GCM
//!
//! This module implements passphrase-based encryption using:
//! - PBKDF2 with HMAC-SHA256 for key derivation from passphrase
//! - AES-256 in Galois/Counter Mode for authenticated encryption
//!
//! A sealed message consists of:
//! - salt: 8 bytes
//! - nonce: 12 bytes
//! - payload: variable length (ciphertext followed by the 16-byte GCM tag)
//!
//! No associated data is authenticated. Serialization of the three parts
//! lives in [`crate::hexarmor`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, GcmboxError, Result};

/// Length of salt in bytes
pub const SALT_LEN: usize = 8;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the GCM authentication tag appended to every payload
pub const TAG_LEN: usize = 16;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 4096;

/// A 256-bit key derived from a passphrase. Wiped on drop.
pub struct DerivedKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.as_bytes()))
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The three components produced by a single encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the authentication tag appended.
    pub payload: Vec<u8>,
}

/// Fill `buf` from the operating system's CSPRNG. Fails rather than falling
/// back to a weaker source.
fn fill_random(buf: &mut [u8], what: &str) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| entropy_error(what, e))
}

fn entropy_error(what: &str, err: rand::Error) -> GcmboxError {
    GcmboxError::with_kind_and_source(
        ErrorCategory::Internal,
        ErrorKind::EntropyUnavailable,
        format!("failed to generate random {}", what),
        err,
    )
}

/// Derive a 32-byte key from a passphrase and salt using PBKDF2-HMAC-SHA256
///
/// When `salt` is `None` a fresh random salt is generated. The salt actually
/// used is returned alongside the key so it can be stored with the ciphertext.
pub fn derive_key(
    passphrase: &[u8],
    salt: Option<&[u8; SALT_LEN]>,
) -> Result<(DerivedKey, [u8; SALT_LEN])> {
    let salt = match salt {
        Some(salt) => *salt,
        None => {
            let mut fresh = [0u8; SALT_LEN];
            fill_random(&mut fresh, "salt")?;
            fresh
        }
    };

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase, &salt, PBKDF2_ITERATIONS, key.as_mut_slice());
    trace!(iterations = PBKDF2_ITERATIONS, "derived key");

    Ok((DerivedKey { bytes: key }, salt))
}

/// Encrypt plaintext with a passphrase using random salt and nonce
pub fn encrypt(passphrase: &[u8], plaintext: &[u8]) -> Result<SealedMessage> {
    let (key, salt) = derive_key(passphrase, None)?;

    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce, "nonce")?;

    seal(&key, salt, nonce, plaintext)
}

/// Encrypt plaintext with a passphrase using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic(
    passphrase: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<SealedMessage> {
    let (key, salt) = derive_key(passphrase, Some(salt))?;
    seal(&key, salt, *nonce, plaintext)
}

fn seal(
    key: &DerivedKey,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<SealedMessage> {
    // Only fails for plaintexts beyond the GCM length limit (~64 GiB).
    let payload = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| {
            GcmboxError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "AES-GCM refused to seal the plaintext",
            )
        })?;
    debug!(
        plaintext_len = plaintext.len(),
        payload_len = payload.len(),
        "sealed message"
    );

    Ok(SealedMessage {
        salt,
        nonce,
        payload,
    })
}

/// Decrypt a sealed message with a passphrase
///
/// Either the full, verified plaintext is returned or an error; no partial
/// output is ever exposed.
pub fn decrypt(passphrase: &[u8], sealed: &SealedMessage) -> Result<Vec<u8>> {
    if sealed.payload.len() < TAG_LEN {
        return Err(GcmboxError::malformed(format!(
            "payload of {} bytes is shorter than the {}-byte authentication tag",
            sealed.payload.len(),
            TAG_LEN
        )));
    }

    let (key, _) = derive_key(passphrase, Some(&sealed.salt))?;
    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.payload.as_slice())
        .map_err(|_| {
            debug!("authentication tag mismatch");
            GcmboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "corrupt input, tampered-with data, or bad passphrase",
            )
        })?;

    Ok(plaintext)
}
