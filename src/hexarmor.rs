//! Hex armoring for sealed messages
//!
//! Serializes the salt, nonce and payload of a [`SealedMessage`] as three
//! lowercase hex fields joined by a hyphen:
//!
//! ```text
//! <hex salt: 16 chars>-<hex nonce: 24 chars>-<hex payload: 2 * (plaintext + 16) chars>
//! ```
//!
//! Hex never produces the delimiter, so the format splits unambiguously.
//! There is no version marker.

use crate::error::{ErrorCategory, ErrorKind, GcmboxError, Result};
use crate::gcmcrypt::{NONCE_LEN, SALT_LEN, SealedMessage, TAG_LEN};

/// Separator between the three fields
pub const FIELD_DELIMITER: char = '-';

/// Number of fields in an armored message
const FIELD_COUNT: usize = 3;

/// Wrap a sealed message in armor, returning the armored string
pub fn wrap(sealed: &SealedMessage) -> String {
    format!(
        "{}{d}{}{d}{}",
        hex::encode(sealed.salt),
        hex::encode(sealed.nonce),
        hex::encode(&sealed.payload),
        d = FIELD_DELIMITER
    )
}

/// Unwrap an armored string, returning the sealed message it encodes
pub fn unwrap(armored: &str) -> Result<SealedMessage> {
    let fields: Vec<&str> = armored.split(FIELD_DELIMITER).collect();
    let [salt, nonce, payload] = fields.as_slice() else {
        return Err(GcmboxError::malformed(format!(
            "expected {} '{}'-separated fields, found {}",
            FIELD_COUNT,
            FIELD_DELIMITER,
            fields.len()
        )));
    };

    let salt = decode_fixed::<SALT_LEN>("salt", salt)?;
    let nonce = decode_fixed::<NONCE_LEN>("nonce", nonce)?;
    let payload = decode_field("payload", payload)?;
    if payload.len() < TAG_LEN {
        return Err(GcmboxError::malformed(format!(
            "payload is {} bytes, shorter than the {}-byte authentication tag; likely truncated",
            payload.len(),
            TAG_LEN
        )));
    }

    Ok(SealedMessage {
        salt,
        nonce,
        payload,
    })
}

fn decode_field(name: &str, field: &str) -> Result<Vec<u8>> {
    hex::decode(field).map_err(|e| {
        GcmboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MalformedInput,
            format!("{} is not valid hex", name),
            e,
        )
    })
}

fn decode_fixed<const N: usize>(name: &str, field: &str) -> Result<[u8; N]> {
    let bytes = decode_field(name, field)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        GcmboxError::malformed(format!("{} must be {} bytes, got {}", name, N, len))
    })
}
