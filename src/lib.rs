//! gcmbox - Passphrase-based encryption using PBKDF2-HMAC-SHA256 and AES-256-GCM
//!
//! ```no_run
//! let armored = gcmbox::encrypt("correct horse battery staple", "attack at dawn")?;
//! assert_eq!(gcmbox::decrypt("correct horse battery staple", &armored)?, "attack at dawn");
//! # Ok::<(), gcmbox::GcmboxError>(())
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod file_ops;
pub mod gcmcrypt;
pub mod hexarmor;
pub mod passphrase;

pub use error::{ErrorCategory, ErrorKind, GcmboxError, Result};

/// Encrypt `plaintext` under `passphrase`, returning the armored
/// `<salt>-<nonce>-<payload>` string.
pub fn encrypt(passphrase: &str, plaintext: &str) -> Result<String> {
    let sealed = gcmcrypt::encrypt(passphrase.as_bytes(), plaintext.as_bytes())?;
    Ok(hexarmor::wrap(&sealed))
}

/// Decrypt an armored string produced by [`encrypt`].
///
/// Fails with [`ErrorKind::MalformedInput`] if the string cannot be parsed,
/// and with [`ErrorKind::AuthenticationFailed`] on a wrong passphrase or
/// tampered data.
pub fn decrypt(passphrase: &str, ciphertext: &str) -> Result<String> {
    let sealed = hexarmor::unwrap(ciphertext)?;
    let plaintext = gcmcrypt::decrypt(passphrase.as_bytes(), &sealed)?;
    String::from_utf8(plaintext).map_err(|e| {
        GcmboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::PlaintextEncoding,
            "decrypted plaintext is not valid UTF-8",
            e.utf8_error(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PASSPHRASE: &str = "correct horse battery staple";

    #[test]
    fn test_attack_at_dawn() {
        let armored = encrypt(PASSPHRASE, "attack at dawn").unwrap();

        let widths: Vec<usize> = armored.split('-').map(str::len).collect();
        assert_eq!(widths, vec![16, 24, 60]);
        assert!(
            armored
                .chars()
                .all(|c| c == '-' || c.is_ascii_digit() || ('a'..='f').contains(&c))
        );

        assert_eq!(decrypt(PASSPHRASE, &armored).unwrap(), "attack at dawn");

        let err = decrypt("wrong password", &armored).expect_err("wrong passphrase");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_known_ciphertext() {
        let armored = "0001020304050607-000102030405060708090a0b-\
                       124712fbd58cee009409924b4290a52b808dc636a65121b79f5129f67272";
        assert_eq!(decrypt(PASSPHRASE, armored).unwrap(), "attack at dawn");
    }

    #[test]
    fn test_empty_plaintext_is_distinct_from_failure() {
        let armored = encrypt(PASSPHRASE, "").unwrap();
        assert_eq!(decrypt(PASSPHRASE, &armored).unwrap(), "");
        assert!(decrypt("nope", &armored).is_err());
    }

    #[test]
    fn test_multibyte_text() {
        let text = "héllo wörld ☃ 日本語";
        let armored = encrypt("pässwörd", text).unwrap();
        assert_eq!(decrypt("pässwörd", &armored).unwrap(), text);
    }

    #[test]
    fn test_same_inputs_different_output() {
        let a = encrypt(PASSPHRASE, "hello").unwrap();
        let b = encrypt(PASSPHRASE, "hello").unwrap();

        let fields_a: Vec<&str> = a.split('-').collect();
        let fields_b: Vec<&str> = b.split('-').collect();
        assert_ne!(fields_a[0], fields_b[0], "salts should differ");
        assert_ne!(fields_a[1], fields_b[1], "nonces should differ");
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_inputs() {
        for input in [
            "",
            "-",
            "--",
            "---",
            "00-00",
            "not hex at all",
            "0001020304050607-000102030405060708090a0b",
            "0001020304050607-000102030405060708090a0b-xyz",
        ] {
            let err = decrypt(PASSPHRASE, input).expect_err(input);
            assert_eq!(err.kind, Some(ErrorKind::MalformedInput), "input: {:?}", input);
        }
    }

    #[test]
    fn test_non_utf8_plaintext() {
        let sealed = gcmcrypt::encrypt(b"test", &[0xff, 0xfe, 0x00]).unwrap();
        let err = decrypt("test", &hexarmor::wrap(&sealed)).expect_err("invalid utf-8");
        assert_eq!(err.kind, Some(ErrorKind::PlaintextEncoding));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip(passphrase in ".{0,40}", plaintext in ".{0,200}") {
            let armored = encrypt(&passphrase, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&passphrase, &armored).unwrap(), plaintext);
        }

        #[test]
        fn wrong_passphrase_rejected(
            p1 in "[a-z]{1,16}",
            p2 in "[A-Z]{1,16}",
            plaintext in ".{0,64}",
        ) {
            let armored = encrypt(&p1, &plaintext).unwrap();
            let err = decrypt(&p2, &armored).unwrap_err();
            prop_assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        }

        #[test]
        fn single_bit_flip_detected(plaintext in ".{0,32}", pick in any::<prop::sample::Index>(), bit in 0u8..8) {
            let armored = encrypt("test", &plaintext).unwrap();
            let mut sealed = hexarmor::unwrap(&armored).unwrap();

            // Flip a bit in either the nonce or the payload.
            let span = gcmcrypt::NONCE_LEN + sealed.payload.len();
            let at = pick.index(span);
            if at < gcmcrypt::NONCE_LEN {
                sealed.nonce[at] ^= 1 << bit;
            } else {
                sealed.payload[at - gcmcrypt::NONCE_LEN] ^= 1 << bit;
            }

            let err = decrypt("test", &hexarmor::wrap(&sealed)).unwrap_err();
            prop_assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        }
    }
}
