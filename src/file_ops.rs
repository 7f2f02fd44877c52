//! File encryption/decryption operations
//!
//! High-level helpers used by the `gcmbox` binary. Encrypted files hold a
//! single armored `<salt>-<nonce>-<payload>` line; trailing whitespace is
//! ignored when reading one back.

use crate::error::{ErrorCategory, ErrorKind, GcmboxError, Result};
use crate::gcmcrypt;
use crate::hexarmor;
use crate::passphrase::PassphraseReader;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};

/// Encrypt a file with a passphrase
///
/// Reads plaintext from `input_path`, encrypts it using a passphrase from
/// `passphrase_reader`, and writes the armored ciphertext to `output_path`
/// (mode 0o600 on Unix).
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let plaintext = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let sealed = gcmcrypt::encrypt(&passphrase, &plaintext)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_file_secure(output_path, hexarmor::wrap(&sealed).as_bytes())?;

    info!(input = %input_path.display(), output = %output_path.display(), "encrypted file");
    Ok(())
}

/// Decrypt a file with a passphrase
///
/// Reads armored ciphertext from `input_path`, decrypts it using a passphrase from
/// `passphrase_reader`, and writes the plaintext to `output_path` (mode 0o600 on Unix).
/// Nothing is written unless authentication succeeds.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let sealed = read_armored(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let plaintext = gcmcrypt::decrypt(&passphrase, &sealed)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    write_file_secure(output_path, &plaintext)?;

    info!(input = %input_path.display(), output = %output_path.display(), "decrypted file");
    Ok(())
}

/// Update an encrypted file with new plaintext using the same passphrase
///
/// The existing file at `crypt_path` is decrypted first so that a mistyped
/// passphrase is rejected instead of silently re-keying the file. The new
/// ciphertext is then written to a temporary file in the same directory,
/// synced, and renamed over `crypt_path`, so readers only ever observe the
/// old or the new content.
pub fn update_file(
    plain_path: &Path,
    crypt_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let existing = read_armored(crypt_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;

    gcmcrypt::decrypt(&passphrase, &existing)
        .map_err(|e| e.with_context("failed to decrypt existing file"))?;
    debug!(path = %crypt_path.display(), "passphrase matches existing file");

    let new_plaintext = fs::read(plain_path).map_err(|e| read_error(plain_path, e))?;
    let sealed = gcmcrypt::encrypt(&passphrase, &new_plaintext)
        .map_err(|e| e.with_context("failed to encrypt"))?;

    // An empty parent means a bare file name in the current directory.
    let crypt_dir = match crypt_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(".gcmbox-update")
        .tempfile_in(crypt_dir)
        .map_err(|e| internal_io("failed to create tempfile", e))?;

    temp_file
        .write_all(hexarmor::wrap(&sealed).as_bytes())
        .map_err(|e| internal_io("failed to write to tempfile", e))?;
    temp_file
        .flush()
        .map_err(|e| internal_io("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| internal_io("failed to sync file prior to rename", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| internal_io("failed to set tempfile permissions", e))?;
    }

    temp_file.persist(crypt_path).map_err(|e| {
        internal_io(
            format!("failed to rename to target file {}", crypt_path.display()),
            e.error,
        )
    })?;

    info!(path = %crypt_path.display(), "updated encrypted file");
    Ok(())
}

/// Read and parse an armored file.
fn read_armored(path: &Path) -> Result<gcmcrypt::SealedMessage> {
    let bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    let armored = String::from_utf8(bytes).map_err(|e| {
        GcmboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MalformedInput,
            format!("{} is not valid UTF-8", path.display()),
            e,
        )
    })?;
    hexarmor::unwrap(armored.trim_end()).map_err(|e| e.with_context("failed to unarmor"))
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    let write_error = |e: io::Error| {
        GcmboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to write to {}", path.display()),
            e,
        )
    };

    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(write_error)?;
        file.write_all(contents).map_err(write_error)
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(write_error)
    }
}

fn internal_io(msg: impl Into<String>, err: io::Error) -> GcmboxError {
    GcmboxError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}

fn read_error(path: &Path, err: io::Error) -> GcmboxError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    GcmboxError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
