//! BLAKE3 content fingerprints for source documents.
//!
//! A [`Fingerprint`] is derived from the bytes of a file and nothing else:
//! renaming, moving, touching or re-permissioning a document keeps the same
//! fingerprint, while any content change yields a new one. The render cache
//! uses it as its only notion of identity.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Size of the read buffer used while streaming a file through the hasher.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = blake3::OUT_LEN;

/// Content fingerprint of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Fingerprint an in-memory buffer.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Wrap raw digest bytes, e.g. a key read back from the store.
    #[must_use]
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes. These are the store key.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex rendering (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Parse a 64 character hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex).ok().map(|h| Self(*h.as_bytes()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    /// The source file does not exist.
    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when opening or reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other I/O failure while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl FingerprintError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Fingerprint the full content of the file at `path`.
///
/// The file is streamed in fixed-size chunks, so memory use does not grow
/// with document size.
///
/// # Errors
///
/// Returns [`FingerprintError`] if the file cannot be opened or read to the
/// end.
pub fn fingerprint(path: &Path) -> Result<Fingerprint, FingerprintError> {
    let mut file = File::open(path).map_err(|e| FingerprintError::from_io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FingerprintError::from_io(path, e)),
        }
    }

    let fingerprint = Fingerprint(*hasher.finalize().as_bytes());
    log::trace!("Fingerprinted {}: {}", path.display(), fingerprint);
    Ok(fingerprint)
}
