//! Error types that can be emitted from this library

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Generic result type with ZipError as its error variant
pub type ZipResult<T> = Result<T, ZipError>;

/// Error type for Zip
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ZipError {
    /// An Error caused by I/O
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),

    /// A record signature or length did not match what the format requires
    #[error("malformed record: {0}")]
    MalformedRecord(&'static str),

    /// This archive uses a feature this library does not implement
    #[error("unsupported zip archive: {0}")]
    UnsupportedArchive(&'static str),

    /// The options given to a writer are inconsistent
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),

    /// The requested file could not be found in the archive
    #[error("specified file not found in archive")]
    FileNotFound,

    /// The entry or central directory is encrypted and no password was given
    #[error("a password is required to decrypt this data")]
    PasswordRequired,

    /// The password check stored in front of the payload did not match
    #[error("incorrect password")]
    IncorrectPassword,

    /// The authentication code after an AES payload did not match.
    ///
    /// Any bytes already returned for this entry must be discarded.
    #[error("authentication code mismatch, decrypted data is untrusted")]
    AuthenticationFailed,

    /// The CRC-32 of the extracted data differs from the recorded one
    #[error("checksum mismatch: expected {expected:#010x}, found {actual:#010x}")]
    ChecksumMismatch {
        /// CRC-32 recorded in the archive
        expected: u32,
        /// CRC-32 of the data that was read
        actual: u32,
    },

    /// The number of extracted bytes differs from the recorded size
    #[error("size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Size recorded in the archive
        expected: u64,
        /// Number of bytes that were read
        actual: u64,
    },

    /// A volume of a split archive is missing
    #[error("volume not found: {}", .0.display())]
    VolumeNotFound(PathBuf),

    /// A new volume of a split archive could not be created
    #[error("cannot create volume {}: {reason}", path.display())]
    VolumeCreationError {
        /// Path of the volume that should have been created
        path: PathBuf,
        /// Why the volume was refused
        reason: &'static str,
    },
}

impl ZipError {
    /// Returns true if the error means the supplied password is wrong.
    pub fn is_password_error(&self) -> bool {
        matches!(self, ZipError::IncorrectPassword)
    }
}

impl From<io::Error> for ZipError {
    fn from(err: io::Error) -> ZipError {
        let carries_zip_error = err
            .get_ref()
            .map(|inner| inner.is::<ZipError>())
            .unwrap_or(false);
        if !carries_zip_error {
            return ZipError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<ZipError>()) {
            Some(Ok(zip_err)) => *zip_err,
            Some(Err(other)) => ZipError::Io(io::Error::new(kind, other)),
            None => ZipError::Io(io::Error::from(kind)),
        }
    }
}

impl From<ZipError> for io::Error {
    fn from(err: ZipError) -> io::Error {
        let kind = match err {
            ZipError::Io(inner) => return inner,
            ZipError::MalformedRecord(..)
            | ZipError::ChecksumMismatch { .. }
            | ZipError::SizeMismatch { .. }
            | ZipError::AuthenticationFailed => io::ErrorKind::InvalidData,
            ZipError::UnsupportedArchive(..) => io::ErrorKind::Unsupported,
            ZipError::InvalidOptions(..)
            | ZipError::PasswordRequired
            | ZipError::IncorrectPassword => io::ErrorKind::InvalidInput,
            ZipError::FileNotFound | ZipError::VolumeNotFound(..) => io::ErrorKind::NotFound,
            ZipError::VolumeCreationError { .. } => io::ErrorKind::AlreadyExists,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod test {
    use super::ZipError;
    use std::io;

    #[test]
    fn typed_error_survives_io_round_trip() {
        let err: io::Error = ZipError::ChecksumMismatch {
            expected: 1,
            actual: 2,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        match ZipError::from(err) {
            ZipError::ChecksumMismatch { expected, actual } => {
                assert_eq!((expected, actual), (1, 2))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn plain_io_error_stays_io() {
        let err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert!(matches!(ZipError::from(err), ZipError::Io(_)));
    }
}
