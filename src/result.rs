// This file is part of vpklib.
//
// vpklib is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// vpklib is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with vpklib.  If not, see <https://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ErrorKind {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("illegal file magic: {0:02X?}")]
    InvalidMagic([u8; 4]),

    #[error("unknown version: {0}")]
    InvalidVersion(u32),

    #[error("version 0x{0:08X} is not supported")]
    Unsupported(u32),

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("{0}")]
    OutOfRange(String),

    #[error("CRC32 mismatch for read data (expected {expected:08X}, got {actual:08X}).")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("{section} mismatch (expected {expected}, got {actual}).")]
    HashMismatch {
        section: &'static str,
        expected: String,
        actual: String,
    },

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("too many chunk files: {0}")]
    TooManyChunks(usize),
}

/// An [`ErrorKind`] plus the filesystem path it happened on, when one is
/// known.
#[derive(Debug)]
pub struct Error {
    pub(crate) kind: ErrorKind,
    pub(crate) path: Option<PathBuf>,
}

impl Error {
    #[inline]
    pub fn new(kind: ErrorKind, path: Option<PathBuf>) -> Self {
        Error { kind, path }
    }

    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn with_path(self, path: impl AsRef<Path>) -> Self {
        Error {
            kind: self.kind,
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    #[inline]
    pub fn io(error: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io(error),
            path: None,
        }
    }

    #[inline]
    pub fn io_with_path(error: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error {
            kind: ErrorKind::Io(error),
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    #[inline]
    pub(crate) fn invalid_magic(magic: [u8; 4]) -> Self {
        ErrorKind::InvalidMagic(magic).into()
    }

    #[inline]
    pub(crate) fn invalid_version(version: u32) -> Self {
        ErrorKind::InvalidVersion(version).into()
    }

    #[inline]
    pub(crate) fn unsupported(version: u32) -> Self {
        ErrorKind::Unsupported(version).into()
    }

    #[inline]
    pub(crate) fn invalid_format(message: impl Into<String>) -> Self {
        ErrorKind::InvalidFormat(message.into()).into()
    }

    #[inline]
    pub(crate) fn invalid_state(message: &'static str) -> Self {
        ErrorKind::InvalidState(message).into()
    }

    #[inline]
    pub(crate) fn out_of_range(message: impl Into<String>) -> Self {
        ErrorKind::OutOfRange(message.into()).into()
    }

    #[inline]
    pub(crate) fn crc_mismatch(expected: u32, actual: u32) -> Self {
        ErrorKind::CrcMismatch { expected, actual }.into()
    }

    #[inline]
    pub(crate) fn hash_mismatch(section: &'static str, expected: &[u8], actual: &[u8]) -> Self {
        ErrorKind::HashMismatch {
            section,
            expected: hex::encode_upper(expected),
            actual: hex::encode_upper(actual),
        }
        .into()
    }

    #[inline]
    pub(crate) fn signature_invalid() -> Self {
        ErrorKind::SignatureInvalid.into()
    }

    #[inline]
    pub(crate) fn not_found(path: impl AsRef<Path>) -> Self {
        ErrorKind::NotFound(path.as_ref().to_path_buf()).into()
    }

    #[inline]
    pub(crate) fn too_many_chunks(count: usize) -> Self {
        ErrorKind::TooManyChunks(count).into()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{:?}: {}", path, self.kind)
        } else {
            self.kind.fmt(f)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error { kind, path: None }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        ErrorKind::Io(error).into()
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(error: std::str::Utf8Error) -> Self {
        ErrorKind::Utf8(error).into()
    }
}

pub type Result<T> = core::result::Result<T, Error>;
