//! Reading, verifying, and writing Valve VPK archives.
//!
//! A VPK is either a single self-contained file or a `*_dir.vpk`
//! directory file with numbered `*_NNN.vpk` chunk files next to it. This
//! crate parses the directory tree, resolves and extracts entries across
//! chunk files, checks CRC32, MD5, BLAKE3 and RSA signature integrity,
//! and writes new archives, optionally split into chunks.

pub mod consts;

pub(crate) mod io;
pub(crate) mod util;

pub mod result;
pub use self::result::{Error, ErrorKind, Result};

pub mod entry;
pub use self::entry::{ChunkHash, Entry, HashKind, SignatureKind};

pub mod store;
pub use self::store::CasePolicy;

pub mod package;
pub use self::package::{Magic, Md5, Package};

pub mod extract;
pub use self::extract::{extract_all, EntryData, EntryStream, ExtractOptions};

pub mod verify;
pub use self::verify::{
    is_signature_valid, verify_all, verify_chunk_hashes, verify_file_checksums, verify_hashes,
    verify_signature,
};

pub mod write;
pub use self::write::{write, WriteOptions};
