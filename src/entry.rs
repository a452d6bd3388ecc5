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

use crate::consts::{BLANK_PART, DIR_INDEX};
use crate::package::Md5;

/// A single file inside an archive, addressable by its
/// `(directory, file name, type)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) type_name: String,
    pub(crate) directory: String,
    pub(crate) file_name: String,
    pub(crate) crc32: u32,
    pub(crate) length: u32,
    pub(crate) offset: u32,
    pub(crate) chunk_index: u16,
    pub(crate) small_data: Vec<u8>,
}

impl Entry {
    /// Extension without the dot; `" "` when the entry has none.
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Normalized directory; `" "` for the archive root.
    #[inline]
    pub fn directory(&self) -> &str {
        &self.directory
    }

    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Number of bytes stored in the data region or a chunk file.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Offset relative to the start of the containing data region.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn chunk_index(&self) -> u16 {
        self.chunk_index
    }

    /// Preload bytes stored inline in the tree; may be empty.
    #[inline]
    pub fn small_data(&self) -> &[u8] {
        &self.small_data
    }

    #[inline]
    pub fn is_embedded(&self) -> bool {
        self.chunk_index == DIR_INDEX
    }

    #[inline]
    pub fn total_length(&self) -> u64 {
        self.length as u64 + self.small_data.len() as u64
    }

    pub fn full_path(&self) -> String {
        let mut path = String::with_capacity(
            self.directory.len() + self.file_name.len() + self.type_name.len() + 2,
        );

        if self.directory != BLANK_PART {
            path.push_str(&self.directory);
            path.push('/');
        }
        path.push_str(&self.file_name);
        if self.type_name != BLANK_PART {
            path.push('.');
            path.push_str(&self.type_name);
        }

        path
    }
}

/// Streaming hash flavor of a per-chunk hash record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Md5,
    Blake3,
}

impl HashKind {
    #[inline]
    pub(crate) fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(HashKind::Md5),
            1 => Some(HashKind::Blake3),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn to_raw(self) -> u16 {
        match self {
            HashKind::Md5 => 0,
            HashKind::Blake3 => 1,
        }
    }
}

/// One record of the per-chunk hash table: a checksum over `length` bytes
/// of one chunk file starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHash {
    pub(crate) chunk_index: u16,
    pub(crate) hash_kind: HashKind,
    pub(crate) offset: u32,
    pub(crate) length: u32,
    pub(crate) checksum: Md5,
}

impl ChunkHash {
    #[inline]
    pub fn chunk_index(&self) -> u16 {
        self.chunk_index
    }

    #[inline]
    pub fn hash_kind(&self) -> HashKind {
        self.hash_kind
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    pub fn checksum(&self) -> &Md5 {
        &self.checksum
    }
}

/// Layout of the signature block, which determines what the signature
/// covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    /// Legacy layout: the signature covers the whole file up to the
    /// signature section.
    FullFile,
    /// Newer 20-byte layout carrying only sizes.
    FileChecksum,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(directory: &str, file_name: &str, type_name: &str) -> Entry {
        Entry {
            type_name: type_name.to_owned(),
            directory: directory.to_owned(),
            file_name: file_name.to_owned(),
            crc32: 0,
            length: 100,
            offset: 0,
            chunk_index: DIR_INDEX,
            small_data: vec![0; 7],
        }
    }

    #[test]
    fn full_path_skips_blank_parts() {
        assert_eq!(entry("maps", "de_dust", "bsp").full_path(), "maps/de_dust.bsp");
        assert_eq!(entry(" ", "readme", "txt").full_path(), "readme.txt");
        assert_eq!(entry("bin", "server", " ").full_path(), "bin/server");
        assert_eq!(entry(" ", "loose", " ").full_path(), "loose");
    }

    #[test]
    fn total_length_includes_the_preload() {
        let entry = entry(" ", "a", "b");
        assert_eq!(entry.total_length(), 107);
        assert!(entry.is_embedded());
    }

    #[test]
    fn hash_kind_raw_values_round_trip() {
        assert_eq!(HashKind::from_raw(0), Some(HashKind::Md5));
        assert_eq!(HashKind::from_raw(1), Some(HashKind::Blake3));
        assert_eq!(HashKind::from_raw(2), None);
        assert_eq!(HashKind::Md5.to_raw(), 0);
        assert_eq!(HashKind::Blake3.to_raw(), 1);
    }
}
