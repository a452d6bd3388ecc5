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

use crate::package::Magic;

pub const VPK_MAGIC: Magic = [0x34, 0x12, 0xAA, 0x55];

/// Version number of the Respawn VPK dialect. Detected and rejected.
pub const RESPAWN_VERSION: u32 = 0x0003_0002;

/// Chunk index marking an entry whose data lives in the directory file.
pub const DIR_INDEX: u16 = 0x7FFF;
pub const TERMINATOR: u16 = 0xFFFF;

/// Placeholder stored in the tree for an entry without a directory or
/// without an extension.
pub const BLANK_PART: &str = " ";

/// The tree can address at most this many external chunk files.
pub const MAX_CHUNK_COUNT: u16 = 0x7FFE;

pub const V1_HEADER_SIZE: u32 = 4 * 3;
pub const V2_HEADER_SIZE: u32 = 4 * 3 + 4 * 4;

/// On-disk size of one entry record, excluding the preload bytes.
pub const ENTRY_RECORD_SIZE: u32 = 4 + 2 + 2 + 4 + 4 + 2;

/// On-disk size of one record in the per-chunk hash table.
pub const CHUNK_HASH_SIZE: usize = 2 + 2 + 4 + 4 + 16;

/// Legacy hash-kind value that marks a directory-file record.
pub const LEGACY_DIR_HASH_KIND: u16 = 0x8000;

pub const OTHER_MD5_SIZE: u32 = 16 * 3;

pub const BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_MD5_CHUNK_SIZE: u32 = 1024 * 1024;

/// Entries up to this many bytes are read into memory instead of being
/// memory mapped.
pub const MAP_BYPASS_SIZE: u32 = 4096;
