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

use std::collections::hash_map::Entry as HashMapEntry;
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use crc::crc32;
use memmap2::Mmap;
use tracing::{debug, warn};

use crate::consts::{
    CHUNK_HASH_SIZE, DIR_INDEX, LEGACY_DIR_HASH_KIND, MAP_BYPASS_SIZE, OTHER_MD5_SIZE,
    RESPAWN_VERSION, TERMINATOR, V1_HEADER_SIZE, V2_HEADER_SIZE, VPK_MAGIC,
};
use crate::entry::{ChunkHash, Entry, HashKind, SignatureKind};
use crate::extract::{self, EntryData, EntryStream};
use crate::io::{read_i32, read_str, read_u16, read_u32, ByteSource};
use crate::result::{Error, Result};
use crate::store::{CasePolicy, EntryStore};
use crate::util::{archive_path, split_archive_name, split_file_path};

pub type Magic = [u8; 4];
pub type Md5 = [u8; 16];

/// A VPK archive: either a self-contained file or a directory file with
/// sibling `<base>_NNN.vpk` chunk files.
///
/// A package starts out empty and is populated either by reading a source
/// (after which it is immutable apart from entry removal) or by adding
/// entries that are later written out.
pub struct Package {
    pub(crate) dirpath: PathBuf,
    pub(crate) prefix: String,
    pub(crate) is_dir_vpk: bool,
    pub(crate) named: bool,
    pub(crate) sealed: bool,

    pub(crate) source: Option<ByteSource>,

    pub(crate) version: u32,
    pub(crate) header_size: u32,
    pub(crate) tree_size: u32,
    pub(crate) file_data_size: u32,
    pub(crate) chunk_hash_size: u32,
    pub(crate) other_md5_size: u32,
    pub(crate) signature_size: u32,

    pub(crate) store: EntryStore,
    pub(crate) chunk_hashes: Vec<ChunkHash>,

    pub(crate) tree_checksum: Md5,
    pub(crate) hash_table_checksum: Md5,
    pub(crate) whole_file_checksum: Md5,

    pub(crate) signature_kind: Option<SignatureKind>,
    pub(crate) public_key: Vec<u8>,
    pub(crate) signature: Vec<u8>,

    pub(crate) chunk_maps: HashMap<u16, Mmap>,
}

impl Package {
    pub fn new() -> Package {
        Package {
            dirpath: PathBuf::new(),
            prefix: String::new(),
            is_dir_vpk: false,
            named: false,
            sealed: false,
            source: None,
            version: 0,
            header_size: 0,
            tree_size: 0,
            file_data_size: 0,
            chunk_hash_size: 0,
            other_md5_size: 0,
            signature_size: 0,
            store: EntryStore::new(),
            chunk_hashes: Vec::new(),
            tree_checksum: [0; 16],
            hash_table_checksum: [0; 16],
            whole_file_checksum: [0; 16],
            signature_kind: None,
            public_key: Vec::new(),
            signature: Vec::new(),
            chunk_maps: HashMap::new(),
        }
    }

    /// Derives the base name used to locate sibling chunk files: the path
    /// stripped of `.vpk` and then of a trailing `_dir`.
    pub fn set_file_name(&mut self, path: impl AsRef<Path>) {
        let (dirpath, prefix, is_dir_vpk) = split_archive_name(path.as_ref());
        self.dirpath = dirpath;
        self.prefix = prefix;
        self.is_dir_vpk = is_dir_vpk;
        self.named = true;
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Package> {
        let mut package = Package::new();
        package.read_path(path)?;
        Ok(package)
    }

    /// Reads the archive at `path`, setting the base name from it.
    pub fn read_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.set_file_name(path);

        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(Error::io_with_path(error, path)),
        };

        match self.parse(ByteSource::File(file)) {
            Ok(()) => Ok(()),
            Err(error) => {
                if error.path.is_none() {
                    Err(error.with_path(path))
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Reads the archive from an in-memory buffer. The base name must have
    /// been set first so external chunk files can be located.
    pub fn read_bytes(&mut self, data: Vec<u8>) -> Result<()> {
        if !self.named {
            return Err(Error::invalid_state(
                "a file name must be set before reading from a byte buffer",
            ));
        }

        self.parse(ByteSource::Memory(Cursor::new(data)))
    }

    fn parse(&mut self, mut source: ByteSource) -> Result<()> {
        if self.source.is_some() || !self.store.is_empty() {
            return Err(Error::invalid_state("archive has already been populated"));
        }

        let mut reader = BufReader::new(&mut source);

        let mut magic: Magic = [0; 4];
        reader.read_exact(&mut magic)?;

        if magic != VPK_MAGIC {
            return Err(Error::invalid_magic(magic));
        }

        let version = read_u32(&mut reader)?;

        if version == RESPAWN_VERSION {
            return Err(Error::unsupported(version));
        }

        if version == 0 || version > 2 {
            return Err(Error::invalid_version(version));
        }

        let declared_tree_size = read_u32(&mut reader)?;

        let header_size;
        let mut file_data_size = 0u32;
        let mut chunk_hash_size = 0u32;
        let mut other_md5_size = 0u32;
        let mut signature_size = 0u32;

        if version < 2 {
            header_size = V1_HEADER_SIZE;
        } else {
            header_size = V2_HEADER_SIZE;
            file_data_size = read_u32(&mut reader)?;
            chunk_hash_size = read_u32(&mut reader)?;
            other_md5_size = read_u32(&mut reader)?;
            signature_size = read_u32(&mut reader)?;
        }

        // tree: three nested lists, each terminated by an empty string

        // buffer reuse over loops:
        let mut typebuf = Vec::new();
        let mut dirbuf = Vec::new();
        let mut namebuf = Vec::new();

        loop {
            let type_name = read_str(&mut reader, &mut typebuf)?;

            if type_name.is_empty() {
                break;
            }
            let type_name = type_name.to_owned();

            loop {
                let directory = read_str(&mut reader, &mut dirbuf)?;

                if directory.is_empty() {
                    break;
                }
                let directory = directory.to_owned();

                loop {
                    let file_name = read_str(&mut reader, &mut namebuf)?;

                    if file_name.is_empty() {
                        break;
                    }

                    let entry = read_entry(&mut reader, &type_name, &directory, file_name)?;
                    self.store.push_parsed(entry);
                }
            }
        }

        self.store.finish_ingest();

        // The declared tree size is not trusted; recompute it from where
        // the walk actually ended.
        let tree_end = reader.stream_position()?;
        let tree_size = (tree_end - header_size as u64) as u32;
        if tree_size != declared_tree_size {
            warn!(
                "declared tree size {} does not match the parsed tree size {}",
                declared_tree_size, tree_size
            );
        }

        let mut chunk_hashes = Vec::new();
        let mut tree_checksum: Md5 = [0; 16];
        let mut hash_table_checksum: Md5 = [0; 16];
        let mut whole_file_checksum: Md5 = [0; 16];
        let mut signature_kind = None;
        let mut public_key = Vec::new();
        let mut signature = Vec::new();

        if version > 1 {
            reader.seek_relative(file_data_size as i64)?;

            read_chunk_hashes(&mut reader, chunk_hash_size, &mut chunk_hashes)?;

            if other_md5_size == OTHER_MD5_SIZE {
                reader.read_exact(&mut tree_checksum)?;
                reader.read_exact(&mut hash_table_checksum)?;
                reader.read_exact(&mut whole_file_checksum)?;
            } else if other_md5_size > 0 {
                warn!(
                    "unexpected other-MD5 section size {}, section ignored",
                    other_md5_size
                );
                reader.seek_relative(other_md5_size as i64)?;
            }

            if signature_size >= 4 {
                signature_kind = Some(read_signature(
                    &mut reader,
                    signature_size,
                    &mut public_key,
                    &mut signature,
                )?);
            }
        }

        drop(reader);

        self.source = Some(source);
        self.version = version;
        self.header_size = header_size;
        self.tree_size = tree_size;
        self.file_data_size = file_data_size;
        self.chunk_hash_size = chunk_hash_size;
        self.other_md5_size = other_md5_size;
        self.signature_size = signature_size;
        self.chunk_hashes = chunk_hashes;
        self.tree_checksum = tree_checksum;
        self.hash_table_checksum = hash_table_checksum;
        self.whole_file_checksum = whole_file_checksum;
        self.signature_kind = signature_kind;
        self.public_key = public_key;
        self.signature = signature;

        debug!(
            "parsed version {} archive with {} entries",
            self.version,
            self.store.file_count()
        );

        Ok(())
    }

    /// Switches lookups to binary search with the given case policy. Must
    /// be called before the archive is read or any entry is added.
    pub fn optimize_for_binary_search(&mut self, policy: CasePolicy) -> Result<()> {
        if self.source.is_some() {
            return Err(Error::invalid_state(
                "optimize must be called before entries are read or added",
            ));
        }

        self.store.optimize(policy)
    }

    /// Looks up an entry by its logical path. An empty path finds nothing.
    pub fn find_entry(&self, path: &str) -> Option<&Entry> {
        if path.is_empty() {
            return None;
        }

        let triple = split_file_path(path);
        self.store
            .find(&triple.directory, &triple.file_name, &triple.type_name)
    }

    /// Adds a file with the given content. The content is carried as
    /// preload data until the archive is written, at which point it moves
    /// into the data region.
    pub fn add_file(&mut self, path: &str, data: Vec<u8>) -> Result<()> {
        if self.sealed {
            return Err(Error::invalid_state(
                "cannot add entries after the archive has been written",
            ));
        }
        if self.source.is_some() {
            return Err(Error::invalid_state(
                "cannot add entries to an archive populated from a source",
            ));
        }

        let triple = split_file_path(path);
        let crc32 = crc32::checksum_ieee(&data);

        self.store.add(Entry {
            type_name: triple.type_name,
            directory: triple.directory,
            file_name: triple.file_name,
            crc32,
            length: 0,
            offset: 0,
            chunk_index: DIR_INDEX,
            small_data: data,
        });

        Ok(())
    }

    /// Recursively adds every regular file below `dir`, keyed by its path
    /// relative to `dir`.
    pub fn add_directory(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let mut pathbuf = String::new();
        self.add_directory_inner(dir.as_ref(), &mut pathbuf)
    }

    fn add_directory_inner(&mut self, dir: &Path, pathbuf: &mut String) -> Result<()> {
        let dirents = match fs::read_dir(dir) {
            Ok(dirents) => dirents,
            Err(error) => return Err(Error::io_with_path(error, dir)),
        };

        for dirent in dirents {
            let dirent = match dirent {
                Ok(dirent) => dirent,
                Err(error) => return Err(Error::io_with_path(error, dir)),
            };

            let os_name = dirent.file_name();
            let name = match os_name.to_str() {
                Some(name) => name,
                None => {
                    return Err(Error::invalid_format("file name is not valid UTF-8")
                        .with_path(dirent.path()))
                }
            };

            let file_type = match dirent.file_type() {
                Ok(file_type) => file_type,
                Err(error) => return Err(Error::io_with_path(error, dirent.path())),
            };

            let len = pathbuf.len();
            pathbuf.push_str(name);

            if file_type.is_dir() {
                pathbuf.push('/');
                self.add_directory_inner(&dirent.path(), pathbuf)?;
            } else {
                let data = match fs::read(dirent.path()) {
                    Ok(data) => data,
                    Err(error) => return Err(Error::io_with_path(error, dirent.path())),
                };
                let path = pathbuf.clone();
                self.add_file(&path, data)?;
            }

            pathbuf.truncate(len);
        }

        Ok(())
    }

    /// Removes an entry by its logical path, returning it. The entry's
    /// extension list is dropped when it empties.
    pub fn remove_file(&mut self, path: &str) -> Result<Option<Entry>> {
        if self.sealed {
            return Err(Error::invalid_state(
                "cannot remove entries after the archive has been written",
            ));
        }

        if path.is_empty() {
            return Ok(None);
        }

        let triple = split_file_path(path);
        Ok(self
            .store
            .remove(&triple.directory, &triple.file_name, &triple.type_name))
    }

    /// Finds and reads an entry in one call.
    pub fn read_file(&mut self, path: &str, validate_crc: bool) -> Result<Vec<u8>> {
        let data_offset = self.header_size as u64 + self.tree_size as u64;

        let triple = split_file_path(path);
        let entry = match self
            .store
            .find(&triple.directory, &triple.file_name, &triple.type_name)
        {
            Some(entry) => entry,
            None => return Err(Error::not_found(path)),
        };

        let mut out = vec![0; entry.total_length() as usize];
        extract::read_entry_into(
            self.source.as_mut(),
            data_offset,
            &self.dirpath,
            &self.prefix,
            entry,
            &mut out,
        )?;

        if validate_crc {
            let actual = crc32::checksum_ieee(&out);
            if actual != entry.crc32 {
                return Err(Error::crc_mismatch(entry.crc32, actual));
            }
        }

        Ok(out)
    }

    /// Reads an entry's bytes: the preload block followed by the archive
    /// bytes. The entry must not borrow from this package; clone it or use
    /// [`Package::read_file`].
    pub fn read_entry(&mut self, entry: &Entry, validate_crc: bool) -> Result<Vec<u8>> {
        let mut out = vec![0; entry.total_length() as usize];
        self.read_entry_into(entry, &mut out, validate_crc)?;
        Ok(out)
    }

    /// Like [`Package::read_entry`] but into a caller-provided buffer,
    /// which must hold at least `total_length` bytes. Returns the number
    /// of bytes written.
    pub fn read_entry_into(
        &mut self,
        entry: &Entry,
        out: &mut [u8],
        validate_crc: bool,
    ) -> Result<usize> {
        let total = entry.total_length();
        if (out.len() as u64) < total {
            return Err(Error::out_of_range(format!(
                "output buffer holds {} bytes but the entry needs {}",
                out.len(),
                total
            )));
        }

        let data_offset = self.header_size as u64 + self.tree_size as u64;
        let out = &mut out[..total as usize];
        extract::read_entry_into(
            self.source.as_mut(),
            data_offset,
            &self.dirpath,
            &self.prefix,
            entry,
            out,
        )?;

        if validate_crc {
            let actual = crc32::checksum_ieee(out);
            if actual != entry.crc32 {
                return Err(Error::crc_mismatch(entry.crc32, actual));
            }
        }

        Ok(total as usize)
    }

    /// Returns a reader over the entry's bytes without materializing them.
    pub fn get_file_stream<'a>(&'a mut self, entry: &'a Entry) -> Result<EntryStream<'a>> {
        let data_offset = self.header_size as u64 + self.tree_size as u64;
        extract::open_entry_stream(
            self.source.as_mut(),
            data_offset,
            &self.dirpath,
            &self.prefix,
            entry,
        )
    }

    /// Returns the entry's bytes as a view into a cached memory map when
    /// possible. Small entries, preloaded entries, and embedded entries of
    /// a stream-backed archive come back as owned buffers instead.
    pub fn get_memory_mapped_view(&mut self, entry: &Entry) -> Result<EntryData<'_>> {
        if entry.total_length() <= MAP_BYPASS_SIZE as u64 || !entry.small_data.is_empty() {
            return Ok(EntryData::Owned(self.read_entry(entry, false)?));
        }

        if entry.is_embedded() && !self.source.as_ref().map(ByteSource::is_file).unwrap_or(false) {
            debug!("primary source is not file backed, reading entry into memory");
            return Ok(EntryData::Owned(self.read_entry(entry, false)?));
        }

        let start = if entry.is_embedded() {
            self.header_size as u64 + self.tree_size as u64 + entry.offset as u64
        } else {
            entry.offset as u64
        };
        let end = start + entry.length as u64;

        let map = self.map_chunk(entry.chunk_index)?;
        if end > map.len() as u64 {
            return Err(Error::invalid_format(format!(
                "entry ends at {} but the mapped chunk holds only {} bytes",
                end,
                map.len()
            )));
        }

        Ok(EntryData::Mapped(&map[start as usize..end as usize]))
    }

    fn map_chunk(&mut self, chunk_index: u16) -> Result<&Mmap> {
        match self.chunk_maps.entry(chunk_index) {
            HashMapEntry::Occupied(occupied) => Ok(occupied.into_mut()),
            HashMapEntry::Vacant(vacant) => {
                let map = if chunk_index == DIR_INDEX {
                    match &self.source {
                        Some(ByteSource::File(file)) => {
                            unsafe { Mmap::map(file) }.map_err(Error::io)?
                        }
                        _ => {
                            return Err(Error::invalid_state(
                                "primary source is not backed by a file",
                            ))
                        }
                    }
                } else {
                    let path = archive_path(&self.dirpath, &self.prefix, chunk_index);
                    let file = match fs::File::open(&path) {
                        Ok(file) => file,
                        Err(error) if error.kind() == io::ErrorKind::NotFound => {
                            return Err(Error::not_found(path))
                        }
                        Err(error) => return Err(Error::io_with_path(error, path)),
                    };
                    unsafe { Mmap::map(&file) }.map_err(|error| Error::io_with_path(error, path))?
                };

                debug!("created memory map for chunk index {}", chunk_index);
                Ok(vacant.insert(map))
            }
        }
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[inline]
    pub fn base_name(&self) -> &str {
        &self.prefix
    }

    #[inline]
    pub fn directory_path(&self) -> &Path {
        &self.dirpath
    }

    #[inline]
    pub fn is_dir_vpk(&self) -> bool {
        self.is_dir_vpk
    }

    #[inline]
    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    #[inline]
    pub fn tree_size(&self) -> u32 {
        self.tree_size
    }

    #[inline]
    pub fn file_data_size(&self) -> u32 {
        self.file_data_size
    }

    #[inline]
    pub fn chunk_hash_size(&self) -> u32 {
        self.chunk_hash_size
    }

    #[inline]
    pub fn other_md5_size(&self) -> u32 {
        self.other_md5_size
    }

    #[inline]
    pub fn signature_size(&self) -> u32 {
        self.signature_size
    }

    #[inline]
    pub fn chunk_hashes(&self) -> &[ChunkHash] {
        &self.chunk_hashes
    }

    #[inline]
    pub fn tree_checksum(&self) -> Option<&Md5> {
        if self.other_md5_size == OTHER_MD5_SIZE {
            Some(&self.tree_checksum)
        } else {
            None
        }
    }

    #[inline]
    pub fn hash_table_checksum(&self) -> Option<&Md5> {
        if self.other_md5_size == OTHER_MD5_SIZE {
            Some(&self.hash_table_checksum)
        } else {
            None
        }
    }

    #[inline]
    pub fn whole_file_checksum(&self) -> Option<&Md5> {
        if self.other_md5_size == OTHER_MD5_SIZE {
            Some(&self.whole_file_checksum)
        } else {
            None
        }
    }

    #[inline]
    pub fn signature_kind(&self) -> Option<SignatureKind> {
        self.signature_kind
    }

    #[inline]
    pub fn public_key(&self) -> Option<&[u8]> {
        if self.public_key.is_empty() {
            None
        } else {
            Some(&self.public_key)
        }
    }

    #[inline]
    pub fn signature(&self) -> Option<&[u8]> {
        if self.signature.is_empty() {
            None
        } else {
            Some(&self.signature)
        }
    }

    #[inline]
    pub fn case_policy(&self) -> Option<CasePolicy> {
        self.store.policy()
    }

    #[inline]
    pub fn file_count(&self) -> usize {
        self.store.file_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Extensions present in the archive, in insertion order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.store.extensions()
    }

    pub fn entries_for_extension(&self, type_name: &str) -> Option<&[Entry]> {
        self.store.entries_for(type_name)
    }

    /// All entries, grouped by extension in insertion order. Within each
    /// extension the order is the ingest order, or the comparator order in
    /// sorted mode.
    pub fn iter_entries(&self) -> impl Iterator<Item = &Entry> {
        self.store.iter()
    }
}

impl Default for Package {
    fn default() -> Self {
        Package::new()
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("prefix", &self.prefix)
            .field("is_dir_vpk", &self.is_dir_vpk)
            .field("version", &self.version)
            .field("tree_size", &self.tree_size)
            .field("file_count", &self.store.file_count())
            .finish_non_exhaustive()
    }
}

fn read_entry<R>(file: &mut R, type_name: &str, directory: &str, file_name: &str) -> Result<Entry>
where
    R: BufRead,
    R: Seek,
{
    let crc32 = read_u32(file)?;
    let small_size = read_u16(file)?;
    let chunk_index = read_u16(file)?;
    let offset = read_u32(file)?;
    let length = read_u32(file)?;
    let terminator = read_u16(file)?;

    if terminator != TERMINATOR {
        let offset = file.stream_position()? - 2;
        return Err(Error::invalid_format(format!(
            "illegal entry terminator 0x{:04X} at offset {}",
            terminator, offset
        )));
    }

    let mut small_data = vec![0; small_size as usize];
    file.read_exact(&mut small_data)?;

    Ok(Entry {
        type_name: type_name.to_owned(),
        directory: directory.to_owned(),
        file_name: file_name.to_owned(),
        crc32,
        length,
        offset,
        chunk_index,
        small_data,
    })
}

fn read_chunk_hashes(
    reader: &mut impl Read,
    section_size: u32,
    records: &mut Vec<ChunkHash>,
) -> Result<()> {
    let mut remaining = section_size as usize;

    while remaining >= CHUNK_HASH_SIZE {
        let mut chunk_index = read_u16(reader)?;
        let raw_kind = read_u16(reader)?;
        let offset = read_u32(reader)?;
        let length = read_u32(reader)?;
        let mut checksum: Md5 = [0; 16];
        reader.read_exact(&mut checksum)?;

        remaining -= CHUNK_HASH_SIZE;

        // Legacy encoding: a 32-bit directory-file index splits into
        // (index 0, kind 0x8000) and is rewritten as an embedded MD5
        // record.
        let hash_kind = if chunk_index == 0 && raw_kind == LEGACY_DIR_HASH_KIND {
            chunk_index = DIR_INDEX;
            HashKind::Md5
        } else {
            match HashKind::from_raw(raw_kind) {
                Some(kind) => kind,
                None => {
                    return Err(Error::invalid_format(format!(
                        "unknown hash kind 0x{:04X} in the per-chunk hash section",
                        raw_kind
                    )))
                }
            }
        };

        records.push(ChunkHash {
            chunk_index,
            hash_kind,
            offset,
            length,
            checksum,
        });
    }

    if remaining > 0 {
        warn!(
            "{} trailing bytes after the per-chunk hash section",
            remaining
        );
        let mut scratch = vec![0; remaining];
        reader.read_exact(&mut scratch)?;
    }

    records.sort_by(|a, b| (a.chunk_index, a.offset).cmp(&(b.chunk_index, b.offset)));

    Ok(())
}

fn read_signature(
    reader: &mut impl Read,
    section_size: u32,
    public_key: &mut Vec<u8>,
    signature: &mut Vec<u8>,
) -> Result<SignatureKind> {
    let first = read_u32(reader)?;

    if section_size == 20 && first == u32::from_le_bytes(VPK_MAGIC) {
        // Newer layout: fixed 20 bytes of sizes, buffers only when the
        // sizes are positive.
        let _kind = read_i32(reader)?;
        let pubkey_size = read_i32(reader)?;
        let signature_size = read_i32(reader)?;
        let _reserved = read_i32(reader)?;

        if pubkey_size > 0 {
            public_key.resize(pubkey_size as usize, 0);
            reader.read_exact(public_key)?;
        }
        if signature_size > 0 {
            signature.resize(signature_size as usize, 0);
            reader.read_exact(signature)?;
        }

        return Ok(SignatureKind::FileChecksum);
    }

    let mut remaining = section_size - 4;
    let pubkey_size = first;

    if pubkey_size as u64 > remaining as u64 {
        return Err(Error::invalid_format(format!(
            "signature section of {} bytes cannot hold a {} byte public key",
            section_size, pubkey_size
        )));
    }

    public_key.resize(pubkey_size as usize, 0);
    reader.read_exact(public_key)?;
    remaining -= pubkey_size;

    if remaining >= 4 {
        let signature_size = read_u32(reader)?;
        remaining -= 4;

        if signature_size > remaining {
            return Err(Error::invalid_format(format!(
                "signature section too small for a {} byte signature",
                signature_size
            )));
        }

        signature.resize(signature_size as usize, 0);
        reader.read_exact(signature)?;
        remaining -= signature_size;
    }

    if remaining > 0 {
        warn!("{} bytes left after the signature section", remaining);
        let mut scratch = vec![0; remaining as usize];
        reader.read_exact(&mut scratch)?;
    }

    Ok(SignatureKind::FullFile)
}
