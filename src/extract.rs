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

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Deref;
use std::path::Path;

use crc::{crc32, Hasher32};

use crate::consts::{BUFFER_SIZE, DIR_INDEX};
use crate::entry::Entry;
use crate::io::{ByteSource, SubStream};
use crate::package::Package;
use crate::result::{Error, Result};
use crate::util::{archive_path, vpk_path_to_fs};

/// Opens the external chunk file backing `chunk_index`.
pub(crate) fn open_chunk(dirpath: &Path, prefix: &str, chunk_index: u16) -> Result<fs::File> {
    let path = archive_path(dirpath, prefix, chunk_index);

    match fs::File::open(&path) {
        Ok(file) => Ok(file),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Err(Error::not_found(path)),
        Err(error) => Err(Error::io_with_path(error, path)),
    }
}

/// Feeds an entry's bytes to `callback` in order: the preload block first,
/// then the archive bytes from the primary source (embedded entries) or
/// from the sibling chunk file. The chunk handle lives for this call only;
/// the primary source is seeked but never closed.
pub(crate) fn read_entry_body(
    source: Option<&mut ByteSource>,
    data_offset: u64,
    dirpath: &Path,
    prefix: &str,
    entry: &Entry,
    callback: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    if !entry.small_data.is_empty() {
        callback(&entry.small_data)?;
    }

    if entry.length == 0 {
        return Ok(());
    }

    if entry.chunk_index == DIR_INDEX {
        let source = match source {
            Some(source) => source,
            None => {
                return Err(Error::invalid_state(
                    "entry references the archive body but no source is attached",
                ))
            }
        };

        let mut body = SubStream::new(source, data_offset + entry.offset as u64, entry.length as u64)?;
        feed_blocks(&mut body, entry.length as u64, callback)
    } else {
        let mut file = open_chunk(dirpath, prefix, entry.chunk_index)?;
        file.seek(SeekFrom::Start(entry.offset as u64))?;
        feed_blocks(&mut file, entry.length as u64, callback)
    }
}

fn feed_blocks(
    reader: &mut impl Read,
    mut remaining: u64,
    callback: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    let mut buf = vec![0u8; BUFFER_SIZE];

    while remaining > 0 {
        let count = remaining.min(BUFFER_SIZE as u64) as usize;
        reader.read_exact(&mut buf[..count])?;
        callback(&buf[..count])?;
        remaining -= count as u64;
    }

    Ok(())
}

/// Copies an entry's bytes into `out`, which must be exactly
/// `total_length` bytes.
pub(crate) fn read_entry_into(
    source: Option<&mut ByteSource>,
    data_offset: u64,
    dirpath: &Path,
    prefix: &str,
    entry: &Entry,
    out: &mut [u8],
) -> Result<()> {
    let mut position = 0;

    read_entry_body(source, data_offset, dirpath, prefix, entry, &mut |data| {
        out[position..position + data.len()].copy_from_slice(data);
        position += data.len();
        Ok(())
    })
}

enum Body<'a> {
    None,
    Embedded(SubStream<'a, ByteSource>),
    External(io::Take<fs::File>),
}

/// Reader over an entry's bytes: preload first, then the resolved archive
/// region.
pub struct EntryStream<'a> {
    preload: &'a [u8],
    position: usize,
    body: Body<'a>,
}

impl Read for EntryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position < self.preload.len() {
            let count = buf.len().min(self.preload.len() - self.position);
            buf[..count].copy_from_slice(&self.preload[self.position..self.position + count]);
            self.position += count;
            return Ok(count);
        }

        match &mut self.body {
            Body::None => Ok(0),
            Body::Embedded(stream) => stream.read(buf),
            Body::External(file) => file.read(buf),
        }
    }
}

pub(crate) fn open_entry_stream<'a>(
    source: Option<&'a mut ByteSource>,
    data_offset: u64,
    dirpath: &Path,
    prefix: &str,
    entry: &'a Entry,
) -> Result<EntryStream<'a>> {
    let body = if entry.length == 0 {
        Body::None
    } else if entry.chunk_index == DIR_INDEX {
        let source = match source {
            Some(source) => source,
            None => {
                return Err(Error::invalid_state(
                    "entry references the archive body but no source is attached",
                ))
            }
        };

        Body::Embedded(SubStream::new(
            source,
            data_offset + entry.offset as u64,
            entry.length as u64,
        )?)
    } else {
        let mut file = open_chunk(dirpath, prefix, entry.chunk_index)?;
        file.seek(SeekFrom::Start(entry.offset as u64))?;
        Body::External(file.take(entry.length as u64))
    };

    Ok(EntryStream {
        preload: &entry.small_data,
        position: 0,
        body,
    })
}

/// Entry bytes handed out by the resolver: either a fresh buffer or a view
/// into one of the archive's memory maps.
pub enum EntryData<'a> {
    Owned(Vec<u8>),
    Mapped(&'a [u8]),
}

impl Deref for EntryData<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            EntryData::Owned(data) => data,
            EntryData::Mapped(data) => data,
        }
    }
}

impl AsRef<[u8]> for EntryData<'_> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

pub struct ExtractOptions<'a> {
    /// Validate each entry's CRC32 while it is written out.
    pub validate_crc: bool,
    /// Only extract entries whose full path equals or lies below one of
    /// these logical paths.
    pub filter: Option<&'a [&'a str]>,
}

impl ExtractOptions<'_> {
    #[inline]
    pub fn new() -> Self {
        ExtractOptions::default()
    }
}

impl Default for ExtractOptions<'_> {
    #[inline]
    fn default() -> Self {
        Self {
            validate_crc: false,
            filter: None,
        }
    }
}

fn matches_filter(path: &str, filter: Option<&[&str]>) -> bool {
    match filter {
        None => true,
        Some(prefixes) => prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_matches('/');
            path == prefix
                || (path.len() > prefix.len()
                    && path.starts_with(prefix)
                    && path.as_bytes()[prefix.len()] == b'/')
        }),
    }
}

/// Materializes entries below `outdir`, preserving their logical paths.
/// Entries are visited in `(chunk index, offset)` order so each chunk file
/// is walked sequentially.
pub fn extract_all(
    package: &mut Package,
    outdir: impl AsRef<Path>,
    options: &ExtractOptions,
    mut progress: Option<&mut dyn FnMut(&str)>,
) -> Result<()> {
    let data_offset = package.header_size as u64 + package.tree_size as u64;

    let mut files: Vec<&Entry> = package.store.iter().collect();
    files.sort_by(|a, b| (a.chunk_index, a.offset).cmp(&(b.chunk_index, b.offset)));

    let mut digest = crc32::Digest::new(crc32::IEEE);

    for entry in files {
        let path = entry.full_path();
        if !matches_filter(&path, options.filter) {
            continue;
        }

        let outpath = vpk_path_to_fs(&outdir, &path);
        if let Some(parent) = outpath.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                return Err(Error::io_with_path(error, parent));
            }
        }

        let mut writer = match fs::File::create(&outpath) {
            Ok(writer) => writer,
            Err(error) => return Err(Error::io_with_path(error, outpath)),
        };

        digest.reset();
        read_entry_body(
            package.source.as_mut(),
            data_offset,
            &package.dirpath,
            &package.prefix,
            entry,
            &mut |data| {
                if let Err(error) = writer.write_all(data) {
                    return Err(Error::io_with_path(error, &outpath));
                }
                digest.write(data);
                Ok(())
            },
        )?;

        if options.validate_crc {
            let actual = digest.sum32();
            if actual != entry.crc32 {
                return Err(Error::crc_mismatch(entry.crc32, actual).with_path(outpath));
            }
        }

        if let Some(report) = progress.as_deref_mut() {
            report(&format!("extracted {}", path));
        }
    }

    Ok(())
}
