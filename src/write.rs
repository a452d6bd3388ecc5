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
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::consts::{
    CHUNK_HASH_SIZE, DEFAULT_MD5_CHUNK_SIZE, DIR_INDEX, ENTRY_RECORD_SIZE, MAX_CHUNK_COUNT,
    OTHER_MD5_SIZE, TERMINATOR, V1_HEADER_SIZE, V2_HEADER_SIZE, VPK_MAGIC,
};
use crate::entry::{ChunkHash, Entry, HashKind};
use crate::extract;
use crate::io::{write_str, write_u16, write_u32, ByteSource};
use crate::package::Package;
use crate::result::{Error, Result};
use crate::util::{archive_path, split_archive_name};
use crate::verify::calculate_md5;

pub struct WriteOptions {
    /// Maximum chunk size for a multi-chunk write; `None` embeds all data
    /// in the directory file.
    pub chunk_size: Option<u32>,
    /// Size of the fractions covered by the per-chunk hash records.
    pub md5_chunk_size: u32,
}

impl WriteOptions {
    #[inline]
    pub fn new() -> Self {
        WriteOptions::default()
    }
}

impl Default for WriteOptions {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: None,
            md5_chunk_size: DEFAULT_MD5_CHUNK_SIZE,
        }
    }
}

/// Writes the package as a version 2 archive. The directory file is
/// `<base>_dir.vpk`; a multi-chunk write places all entry data in
/// `<base>_NNN.vpk` siblings, a single-file write embeds it. Preload
/// bytes are folded into the data region, so every written record has a
/// preload size of zero.
pub fn write(
    package: &mut Package,
    dirvpk_path: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<()> {
    if package.store.is_empty() {
        return Err(Error::invalid_state("cannot write an archive with no entries"));
    }
    if options.chunk_size == Some(0) {
        return Err(Error::out_of_range("chunk size must be greater than zero"));
    }
    if options.md5_chunk_size == 0 {
        return Err(Error::out_of_range("MD5 chunk size must be greater than zero"));
    }

    let (out_dir, out_prefix, _) = split_archive_name(dirvpk_path.as_ref());
    let dirvpk_out = archive_path(&out_dir, &out_prefix, DIR_INDEX);

    // Flatten the store in insertion order and group by extension and
    // directory for the tree.
    let mut entries: Vec<&Entry> = Vec::new();
    let mut groups: Vec<(&str, Vec<(&str, Vec<usize>)>)> = Vec::new();

    for type_name in package.store.extensions() {
        let list = match package.store.entries_for(type_name) {
            Some(list) => list,
            None => continue,
        };

        let mut dirs: Vec<(&str, Vec<usize>)> = Vec::new();
        for entry in list {
            let index = entries.len();
            entries.push(entry);

            match dirs
                .iter_mut()
                .find(|(directory, _)| *directory == entry.directory.as_str())
            {
                Some((_, items)) => items.push(index),
                None => dirs.push((entry.directory.as_str(), vec![index])),
            }
        }

        groups.push((type_name, dirs));
    }

    // Next-fit chunk placement. Files are never split, so a single entry
    // may exceed the chunk size and simply occupies its chunk alone.
    let mut placements: Vec<(u16, u32)> = Vec::with_capacity(entries.len());

    match options.chunk_size {
        None => {
            let mut offset = 0u64;
            for entry in &entries {
                if offset + entry.total_length() > u32::MAX as u64 {
                    return Err(Error::out_of_range("embedded data region exceeds 4 GiB"));
                }
                placements.push((DIR_INDEX, offset as u32));
                offset += entry.total_length();
            }
        }
        Some(chunk_size) => {
            let mut chunk_index = 0u16;
            let mut offset = 0u64;
            for entry in &entries {
                if offset >= chunk_size as u64 {
                    if chunk_index + 1 >= MAX_CHUNK_COUNT {
                        return Err(Error::too_many_chunks(chunk_index as usize + 2));
                    }
                    chunk_index += 1;
                    offset = 0;
                }
                if entry.total_length() > u32::MAX as u64 {
                    return Err(Error::out_of_range("entry is larger than 4 GiB"));
                }
                if offset > u32::MAX as u64 {
                    return Err(Error::out_of_range("chunk offset exceeds 4 GiB"));
                }
                placements.push((chunk_index, offset as u32));
                offset += entry.total_length();
            }
        }
    }

    let mut tree_size = 1u64;
    for (type_name, dirs) in &groups {
        tree_size += type_name.len() as u64 + 1 + 1;
        for (directory, items) in dirs {
            tree_size += directory.len() as u64 + 1 + 1;
            for &index in items {
                tree_size +=
                    entries[index].file_name.len() as u64 + 1 + ENTRY_RECORD_SIZE as u64;
            }
        }
    }

    if tree_size > i32::MAX as u64 {
        return Err(Error::out_of_range(format!(
            "tree too large: {} > {}",
            tree_size,
            i32::MAX
        )));
    }
    let tree_size = tree_size as u32;
    let data_start = V2_HEADER_SIZE as u64 + tree_size as u64;

    let mut dirfile = match fs::File::create(&dirvpk_out) {
        Ok(file) => file,
        Err(error) => return Err(Error::io_with_path(error, dirvpk_out)),
    };

    if let Err(error) = write_tree(
        &mut BufWriter::new(&mut dirfile),
        &entries,
        &groups,
        &placements,
        tree_size,
    ) {
        return Err(Error::io_with_path(error, dirvpk_out));
    }

    let written = dirfile.stream_position()?;
    if written != data_start {
        return Err(Error::invalid_state(
            "internal error: written tree does not match the calculated size",
        )
        .with_path(dirvpk_out));
    }

    // Entry data, in placement order.
    let src_data_offset = package.header_size as u64 + package.tree_size as u64;
    let mut file_data_size = 0u32;

    match options.chunk_size {
        None => {
            let mut written = 0u64;
            let mut writer = BufWriter::new(&mut dirfile);
            for entry in &entries {
                copy_entry_data(
                    package.source.as_mut(),
                    src_data_offset,
                    &package.dirpath,
                    &package.prefix,
                    entry,
                    &mut writer,
                )?;
                written += entry.total_length();
            }
            writer.flush()?;
            file_data_size = written as u32;
        }
        Some(_) => {
            let mut index = 0;
            while index < entries.len() {
                let chunk_index = placements[index].0;
                let chunk_path = archive_path(&out_dir, &out_prefix, chunk_index);

                let chunkfile = match fs::File::create(&chunk_path) {
                    Ok(file) => file,
                    Err(error) => return Err(Error::io_with_path(error, chunk_path)),
                };
                let mut writer = BufWriter::new(chunkfile);

                while index < entries.len() && placements[index].0 == chunk_index {
                    copy_entry_data(
                        package.source.as_mut(),
                        src_data_offset,
                        &package.dirpath,
                        &package.prefix,
                        entries[index],
                        &mut writer,
                    )?;
                    index += 1;
                }

                if let Err(error) = writer.flush() {
                    return Err(Error::io_with_path(error, chunk_path));
                }
            }
        }
    }

    // Hash every written chunk file in fractions of `md5_chunk_size`.
    let mut chunk_hashes: Vec<ChunkHash> = Vec::new();

    if options.chunk_size.is_some() {
        let last_chunk = placements.last().map(|p| p.0).unwrap_or(0);
        let mut buf = vec![0u8; options.md5_chunk_size as usize];

        for chunk_index in 0..=last_chunk {
            let chunk_path = archive_path(&out_dir, &out_prefix, chunk_index);
            let mut reader = match fs::File::open(&chunk_path) {
                Ok(file) => file,
                Err(error) => return Err(Error::io_with_path(error, chunk_path)),
            };

            let size = match reader.metadata() {
                Ok(meta) => meta.len(),
                Err(error) => return Err(Error::io_with_path(error, chunk_path)),
            };
            if size > u32::MAX as u64 {
                return Err(Error::out_of_range("chunk file exceeds 4 GiB").with_path(chunk_path));
            }

            let mut offset = 0u32;
            let mut remaining = size;
            while remaining > 0 {
                let count = remaining.min(options.md5_chunk_size as u64) as usize;
                if let Err(error) = reader.read_exact(&mut buf[..count]) {
                    return Err(Error::io_with_path(error, chunk_path));
                }

                chunk_hashes.push(ChunkHash {
                    chunk_index,
                    hash_kind: HashKind::Md5,
                    offset,
                    length: count as u32,
                    checksum: *md5::compute(&buf[..count]),
                });

                offset += count as u32;
                remaining -= count as u64;
            }
        }
    }

    let chunk_hash_size = chunk_hashes.len() as u64 * CHUNK_HASH_SIZE as u64;
    if chunk_hash_size > u32::MAX as u64 {
        return Err(Error::out_of_range(format!(
            "per-chunk hash section too large: {} bytes",
            chunk_hash_size
        )));
    }
    let chunk_hash_size = chunk_hash_size as u32;

    let hash_section_offset = data_start + file_data_size as u64;
    dirfile.seek(SeekFrom::Start(hash_section_offset))?;

    {
        let mut writer = BufWriter::new(&mut dirfile);
        for record in &chunk_hashes {
            write_u16(&mut writer, record.chunk_index)?;
            write_u16(&mut writer, record.hash_kind.to_raw())?;
            write_u32(&mut writer, record.offset)?;
            write_u32(&mut writer, record.length)?;
            writer.write_all(&record.checksum)?;
        }
        writer.flush()?;
    }

    // Patch the four size fields the placeholder header left zeroed.
    dirfile.seek(SeekFrom::Start(V1_HEADER_SIZE as u64))?;
    write_u32(&mut dirfile, file_data_size)?;
    write_u32(&mut dirfile, chunk_hash_size)?;
    write_u32(&mut dirfile, OTHER_MD5_SIZE)?;
    write_u32(&mut dirfile, 0)?;

    // The three summaries are computed from the file as written. The
    // whole-file summary covers the tree and hash-table checksums, so
    // those two must be on disk first.
    let other_md5_offset = hash_section_offset + chunk_hash_size as u64;
    let mut dirreader = match fs::File::open(&dirvpk_out) {
        Ok(file) => file,
        Err(error) => return Err(Error::io_with_path(error, dirvpk_out)),
    };

    let tree_checksum = calculate_md5(&mut dirreader, V2_HEADER_SIZE as u64, tree_size as u64)?;
    let hash_table_checksum =
        calculate_md5(&mut dirreader, hash_section_offset, chunk_hash_size as u64)?;

    dirfile.seek(SeekFrom::Start(other_md5_offset))?;
    dirfile.write_all(&tree_checksum)?;
    dirfile.write_all(&hash_table_checksum)?;

    let whole_file_checksum = calculate_md5(&mut dirreader, 0, other_md5_offset + 32)?;
    dirfile.write_all(&whole_file_checksum)?;

    package.sealed = true;

    Ok(())
}

fn write_tree(
    writer: &mut impl Write,
    entries: &[&Entry],
    groups: &[(&str, Vec<(&str, Vec<usize>)>)],
    placements: &[(u16, u32)],
    tree_size: u32,
) -> std::io::Result<()> {
    writer.write_all(&VPK_MAGIC)?;
    write_u32(writer, 2)?;
    write_u32(writer, tree_size)?;

    // placeholder for the four section sizes
    writer.write_all(&[0; 16])?;

    for (type_name, dirs) in groups {
        write_str(writer, type_name)?;

        for (directory, items) in dirs {
            write_str(writer, directory)?;

            for &index in items {
                let entry = entries[index];
                let (chunk_index, offset) = placements[index];

                write_str(writer, &entry.file_name)?;
                write_u32(writer, entry.crc32)?;
                write_u16(writer, 0)?; // preload moves into the data region
                write_u16(writer, chunk_index)?;
                write_u32(writer, offset)?;
                write_u32(writer, entry.total_length() as u32)?;
                write_u16(writer, TERMINATOR)?;
            }
            writer.write_all(&[0])?;
        }
        writer.write_all(&[0])?;
    }
    writer.write_all(&[0])?;

    writer.flush()
}

fn copy_entry_data(
    source: Option<&mut ByteSource>,
    src_data_offset: u64,
    dirpath: &Path,
    prefix: &str,
    entry: &Entry,
    writer: &mut impl Write,
) -> Result<()> {
    extract::read_entry_body(source, src_data_offset, dirpath, prefix, entry, &mut |data| {
        writer.write_all(data).map_err(Error::io)
    })
}
