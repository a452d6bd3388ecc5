use std::fs;
use std::io::{Read, Seek, SeekFrom};

use crc::{crc32, Hasher32};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::consts::{BUFFER_SIZE, DIR_INDEX, OTHER_MD5_SIZE};
use crate::entry::{Entry, HashKind};
use crate::extract;
use crate::io::SubStream;
use crate::package::{Md5, Package};
use crate::result::{Error, Result};
use crate::util::archive_path;

/// Streaming hasher behind the per-chunk hash records. Both variants
/// produce the 16-byte on-disk checksum; for BLAKE3 that is the first 16
/// bytes of the output.
pub(crate) enum ChunkHasher {
    Md5(md5::Context),
    Blake3(blake3::Hasher),
}

impl ChunkHasher {
    pub(crate) fn new(kind: HashKind) -> Self {
        match kind {
            HashKind::Md5 => ChunkHasher::Md5(md5::Context::new()),
            HashKind::Blake3 => ChunkHasher::Blake3(blake3::Hasher::new()),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            ChunkHasher::Md5(context) => context.consume(data),
            ChunkHasher::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    pub(crate) fn finish(self) -> Md5 {
        match self {
            ChunkHasher::Md5(context) => *context.compute(),
            ChunkHasher::Blake3(hasher) => {
                let mut out: Md5 = [0; 16];
                out.copy_from_slice(&hasher.finalize().as_bytes()[..16]);
                out
            }
        }
    }
}

/// MD5 of `size` bytes starting at `offset`.
pub(crate) fn calculate_md5<R>(reader: &mut R, offset: u64, size: u64) -> std::io::Result<Md5>
where
    R: Read,
    R: Seek,
{
    reader.seek(SeekFrom::Start(offset))?;

    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut remaining = size;
    let mut hasher = md5::Context::new();

    while remaining > 0 {
        let count = remaining.min(BUFFER_SIZE as u64) as usize;
        reader.read_exact(&mut buf[..count])?;
        hasher.consume(&buf[..count]);
        remaining -= count as u64;
    }

    Ok(*hasher.compute())
}

fn hash_blocks(reader: &mut impl Read, mut remaining: u64, hasher: &mut ChunkHasher) -> Result<()> {
    let mut buf = vec![0u8; BUFFER_SIZE];

    while remaining > 0 {
        let count = remaining.min(BUFFER_SIZE as u64) as usize;
        reader.read_exact(&mut buf[..count])?;
        hasher.update(&buf[..count]);
        remaining -= count as u64;
    }

    Ok(())
}

/// Verifies the three static MD5s of the other-MD5 block: the tree, the
/// per-chunk hash section, and the whole file up to (but excluding) the
/// whole-file checksum itself.
pub fn verify_hashes(package: &mut Package) -> Result<()> {
    if package.other_md5_size != OTHER_MD5_SIZE {
        return Err(Error::invalid_state(
            "archive carries no checksum section to verify",
        ));
    }

    let source = match package.source.as_mut() {
        Some(source) => source,
        None => return Err(Error::invalid_state("archive has no source attached")),
    };

    let header_size = package.header_size as u64;
    let tree_size = package.tree_size as u64;
    let hash_section_offset = header_size + tree_size + package.file_data_size as u64;

    let actual = calculate_md5(source, header_size, tree_size)?;
    if actual != package.tree_checksum {
        return Err(Error::hash_mismatch(
            "Tree checksum",
            &package.tree_checksum,
            &actual,
        ));
    }

    let actual = calculate_md5(source, hash_section_offset, package.chunk_hash_size as u64)?;
    if actual != package.hash_table_checksum {
        return Err(Error::hash_mismatch(
            "Hash-table checksum",
            &package.hash_table_checksum,
            &actual,
        ));
    }

    // Everything up to the whole-file checksum, which sits 32 bytes into
    // the other-MD5 block.
    let covered = hash_section_offset + package.chunk_hash_size as u64 + 32;
    let actual = calculate_md5(source, 0, covered)?;
    if actual != package.whole_file_checksum {
        return Err(Error::hash_mismatch(
            "Whole-file checksum",
            &package.whole_file_checksum,
            &actual,
        ));
    }

    Ok(())
}

/// Walks the per-chunk hash records in `(chunk index, offset)` order and
/// re-hashes each covered region. Each chunk file is opened once per group
/// and closed when the walk moves on; directory-file records go through
/// the primary source, which stays open.
pub fn verify_chunk_hashes<'a, 'b>(
    package: &mut Package,
    mut progress: Option<&'a mut (dyn FnMut(&str) + 'b)>,
) -> Result<()> {
    let data_offset = package.header_size as u64 + package.tree_size as u64;
    let mut current: Option<(u16, fs::File)> = None;

    for record in &package.chunk_hashes {
        let mut hasher = ChunkHasher::new(record.hash_kind);

        if record.chunk_index == DIR_INDEX {
            let source = match package.source.as_mut() {
                Some(source) => source,
                None => return Err(Error::invalid_state("archive has no source attached")),
            };

            let mut region = SubStream::new(
                source,
                data_offset + record.offset as u64,
                record.length as u64,
            )?;
            hash_blocks(&mut region, record.length as u64, &mut hasher)?;
        } else {
            if current.as_ref().map(|(index, _)| *index) != Some(record.chunk_index) {
                let file = extract::open_chunk(
                    &package.dirpath,
                    &package.prefix,
                    record.chunk_index,
                )?;
                current = Some((record.chunk_index, file));
            }

            if let Some((_, file)) = current.as_mut() {
                let mut region =
                    SubStream::new(file, record.offset as u64, record.length as u64)?;
                hash_blocks(&mut region, record.length as u64, &mut hasher)?;
            }
        }

        let actual = hasher.finish();
        if actual != record.checksum {
            let path = archive_path(&package.dirpath, &package.prefix, record.chunk_index);
            return Err(Error::hash_mismatch("Chunk hash", &record.checksum, &actual)
                .with_path(path));
        }

        if let Some(report) = progress.as_deref_mut() {
            report(&format!(
                "chunk {} bytes {}..{} ok",
                record.chunk_index,
                record.offset,
                record.offset as u64 + record.length as u64
            ));
        }
    }

    Ok(())
}

/// Re-reads every entry in `(chunk index, offset)` order and checks its
/// CRC32.
pub fn verify_file_checksums<'a, 'b>(
    package: &mut Package,
    mut progress: Option<&'a mut (dyn FnMut(&str) + 'b)>,
) -> Result<()> {
    let data_offset = package.header_size as u64 + package.tree_size as u64;

    let mut files: Vec<&Entry> = package.store.iter().collect();
    files.sort_by(|a, b| (a.chunk_index, a.offset).cmp(&(b.chunk_index, b.offset)));

    let mut digest = crc32::Digest::new(crc32::IEEE);

    for entry in files {
        digest.reset();
        extract::read_entry_body(
            package.source.as_mut(),
            data_offset,
            &package.dirpath,
            &package.prefix,
            entry,
            &mut |data| {
                digest.write(data);
                Ok(())
            },
        )?;

        let actual = digest.sum32();
        if actual != entry.crc32 {
            return Err(Error::crc_mismatch(entry.crc32, actual));
        }

        if let Some(report) = progress.as_deref_mut() {
            report(&format!("{} ok", entry.full_path()));
        }
    }

    Ok(())
}

/// Verifies the RSA-SHA256 signature over everything before the signature
/// section. An archive without a public key or signature counts as valid.
pub fn verify_signature(package: &mut Package) -> Result<()> {
    if package.public_key.is_empty() || package.signature.is_empty() {
        return Ok(());
    }

    let key = match RsaPublicKey::from_public_key_der(&package.public_key) {
        Ok(key) => key,
        Err(error) => {
            debug!("cannot import public key: {}", error);
            return Err(Error::signature_invalid());
        }
    };

    let signed_length = package.header_size as u64
        + package.tree_size as u64
        + package.file_data_size as u64
        + package.chunk_hash_size as u64
        + package.other_md5_size as u64;

    let source = match package.source.as_mut() {
        Some(source) => source,
        None => return Err(Error::invalid_state("archive has no source attached")),
    };

    source.seek(SeekFrom::Start(0))?;

    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut remaining = signed_length;
    let mut hasher = Sha256::new();

    while remaining > 0 {
        let count = remaining.min(BUFFER_SIZE as u64) as usize;
        source.read_exact(&mut buf[..count])?;
        hasher.update(&buf[..count]);
        remaining -= count as u64;
    }

    let digest = hasher.finalize();

    key.verify(
        Pkcs1v15Sign::new::<Sha256>(),
        digest.as_slice(),
        &package.signature,
    )
    .map_err(|_| Error::signature_invalid())
}

/// Boolean form of [`verify_signature`]; any failure, including a key that
/// does not import, reads as invalid.
pub fn is_signature_valid(package: &mut Package) -> bool {
    verify_signature(package).is_ok()
}

/// Runs every integrity check the archive carries material for: the three
/// section MD5s, the per-chunk hashes, the per-file CRCs, and the
/// signature.
pub fn verify_all<'a>(package: &mut Package, mut progress: Option<&'a mut dyn FnMut(&str)>) -> Result<()> {
    if package.other_md5_size == OTHER_MD5_SIZE {
        verify_hashes(package)?;
    }

    verify_chunk_hashes(package, progress.as_deref_mut())?;
    verify_file_checksums(package, progress.as_deref_mut())?;
    verify_signature(package)
}
