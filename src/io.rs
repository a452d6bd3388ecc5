use std::fs;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom, Write};

use crate::result::{Error, Result};

#[inline]
pub(crate) fn read_u16(file: &mut impl Read) -> io::Result<u16> {
    let mut buffer = [0; 2];
    file.read_exact(&mut buffer)?;

    Ok(u16::from_le_bytes(buffer))
}

#[inline]
pub(crate) fn read_u32(file: &mut impl Read) -> io::Result<u32> {
    let mut buffer = [0; 4];
    file.read_exact(&mut buffer)?;

    Ok(u32::from_le_bytes(buffer))
}

#[inline]
pub(crate) fn read_i32(file: &mut impl Read) -> io::Result<i32> {
    let mut buffer = [0; 4];
    file.read_exact(&mut buffer)?;

    Ok(i32::from_le_bytes(buffer))
}

/// Reads bytes up to and including the next NUL into `buffer` and returns
/// them as a string slice, without the NUL. The buffer is reused between
/// calls to avoid re-allocating in the tree walk.
pub(crate) fn read_str<'a>(file: &mut impl BufRead, buffer: &'a mut Vec<u8>) -> Result<&'a str> {
    buffer.clear();
    file.read_until(0, buffer)?;

    match buffer.last() {
        Some(0) => {
            buffer.pop();
        }
        _ => {
            return Err(Error::io(io::ErrorKind::UnexpectedEof.into()));
        }
    }

    Ok(std::str::from_utf8(buffer)?)
}

#[inline]
pub(crate) fn write_u16(file: &mut impl Write, value: u16) -> io::Result<()> {
    file.write_all(&value.to_le_bytes())
}

#[inline]
pub(crate) fn write_u32(file: &mut impl Write, value: u32) -> io::Result<()> {
    file.write_all(&value.to_le_bytes())
}

#[inline]
pub(crate) fn write_str(file: &mut impl Write, value: &str) -> io::Result<()> {
    file.write_all(value.as_bytes())?;
    file.write_all(&[0])
}

/// The primary byte source of an archive: either a file on disk or an
/// in-memory buffer.
pub(crate) enum ByteSource {
    File(fs::File),
    Memory(Cursor<Vec<u8>>),
}

impl ByteSource {
    #[inline]
    pub(crate) fn is_file(&self) -> bool {
        matches!(self, ByteSource::File(_))
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::File(file) => file.read(buf),
            ByteSource::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            ByteSource::File(file) => file.seek(pos),
            ByteSource::Memory(cursor) => cursor.seek(pos),
        }
    }
}

/// A bounded read-only view over a base stream, used to hash or copy a
/// region without pulling it into memory. Seeks the base stream once on
/// construction; views over the same stream must be used one at a time.
pub(crate) struct SubStream<'a, R: Read + Seek> {
    inner: &'a mut R,
    remaining: u64,
}

impl<'a, R: Read + Seek> SubStream<'a, R> {
    pub(crate) fn new(inner: &'a mut R, offset: u64, length: u64) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(offset))?;

        Ok(SubStream {
            inner,
            remaining: length,
        })
    }
}

impl<R: Read + Seek> Read for SubStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }

        let max = self.remaining.min(buf.len() as u64) as usize;
        let count = self.inner.read(&mut buf[..max])?;
        self.remaining -= count as u64;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 0x7FFF).unwrap();
        write_u32(&mut buf, 0x55AA1234).unwrap();
        write_str(&mut buf, "vmt").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u16(&mut cursor).unwrap(), 0x7FFF);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0x55AA1234);

        let mut scratch = Vec::new();
        assert_eq!(read_str(&mut cursor, &mut scratch).unwrap(), "vmt");
    }

    #[test]
    fn read_str_without_nul_is_an_error() {
        let mut cursor = Cursor::new(b"unterminated".to_vec());
        let mut scratch = Vec::new();
        assert!(read_str(&mut cursor, &mut scratch).is_err());
    }

    #[test]
    fn sub_stream_is_bounded() {
        let mut cursor = Cursor::new(b"0123456789".to_vec());
        let mut sub = SubStream::new(&mut cursor, 2, 5).unwrap();

        let mut out = Vec::new();
        sub.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"23456");
    }

    #[test]
    fn sub_stream_past_end_reads_short() {
        let mut cursor = Cursor::new(b"0123".to_vec());
        let mut sub = SubStream::new(&mut cursor, 2, 100).unwrap();

        let mut out = Vec::new();
        sub.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"23");
    }
}
