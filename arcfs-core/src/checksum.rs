//! CRC-32 hashing while reading entry content.

use std::fmt;
use std::io::{self, Read};

use crc32fast::Hasher;

/// Hash kinds an archive can report for its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashType {
    Crc32,
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashType::Crc32 => f.write_str("crc32"),
        }
    }
}

/// Lowercase, zero-padded hex as reported for a CRC-32.
#[inline(always)]
pub fn format_crc32(crc: u32) -> String {
    format!("{:08x}", crc)
}

/// A reader that computes the CRC-32 of everything read through it.
///
/// With an expected value set, reaching end-of-data with a different CRC
/// fails the read with `InvalidData`.
pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    bytes_read: u64,
    expected: Option<u32>,
}

impl<R: Read> Crc32Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            bytes_read: 0,
            expected: None,
        }
    }

    pub fn verifying(inner: R, expected: u32) -> Self {
        Self {
            expected: Some(expected),
            ..Self::new(inner)
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_read += n as u64;
            return Ok(n);
        }

        // Empty reads are only end-of-data for non-empty buffers.
        if let Some(expected) = self.expected.filter(|_| !buf.is_empty()) {
            let actual = self.crc32();
            if actual != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "checksum mismatch: expected {}, got {}",
                        format_crc32(expected),
                        format_crc32(actual)
                    ),
                ));
            }
        }

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_while_reading() {
        let mut reader = Crc32Reader::new(&b"hello"[..]);
        let mut out = vec![];
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(reader.bytes_read(), 5);
        assert_eq!(format_crc32(reader.crc32()), "3610a686");
    }

    #[test]
    fn verifies_at_end() {
        let mut out = vec![];
        let mut good = Crc32Reader::verifying(&b"hello"[..], 0x3610a686);
        good.read_to_end(&mut out).unwrap();

        let mut bad = Crc32Reader::verifying(&b"hellp"[..], 0x3610a686);
        let err = bad.read_to_end(&mut out).unwrap_err();
        println!("{}", err);
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn format_pads() {
        assert_eq!(format_crc32(0xab), "000000ab");
    }
}
