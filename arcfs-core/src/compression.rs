use std::fmt;
use std::io::{Read, Result};

use flate2::read::DeflateDecoder;
use zip::CompressionMethod;

/// Entries smaller than this many bytes are stored; anything larger is deflated.
pub const STORE_THRESHOLD: u64 = 10;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Compression {
    Stored,
    Deflate,
    Unknown(u16),
}

impl Default for Compression {
    fn default() -> Self {
        Self::Stored
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Compression::*;

        let s = match self {
            Stored => "stored",
            Deflate => "DEFLATE",
            Unknown(id) => return write!(f, "Unknown(id: {:x})", id),
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Compression {
    /// The method used when writing an entry of `size` bytes.
    #[inline(always)]
    pub fn for_size(size: u64) -> Compression {
        if size < STORE_THRESHOLD {
            Compression::Stored
        } else {
            Compression::Deflate
        }
    }

    /// Maps a zip method id as stored in an entry header.
    pub const fn from_id(id: u16) -> Compression {
        match id {
            METHOD_STORED => Compression::Stored,
            METHOD_DEFLATE => Compression::Deflate,
            id => Compression::Unknown(id),
        }
    }

    /// Maps the method the zip crate reports for an entry.
    #[allow(deprecated)]
    pub fn from_zip(method: CompressionMethod) -> Compression {
        Compression::from_id(method.to_u16())
    }

    pub fn to_zip(self) -> Option<CompressionMethod> {
        match self {
            Compression::Stored => Some(CompressionMethod::Stored),
            Compression::Deflate => Some(CompressionMethod::Deflated),
            Compression::Unknown(_) => None,
        }
    }

    /// Wraps the raw entry bytes in `reader` with a decoder for this method.
    pub fn decompress<'a, R: Read + Send + 'a>(self, reader: R) -> Result<Box<dyn Read + Send + 'a>> {
        use Compression::*;

        match self {
            Stored => Ok(Box::new(reader)),
            Deflate => Ok(Box::new(DeflateDecoder::new(reader))),
            Unknown(id) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Cannot handle compression with id {}", id),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    #[test]
    fn method_by_size() {
        assert_eq!(Compression::for_size(0), Compression::Stored);
        assert_eq!(Compression::for_size(9), Compression::Stored);
        assert_eq!(Compression::for_size(10), Compression::Deflate);
        assert_eq!(Compression::for_size(u64::MAX), Compression::Deflate);
    }

    #[test]
    fn zip_methods() {
        assert_eq!(Compression::from_id(8), Compression::Deflate);
        assert_eq!(Compression::from_id(0), Compression::Stored);
        assert_eq!(Compression::from_id(93), Compression::Unknown(93));
        assert_eq!(
            Compression::Stored.to_zip(),
            Some(CompressionMethod::Stored)
        );
        assert_eq!(Compression::Unknown(99).to_zip(), None);
        assert_eq!(
            Compression::from_zip(CompressionMethod::Deflated),
            Compression::Deflate
        );
        assert_eq!(
            Compression::from_zip(CompressionMethod::IMPLODE),
            Compression::Unknown(6)
        );
    }

    #[test]
    fn inflate() {
        let mut encoder = DeflateEncoder::new(vec![], flate2::Compression::default());
        encoder.write_all(b"hello hello hello hello").unwrap();
        let raw = encoder.finish().unwrap();

        let mut out = String::new();
        Compression::Deflate
            .decompress(&raw[..])
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello hello hello hello");
    }

    #[test]
    fn unknown_method() {
        assert!(Compression::Unknown(12).decompress(&b""[..]).is_err());
    }
}
