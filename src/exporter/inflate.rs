//! Deflate-family decompression via `flate2`.
//!
//! Most archives store a decompressed length next to the compressed one and
//! the stream is capped at it. Some never record it; for those use
//! [`Inflate::size_from_stream`], which ignores any length hint and decodes until the
//! compressed stream ends, so the decompressed size is discovered from the
//! data itself.

use std::io::Read;

use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};

use super::{Exporter, Input};
use crate::Result;

/// Container framing around the deflate payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    /// RFC 1950 (2-byte header, Adler-32 trailer).
    Zlib,
    /// Bare RFC 1951 stream.
    Raw,
    /// RFC 1952, concatenated members read as one stream.
    Gzip,
}

/// Deflate-family exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inflate {
    wrapper: Wrapper,
    sized: bool,
}

impl Inflate {
    pub fn zlib() -> Self {
        Self {
            wrapper: Wrapper::Zlib,
            sized: true,
        }
    }

    pub fn raw() -> Self {
        Self {
            wrapper: Wrapper::Raw,
            sized: true,
        }
    }

    pub fn gzip() -> Self {
        Self {
            wrapper: Wrapper::Gzip,
            sized: true,
        }
    }

    /// Compressed-size-only mode: ignore any declared decompressed length.
    pub fn size_from_stream(mut self) -> Self {
        self.sized = false;
        self
    }

    pub fn wrapper(&self) -> Wrapper {
        self.wrapper
    }

    pub fn is_sized(&self) -> bool {
        self.sized
    }
}

impl Exporter for Inflate {
    fn name(&self) -> &str {
        match (self.wrapper, self.sized) {
            (Wrapper::Zlib, true) => "zlib",
            (Wrapper::Zlib, false) => "zlib-unsized",
            (Wrapper::Raw, _) => "deflate",
            (Wrapper::Gzip, _) => "gzip",
        }
    }

    fn open(&self, input: Input, decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        let raw = input.into_reader();
        let decoder: Box<dyn Read + Send> = match self.wrapper {
            Wrapper::Zlib => Box::new(ZlibDecoder::new(raw)),
            Wrapper::Raw => Box::new(DeflateDecoder::new(raw)),
            Wrapper::Gzip => Box::new(MultiGzDecoder::new(raw)),
        };
        match decompressed_len {
            Some(n) if self.sized => Ok(Box::new(decoder.take(n))),
            _ => Ok(decoder),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::{DeflateEncoder, ZlibEncoder};

    use super::*;
    use crate::container::Container;
    use crate::context::Control;

    fn run(exporter: Inflate, packed: Vec<u8>, hint: Option<u64>) -> Vec<u8> {
        let len = packed.len() as u64;
        let c = Container::from_bytes("z.bin", packed);
        let input = Input::range(&c, 0, len, Control::new()).unwrap();
        let mut out = Vec::new();
        exporter
            .open(input, hint)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn zlib_sized() {
        let plain = vec![7u8; 4096];
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::best());
        enc.write_all(&plain).unwrap();
        let out = run(Inflate::zlib(), enc.finish().unwrap(), Some(4096));
        assert_eq!(out, plain);
    }

    #[test]
    fn unsized_discovers_length() {
        let plain: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&plain).unwrap();
        let packed = enc.finish().unwrap();
        let placeholder = Some(packed.len() as u64);
        let out = run(Inflate::zlib().size_from_stream(), packed, placeholder);
        assert_eq!(out.len(), 3000);
        assert_eq!(out, plain);
    }

    #[test]
    fn raw_deflate() {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::fast());
        enc.write_all(b"raw deflate payload").unwrap();
        let out = run(Inflate::raw(), enc.finish().unwrap(), None);
        assert_eq!(out, b"raw deflate payload");
    }
}
