//! Zstandard decompression (requires the `compression` feature).
//!
//! Zstd shows up in modern console content in two shapes:
//!
//! * **whole entries** - one Zstd frame per resource; use [`Zstd`] as the
//!   resource's exporter.
//! * **blocks** - NCZ-style sections split into independently compressed
//!   frames; wrap [`Zstd`] in a [`super::Blocks`] aggregator.
//!
//! Frames may or may not record their content size, so a declared
//! decompressed length only caps the output.
//!
//! Without the feature the exporter still exists and every open fails with
//! [`crate::Error::UnsupportedTransform`].

use std::io::Read;

use super::{Exporter, Input};
use crate::Result;

/// Zstandard exporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zstd;

impl Exporter for Zstd {
    fn name(&self) -> &str {
        "zstd"
    }

    #[cfg(feature = "compression")]
    fn open(&self, input: Input, decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        let decoder = zstd::stream::read::Decoder::new(input.into_reader())?;
        match decompressed_len {
            Some(n) => Ok(Box::new(decoder.take(n))),
            None => Ok(Box::new(decoder)),
        }
    }

    #[cfg(not(feature = "compression"))]
    fn open(&self, _input: Input, _decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        Err(crate::Error::unsupported("zstd"))
    }
}

#[cfg(all(test, feature = "compression"))]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::context::Control;

    #[test]
    fn decodes_frame() {
        let plain = b"zstd frame contents ".repeat(50);
        let packed = zstd::encode_all(&plain[..], 3).unwrap();
        let len = packed.len() as u64;
        let c = Container::from_bytes("f.zst", packed);
        let input = Input::range(&c, 0, len, Control::new()).unwrap();
        let mut out = Vec::new();
        Zstd.open(input, Some(plain.len() as u64))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, plain);
    }
}
