//! LZ4 block decompression (requires the `compression` feature).
//!
//! LZ4 blocks carry no length of their own. When the directory declares the
//! decompressed size it is used directly; otherwise the payload must be in
//! the **size-prepended block format** (a little-endian `u32` decompressed
//! byte count followed by the raw block), matching
//! [`lz4_flex::decompress_size_prepended`].
//!
//! The whole block is decoded on open; LZ4 blocks are small in practice.

use std::io::Read;

use super::{Exporter, Input};
use crate::Result;

/// Largest decoded block accepted, whether declared or size-prepended.
pub const MAX_BLOCK: u64 = 1 << 30;

/// LZ4 block exporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4;

impl Exporter for Lz4 {
    fn name(&self) -> &str {
        "lz4"
    }

    #[cfg(feature = "compression")]
    fn open(&self, input: Input, decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        use crate::{Bound, Error};

        let mut packed = Vec::new();
        input.into_reader().read_to_end(&mut packed)?;
        let (size, block) = match decompressed_len {
            Some(n) => (n, packed.as_slice()),
            None => {
                let (prefix, block) = packed.split_first_chunk::<4>().ok_or(Error::Lz4)?;
                (u64::from(u32::from_le_bytes(*prefix)), block)
            }
        };
        if size > MAX_BLOCK {
            return Err(Error::out_of_bounds(Bound::Length, size, MAX_BLOCK));
        }
        let plain = lz4_flex::block::decompress(block, size as usize).map_err(|_| Error::Lz4)?;
        Ok(Box::new(std::io::Cursor::new(plain)))
    }

    #[cfg(not(feature = "compression"))]
    fn open(&self, _input: Input, _decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        Err(crate::Error::unsupported("lz4"))
    }
}

#[cfg(all(test, feature = "compression"))]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::context::Control;

    fn run(packed: Vec<u8>, hint: Option<u64>) -> Vec<u8> {
        let len = packed.len() as u64;
        let c = Container::from_bytes("b.lz4", packed);
        let input = Input::range(&c, 0, len, Control::new()).unwrap();
        let mut out = Vec::new();
        Lz4.open(input, hint).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn declared_size() {
        let plain = b"abcabcabcabcabcabc".repeat(10);
        let packed = lz4_flex::block::compress(&plain);
        assert_eq!(run(packed, Some(plain.len() as u64)), plain);
    }

    #[test]
    fn size_prepended() {
        let plain = b"no size in the directory".repeat(3);
        let packed = lz4_flex::compress_prepend_size(&plain);
        assert_eq!(run(packed, None), plain);
    }

    #[test]
    fn oversized_declarations_are_refused() {
        let packed = lz4_flex::block::compress(b"tiny");
        let c = Container::from_bytes("b.lz4", packed.clone());
        let input = Input::range(&c, 0, packed.len() as u64, Control::new()).unwrap();
        assert!(matches!(
            Lz4.open(input, Some(u64::MAX)),
            Err(crate::Error::OutOfBounds { .. })
        ));

        let mut prepended = u32::MAX.to_le_bytes().to_vec();
        prepended.extend_from_slice(&packed);
        let c = Container::from_bytes("p.lz4", prepended.clone());
        let input = Input::range(&c, 0, prepended.len() as u64, Control::new()).unwrap();
        assert!(matches!(
            Lz4.open(input, None),
            Err(crate::Error::OutOfBounds { .. })
        ));
    }
}
