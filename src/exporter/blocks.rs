//! Block aggregation: many independently coded blocks read as one stream.
//!
//! Formats that compress large entries in blocks (so a reader can seek
//! without decoding everything before it) describe an entry as parallel
//! arrays of block offsets, compressed lengths and decompressed lengths.
//! [`Blocks`] decodes each block with a wrapped sub-exporter and presents the
//! concatenation. Order is the declared order, not ascending offset order.
//!
//! Blocks are opened lazily, one at a time, and the shared
//! [`crate::Control`] is checked before each one.
//!
//! Each block is read straight from the container, so [`Blocks`] cannot sit
//! behind another stage of a [`super::Chain`]. Put the per-block pipeline in
//! the wrapped exporter instead.

use std::io::{self, Read};
use std::sync::Arc;

use tracing::trace;

use super::{Exporter, Input};
use crate::container::Container;
use crate::context::Control;
use crate::{Error, Result};

/// One coded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Absolute container offset.
    pub offset: u64,
    /// Coded length.
    pub compressed: u64,
    /// Decoded length, when the format records it.
    pub decompressed: Option<u64>,
}

/// Aggregating exporter.
#[derive(Debug, Clone)]
pub struct Blocks {
    blocks: Arc<[Block]>,
    inner: Arc<dyn Exporter>,
}

impl Blocks {
    pub fn new(blocks: Vec<Block>, inner: Arc<dyn Exporter>) -> Self {
        Self {
            blocks: blocks.into(),
            inner,
        }
    }

    /// Build from parallel arrays. All three must have the same length.
    pub fn from_parallel(
        offsets: &[u64],
        compressed: &[u64],
        decompressed: &[u64],
        inner: Arc<dyn Exporter>,
    ) -> Result<Self> {
        if offsets.len() != compressed.len() || offsets.len() != decompressed.len() {
            return Err(Error::Parse("block arrays differ in length"));
        }
        let blocks = offsets
            .iter()
            .zip(compressed)
            .zip(decompressed)
            .map(|((&offset, &compressed), &decompressed)| Block {
                offset,
                compressed,
                decompressed: Some(decompressed),
            })
            .collect();
        Ok(Self::new(blocks, inner))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Total coded bytes.
    pub fn compressed_len(&self) -> u64 {
        self.blocks.iter().map(|b| b.compressed).sum()
    }

    /// Total decoded bytes, if every block declares its length.
    pub fn decompressed_len(&self) -> Option<u64> {
        self.blocks.iter().map(|b| b.decompressed).sum()
    }
}

impl Exporter for Blocks {
    fn name(&self) -> &str {
        "blocks"
    }

    fn open(&self, input: Input, decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        if !input.is_raw() {
            return Err(Error::unsupported("blocks over a transformed stream"));
        }
        let stream = BlockStream {
            container: input.container().clone(),
            control: input.control().clone(),
            blocks: Arc::clone(&self.blocks),
            inner: Arc::clone(&self.inner),
            next: 0,
            current: None,
        };
        match decompressed_len {
            Some(n) => Ok(Box::new(stream.take(n))),
            None => Ok(Box::new(stream)),
        }
    }
}

struct Current {
    reader: Box<dyn Read + Send>,
    expected: Option<u64>,
    produced: u64,
}

struct BlockStream {
    container: Container,
    control: Control,
    blocks: Arc<[Block]>,
    inner: Arc<dyn Exporter>,
    next: usize,
    current: Option<Current>,
}

impl BlockStream {
    fn open_next(&mut self) -> Result<bool> {
        let Some(block) = self.blocks.get(self.next).copied() else {
            return Ok(false);
        };
        self.control.tick_chunk()?;
        trace!(
            "block {} at {:#x} ({} bytes)",
            self.next, block.offset, block.compressed
        );
        let input = Input::range(
            &self.container,
            block.offset,
            block.compressed,
            self.control.clone(),
        )?;
        let reader = self.inner.open(input, block.decompressed)?;
        self.current = Some(Current {
            reader,
            expected: block.decompressed,
            produced: 0,
        });
        self.next += 1;
        Ok(true)
    }
}

impl Read for BlockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current.is_none() && !self.open_next().map_err(Error::into_io)? {
                return Ok(0);
            }
            let Some(cur) = self.current.as_mut() else {
                return Ok(0);
            };
            let n = cur.reader.read(buf)?;
            if n > 0 {
                cur.produced += n as u64;
                return Ok(n);
            }
            if let Some(expected) = cur.expected
                && cur.produced < expected
            {
                return Err(Error::Truncated {
                    name: format!("block {}", self.next - 1),
                    expected,
                    actual: cur.produced,
                }
                .into_io());
            }
            self.current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;
    use crate::exporter::{Identity, Inflate};

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn open(blocks: &Blocks, c: &Container, hint: Option<u64>) -> io::Result<Vec<u8>> {
        let input = Input::range(c, 0, 0, Control::new()).unwrap();
        let mut out = Vec::new();
        blocks.open(input, hint).unwrap().read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn logical_order_not_offset_order() {
        // Stored back to front.
        let parts: [&[u8]; 3] = [b"first-", b"second-", b"third"];
        let packed: Vec<Vec<u8>> = parts.iter().map(|p| zlib(p)).collect();
        let mut file = Vec::new();
        let mut offsets = [0u64; 3];
        for i in (0..3).rev() {
            offsets[i] = file.len() as u64;
            file.extend_from_slice(&packed[i]);
        }
        let c = Container::from_bytes("b.bin", file);
        let blocks = Blocks::from_parallel(
            &offsets,
            &packed.iter().map(|p| p.len() as u64).collect::<Vec<_>>(),
            &parts.iter().map(|p| p.len() as u64).collect::<Vec<_>>(),
            Arc::new(Inflate::zlib()),
        )
        .unwrap();
        assert_eq!(blocks.decompressed_len(), Some(18));
        assert_eq!(open(&blocks, &c, Some(18)).unwrap(), b"first-second-third");
    }

    #[test]
    fn short_block_is_truncation() {
        let c = Container::from_bytes("b.bin", b"abcdef".to_vec());
        let blocks = Blocks::new(
            vec![
                Block {
                    offset: 0,
                    compressed: 3,
                    decompressed: Some(4),
                },
                Block {
                    offset: 3,
                    compressed: 3,
                    decompressed: Some(3),
                },
            ],
            Arc::new(Identity),
        );
        let err = open(&blocks, &c, None).unwrap_err();
        assert!(matches!(Error::from(err), Error::Truncated { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn refuses_a_transformed_input() {
        let c = Container::from_bytes("b.bin", b"abcd".to_vec());
        let blocks = Blocks::new(
            vec![Block {
                offset: 0,
                compressed: 4,
                decompressed: Some(4),
            }],
            Arc::new(Identity),
        );
        let staged = Input::range(&c, 0, 4, Control::new())
            .unwrap()
            .with_reader(Box::new(io::empty()), Some(4));
        assert!(matches!(
            blocks.open(staged, None),
            Err(Error::UnsupportedTransform { .. })
        ));
    }

    #[test]
    fn per_block_pipeline_goes_inside() {
        let key = [0x21u8, 0x42];
        let mut first = zlib(b"left-");
        let mut second = zlib(b"right");
        crate::exporter::xor_in_place(&mut first, &key, 0);
        let split = first.len() as u64;
        crate::exporter::xor_in_place(&mut second, &key, (split % 2) as usize);
        let mut file = first.clone();
        file.extend_from_slice(&second);
        let c = Container::from_bytes("b.bin", file);

        let inner = crate::exporter::Chain::new(
            Arc::new(crate::exporter::XorKey::new(key.to_vec()).unwrap()),
            Arc::new(Inflate::zlib()),
        );
        let blocks = Blocks::from_parallel(
            &[0, split],
            &[split, second.len() as u64],
            &[5, 5],
            Arc::new(inner),
        )
        .unwrap();
        assert_eq!(open(&blocks, &c, Some(10)).unwrap(), b"left-right");
    }

    #[test]
    fn mismatched_arrays_rejected() {
        assert!(Blocks::from_parallel(&[0, 1], &[1], &[1], Arc::new(Identity)).is_err());
    }

    #[test]
    fn cancellation_between_blocks() {
        let c = Container::from_bytes("b.bin", b"aabb".to_vec());
        let blocks = Blocks::new(
            vec![
                Block {
                    offset: 0,
                    compressed: 2,
                    decompressed: Some(2),
                },
                Block {
                    offset: 2,
                    compressed: 2,
                    decompressed: Some(2),
                },
            ],
            Arc::new(Identity),
        );
        let control = Control::new();
        let input = Input::range(&c, 0, 4, control.clone()).unwrap();
        let mut r = blocks.open(input, None).unwrap();
        let mut two = [0u8; 2];
        r.read_exact(&mut two).unwrap();
        control.cancel();
        let err = r.read(&mut two).unwrap_err();
        assert!(matches!(Error::from(err), Error::Cancelled));
    }
}
