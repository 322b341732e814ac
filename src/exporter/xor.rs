//! Offset-addressed XOR ciphers.
//!
//! Game archives that obfuscate with a repeating key almost always key the
//! stream from the start of the file (or from the end of a plain header),
//! not from the start of each entry. Resources are extracted independently
//! and in any order, so the keystream position for a resource is computed
//! in closed form from its absolute offset:
//!
//! ```text
//! key_index = (absolute_offset - header_bytes) mod key_len
//! ```
//!
//! using Euclidean remainder, so a resource that starts inside the plain
//! header (negative difference) still lands on a valid key index.

use std::io::{self, Read};
use std::sync::Arc;

use super::{Exporter, Input};
use crate::{Error, Result};

/// XOR every byte with `key`, starting at keystream position `start`.
pub fn xor_in_place(data: &mut [u8], key: &[u8], start: usize) {
    if key.is_empty() {
        return;
    }
    let mut k = start % key.len();
    for b in data {
        *b ^= key[k];
        k += 1;
        if k == key.len() {
            k = 0;
        }
    }
}

/// Single-byte XOR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorByte {
    key: u8,
}

impl XorByte {
    pub fn new(key: u8) -> Self {
        Self { key }
    }
}

impl Exporter for XorByte {
    fn name(&self) -> &str {
        "xor"
    }

    fn open(&self, input: Input, _decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(XorReader {
            inner: input.into_reader(),
            key: Arc::from(vec![self.key]),
            pos: 0,
        }))
    }

    fn preserves_length(&self) -> bool {
        true
    }
}

/// Repeating-key XOR keyed from an absolute container offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorKey {
    key: Arc<[u8]>,
    header: u64,
}

impl XorKey {
    /// Returns [`Error::Parse`] for an empty key.
    pub fn new(key: impl Into<Arc<[u8]>>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::Parse("empty XOR key"));
        }
        Ok(Self { key, header: 0 })
    }

    /// Number of leading container bytes that are not part of the keystream.
    pub fn after_header(mut self, header: u64) -> Self {
        self.header = header;
        self
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Keystream index for the byte at `offset`.
    pub fn index_at(&self, offset: u64) -> usize {
        let rel = offset as i128 - self.header as i128;
        rel.rem_euclid(self.key.len() as i128) as usize
    }
}

impl Exporter for XorKey {
    fn name(&self) -> &str {
        "xor-key"
    }

    fn open(&self, input: Input, _decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        let pos = self.index_at(input.offset());
        Ok(Box::new(XorReader {
            inner: input.into_reader(),
            key: Arc::clone(&self.key),
            pos,
        }))
    }

    fn preserves_length(&self) -> bool {
        true
    }
}

/// Decorator that XORs whatever the inner reader yields.
struct XorReader {
    inner: Box<dyn Read + Send>,
    key: Arc<[u8]>,
    pos: usize,
}

impl Read for XorReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        xor_in_place(&mut buf[..n], &self.key, self.pos);
        self.pos = (self.pos + n) % self.key.len();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::context::Control;

    fn decode(exporter: &dyn Exporter, c: &Container, offset: u64, len: u64) -> Vec<u8> {
        let input = Input::range(c, offset, len, Control::new()).unwrap();
        let mut out = Vec::new();
        exporter
            .open(input, Some(len))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn single_byte() {
        let c = Container::from_bytes("a.bin", vec![0x41 ^ 0x7F, 0x42 ^ 0x7F]);
        assert_eq!(decode(&XorByte::new(0x7F), &c, 0, 2), b"AB");
    }

    #[test]
    fn random_access_matches_full_stream() {
        let key = b"K3y!\x90\x01\xfe\x7f".to_vec();
        let data: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();
        let c = Container::from_bytes("a.bin", data.clone());
        let xor = XorKey::new(key.clone()).unwrap();

        let mut full = data.clone();
        xor_in_place(&mut full, &key, 0);

        for (offset, len) in [(37u64, 50u64), (0, 8), (199, 1), (64, 100)] {
            assert_eq!(xor.index_at(offset), offset as usize % key.len());
            let part = decode(&xor, &c, offset, len);
            assert_eq!(part, &full[offset as usize..(offset + len) as usize]);
        }
    }

    #[test]
    fn header_skip_wraps_around() {
        let xor = XorKey::new(vec![1u8, 2, 3, 4, 5]).unwrap().after_header(12);
        assert_eq!(xor.index_at(12), 0);
        assert_eq!(xor.index_at(14), 2);
        // Two bytes before the keyed region: -2 mod 5 = 3.
        assert_eq!(xor.index_at(10), 3);
    }

    #[test]
    fn small_reads_keep_position() {
        let key = [9u8, 8, 7];
        let mut data = b"abcdefgh".to_vec();
        xor_in_place(&mut data, &key, 0);
        let c = Container::from_bytes("a.bin", data);
        let input = Input::range(&c, 0, 8, Control::new()).unwrap();
        let mut r = XorKey::new(key.to_vec()).unwrap().open(input, None).unwrap();
        let mut out = Vec::new();
        let mut one = [0u8; 1];
        while r.read(&mut one).unwrap() == 1 {
            out.push(one[0]);
        }
        assert_eq!(out, b"abcdefgh");
    }

    #[test]
    fn empty_key_rejected() {
        assert!(XorKey::new(Vec::<u8>::new()).is_err());
    }
}
