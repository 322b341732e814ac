//! Resources: the uniform description of one file inside a container.
//!
//! A [`Resource`] is an immutable value. It records where its raw bytes live
//! (one range, or an ordered list of ranges for split entries), how long they
//! are before and after decoding, which [`Exporter`] decodes them, and
//! optionally where its own directory fields sit so they can be patched.
//! Nothing is read until [`Resource::extract`] is called, and extraction can
//! be repeated or run concurrently for different resources.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use crate::container::Container;
use crate::context::Control;
use crate::exporter::{Exporter, Input};
use crate::patch::PatchLocations;
use crate::{Error, Result};

/// A byte range within a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Where a resource's raw bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// One contiguous range.
    Range(ByteRange),
    /// Ranges concatenated in this order form the raw stream.
    Chunks(Vec<ByteRange>),
}

/// One logical file inside a container.
#[derive(Clone)]
pub struct Resource {
    name: String,
    container: Container,
    source: Source,
    compressed_length: u64,
    decompressed_length: Option<u64>,
    exporter: Option<Arc<dyn Exporter>>,
    patch: Option<PatchLocations>,
}

/// Name used for entries whose format stores none.
pub fn synthesized_name(index: usize) -> String {
    format!("file{index:04}")
}

impl Resource {
    /// A contiguous, stored (undecoded) entry.
    pub fn new(container: &Container, name: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            name: name.into(),
            container: container.clone(),
            source: Source::Range(ByteRange::new(offset, length)),
            compressed_length: length,
            decompressed_length: Some(length),
            exporter: None,
            patch: None,
        }
    }

    /// A contiguous entry decoded by `exporter`.
    ///
    /// `decompressed` is `None` when the format does not record it.
    pub fn encoded(
        container: &Container,
        name: impl Into<String>,
        offset: u64,
        compressed: u64,
        decompressed: Option<u64>,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        Self {
            decompressed_length: decompressed,
            exporter: Some(exporter),
            ..Self::new(container, name, offset, compressed)
        }
    }

    /// A split entry whose raw stream is `chunks` concatenated in order.
    pub fn chunked(container: &Container, name: impl Into<String>, chunks: Vec<ByteRange>) -> Self {
        let length = chunks.iter().map(|c| c.length).sum();
        Self {
            name: name.into(),
            container: container.clone(),
            source: Source::Chunks(chunks),
            compressed_length: length,
            decompressed_length: Some(length),
            exporter: None,
            patch: None,
        }
    }

    /// Attach a decoder and the declared decoded length.
    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>, decompressed: Option<u64>) -> Self {
        self.exporter = Some(exporter);
        self.decompressed_length = decompressed;
        self
    }

    /// Record where this entry's directory fields live.
    pub fn with_patch_locations(mut self, patch: PatchLocations) -> Self {
        self.patch = Some(patch);
        self
    }

    /// A copy with a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// The same entry after its directory fields were rewritten.
    pub(crate) fn repointed(
        &self,
        container: &Container,
        offset: u64,
        length: u64,
        decompressed: Option<u64>,
    ) -> Self {
        Self {
            container: container.clone(),
            source: Source::Range(ByteRange::new(offset, length)),
            compressed_length: length,
            decompressed_length: decompressed,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Raw ranges in logical order.
    pub fn ranges(&self) -> &[ByteRange] {
        match &self.source {
            Source::Range(r) => std::slice::from_ref(r),
            Source::Chunks(c) => c,
        }
    }

    /// Offset of the first raw byte.
    pub fn offset(&self) -> u64 {
        self.ranges().first().map_or(0, |r| r.offset)
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.source, Source::Chunks(_))
    }

    pub fn compressed_length(&self) -> u64 {
        self.compressed_length
    }

    pub fn decompressed_length(&self) -> Option<u64> {
        self.decompressed_length
    }

    pub fn exporter(&self) -> Option<&Arc<dyn Exporter>> {
        self.exporter.as_ref()
    }

    /// Name of the decode transform, `"identity"` when none is assigned.
    pub fn exporter_name(&self) -> &str {
        self.exporter.as_deref().map_or("identity", |e| e.name())
    }

    pub fn patch_locations(&self) -> Option<&PatchLocations> {
        self.patch.as_ref()
    }

    /// Open the decoded stream.
    pub fn extract(&self) -> Result<Extraction> {
        self.extract_with(&Control::new())
    }

    /// Open the decoded stream, checking `control` between chunks.
    pub fn extract_with(&self, control: &Control) -> Result<Extraction> {
        // Length-preserving exporters (ciphers) are keyed by absolute offset,
        // so a split entry runs them once per chunk.
        let per_chunk = self.exporter.clone().filter(|e| e.preserves_length());
        let raw: Box<dyn Read + Send> = match &self.source {
            Source::Range(r) => self.container.range_reader(r.offset, r.length)?,
            Source::Chunks(chunks) => {
                // Fail early on a bad range instead of mid-stream.
                for c in chunks {
                    crate::validate::check_range(c.offset, c.length, self.container.size())?;
                }
                Box::new(ChunkReader {
                    container: self.container.clone(),
                    chunks: chunks.clone(),
                    control: control.clone(),
                    exporter: per_chunk.clone(),
                    next: 0,
                    current: None,
                })
            }
        };
        let input = Input::new(
            raw,
            self.container.clone(),
            self.offset(),
            self.compressed_length,
            control.clone(),
        );
        let inner = match (&self.exporter, &self.source) {
            (Some(_), Source::Chunks(_)) if per_chunk.is_some() => input.into_reader(),
            (Some(exporter), _) => exporter.open(input, self.decompressed_length)?,
            (None, _) => input.into_reader(),
        };
        Ok(Extraction {
            name: self.name.clone(),
            inner,
            expected: self.decompressed_length,
            produced: 0,
            finished: false,
        })
    }

    /// Extract the whole entry into memory.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.extract()?.read_to_vec()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("compressed_length", &self.compressed_length)
            .field("decompressed_length", &self.decompressed_length)
            .field("exporter", &self.exporter)
            .field("patch", &self.patch)
            .finish()
    }
}

impl PartialEq for Resource {
    /// Field-wise equality; exporters compare by their debug form since
    /// they are trait objects.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.container.path() == other.container.path()
            && self.source == other.source
            && self.compressed_length == other.compressed_length
            && self.decompressed_length == other.decompressed_length
            && self.patch == other.patch
            && format!("{:?}", self.exporter) == format!("{:?}", other.exporter)
    }
}

/// Reader over a split entry's chunks, opened lazily in order.
///
/// With `exporter` set, each chunk is decoded on its own from its absolute
/// offset.
struct ChunkReader {
    container: Container,
    chunks: Vec<ByteRange>,
    control: Control,
    exporter: Option<Arc<dyn Exporter>>,
    next: usize,
    current: Option<Box<dyn Read + Send>>,
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current.is_none() {
                let Some(chunk) = self.chunks.get(self.next).copied() else {
                    return Ok(0);
                };
                self.control.tick_chunk().map_err(Error::into_io)?;
                let reader = match &self.exporter {
                    Some(exporter) => Input::range(
                        &self.container,
                        chunk.offset,
                        chunk.length,
                        self.control.clone(),
                    )
                    .and_then(|input| exporter.open(input, Some(chunk.length))),
                    None => self.container.range_reader(chunk.offset, chunk.length),
                }
                .map_err(Error::into_io)?;
                self.current = Some(reader);
                self.next += 1;
            }
            if let Some(reader) = self.current.as_mut() {
                let n = reader.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
            }
            self.current = None;
        }
    }
}

/// A decoded byte stream for one resource.
///
/// Never yields more than the declared decompressed length.
/// [`Extraction::read_to_vec`] additionally reports a short stream as
/// [`Error::Truncated`]; plain [`Read`] callers should compare against
/// [`Extraction::expected_len`] themselves.
pub struct Extraction {
    name: String,
    inner: Box<dyn Read + Send>,
    expected: Option<u64>,
    produced: u64,
    finished: bool,
}

impl Extraction {
    /// True while more bytes may be produced.
    pub fn available(&self) -> bool {
        !self.finished && self.expected.is_none_or(|e| self.produced < e)
    }

    pub fn expected_len(&self) -> Option<u64> {
        self.expected
    }

    /// Bytes produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Drain the stream, checking the declared length.
    pub fn read_to_vec(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.expected.unwrap_or(0).min(1 << 26) as usize);
        self.read_to_end(&mut out)?;
        if let Some(expected) = self.expected
            && self.produced < expected
        {
            return Err(Error::Truncated {
                name: self.name,
                expected,
                actual: self.produced,
            });
        }
        Ok(out)
    }
}

impl Read for Extraction {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.available() || buf.is_empty() {
            return Ok(0);
        }
        let cap = match self.expected {
            Some(e) => buf.len().min((e - self.produced).min(usize::MAX as u64) as usize),
            None => buf.len(),
        };
        let n = self.inner.read(&mut buf[..cap])?;
        if n == 0 {
            self.finished = true;
        }
        self.produced += n as u64;
        Ok(n)
    }
}

impl fmt::Debug for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extraction")
            .field("name", &self.name)
            .field("expected", &self.expected)
            .field("produced", &self.produced)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::XorByte;

    fn container() -> Container {
        Container::from_bytes("r.bin", (0u8..100).collect::<Vec<_>>())
    }

    #[test]
    fn plain_range() {
        let c = container();
        let r = Resource::new(&c, "a", 10, 5);
        assert_eq!(r.exporter_name(), "identity");
        assert_eq!(r.decompressed_length(), Some(5));
        assert_eq!(r.read_all().unwrap(), vec![10, 11, 12, 13, 14]);
        // Repeatable.
        assert_eq!(r.read_all().unwrap(), vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn chunks_in_declared_order() {
        let c = container();
        let r = Resource::chunked(
            &c,
            "split",
            vec![ByteRange::new(50, 10), ByteRange::new(5, 20), ByteRange::new(90, 5)],
        );
        assert!(r.is_chunked());
        assert_eq!(r.offset(), 50);
        let out = r.read_all().unwrap();
        assert_eq!(out.len(), 35);
        let expected: Vec<u8> = (50u8..60).chain(5..25).chain(90..95).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn bad_chunk_fails_on_extract() {
        let c = container();
        let r = Resource::chunked(&c, "bad", vec![ByteRange::new(0, 4), ByteRange::new(98, 4)]);
        assert!(matches!(r.extract(), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn cipher_on_chunks_keys_each_chunk_from_its_offset() {
        let key: Vec<u8> = (1u8..=8).collect();
        let mut data: Vec<u8> = (0u8..100).collect();
        crate::exporter::xor_in_place(&mut data, &key, 0);
        let c = Container::from_bytes("k.bin", data);
        let xor = crate::exporter::XorKey::new(key).unwrap();
        let r = Resource::chunked(&c, "split", vec![ByteRange::new(10, 5), ByteRange::new(40, 5)])
            .with_exporter(Arc::new(xor), Some(10));
        assert_eq!(r.read_all().unwrap(), vec![10, 11, 12, 13, 14, 40, 41, 42, 43, 44]);
    }

    #[test]
    fn declared_length_caps_and_truncation_reports() {
        let c = container();
        let long = Resource::encoded(&c, "x", 0, 10, Some(4), Arc::new(XorByte::new(0)));
        assert_eq!(long.read_all().unwrap(), vec![0, 1, 2, 3]);

        let short = Resource::encoded(&c, "y", 0, 10, Some(12), Arc::new(XorByte::new(0)));
        assert!(matches!(
            short.read_all(),
            Err(Error::Truncated {
                expected: 12,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn available_tracks_progress() {
        let c = container();
        let mut x = Resource::new(&c, "a", 0, 3).extract().unwrap();
        assert!(x.available());
        let mut buf = [0u8; 8];
        assert_eq!(x.read(&mut buf).unwrap(), 3);
        assert!(!x.available());
        assert_eq!(x.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn rename_is_a_new_value() {
        let c = container();
        let a = Resource::new(&c, "a", 0, 3);
        let b = a.renamed("b");
        assert_eq!(a.name(), "a");
        assert_eq!(b.name(), "b");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn synthesized_names() {
        assert_eq!(synthesized_name(0), "file0000");
        assert_eq!(synthesized_name(12345), "file12345");
    }
}
