//! Exporters: composable decode transforms applied to a resource's bytes.
//!
//! An [`Exporter`] is a stateless strategy. [`Exporter::open`] receives an
//! [`Input`] (a reader over the raw bytes plus where they came from) and
//! returns a fresh [`Read`] that yields the decoded stream. Because the input
//! is just a reader, exporters nest: [`Chain`] feeds the output of one into
//! the next, e.g. decrypt-then-decompress.
//!
//! [`Blocks`] is the exception. It addresses its blocks by absolute offset
//! and refuses an input that an earlier stage already transformed, so a
//! per-block pipeline goes inside it: `Blocks::new(blocks, Arc::new(Chain::new(..)))`.
//!
//! ## Submodules
//!
//! | Module | Exporters | Backing crate |
//! |--------|-----------|---------------|
//! | [`blocks`]  | [`Blocks`] - independently coded blocks as one stream | - |
//! | [`inflate`] | [`Inflate`] - zlib / raw deflate / gzip | `flate2` |
//! | [`xor`]     | [`XorByte`], [`XorKey`] - offset-addressed XOR | - |
//! | [`zstd`]    | [`Zstd`] (feature `compression`) | `zstd` |
//! | [`lz4`]     | [`Lz4`] (feature `compression`) | `lz4_flex` |
//!
//! Exporters whose codec is compiled out, and names [`lookup`] does not
//! know, still construct. They fail with
//! [`Error::UnsupportedTransform`] when a resource using them is extracted,
//! which keeps the failure scoped to that resource.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use crate::container::Container;
use crate::context::Control;
use crate::{Error, Result};

pub mod blocks;
pub mod inflate;
pub mod lz4;
pub mod xor;
pub mod zstd;

pub use blocks::{Block, Blocks};
pub use inflate::Inflate;
pub use lz4::Lz4;
pub use xor::{XorByte, XorKey, xor_in_place};
pub use zstd::Zstd;

/// Raw bytes handed to an exporter.
pub struct Input {
    reader: Box<dyn Read + Send>,
    container: Container,
    offset: u64,
    length: Option<u64>,
    control: Control,
    raw: bool,
}

impl Input {
    pub fn new(
        reader: Box<dyn Read + Send>,
        container: Container,
        offset: u64,
        length: u64,
        control: Control,
    ) -> Self {
        Self {
            reader,
            container,
            offset,
            length: Some(length),
            control,
            raw: true,
        }
    }

    /// Convenience for a reader over `length` bytes at `offset` in `container`.
    pub fn range(
        container: &Container,
        offset: u64,
        length: u64,
        control: Control,
    ) -> Result<Self> {
        let reader = container.range_reader(offset, length)?;
        Ok(Self::new(reader, container.clone(), offset, length, control))
    }

    /// Absolute container offset of the first input byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of input bytes, `None` when an earlier stage could not tell.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// False once the reader carries another stage's output.
    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }

    /// Replace the reader with a transformed stream, keeping the provenance.
    pub fn with_reader(self, reader: Box<dyn Read + Send>, length: Option<u64>) -> Self {
        Self {
            reader,
            length,
            raw: false,
            ..self
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("container", &self.container.path())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

/// A decode transform.
pub trait Exporter: fmt::Debug + Send + Sync {
    /// Short identifier, also accepted by [`lookup`] where applicable.
    fn name(&self) -> &str;

    /// Open a decoded stream over `input`.
    ///
    /// `decompressed_len` is the length the directory declares, if any.
    /// Implementations must not yield more than a declared length.
    fn open(&self, input: Input, decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>>;

    /// True when output length always equals input length (ciphers).
    fn preserves_length(&self) -> bool {
        false
    }
}

/// Passthrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Exporter for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn open(&self, input: Input, _decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        match input.length() {
            Some(length) => Ok(Box::new(input.into_reader().take(length))),
            None => Ok(input.into_reader()),
        }
    }

    fn preserves_length(&self) -> bool {
        true
    }
}

/// Placeholder for a transform with no implementation.
#[derive(Debug, Clone)]
pub struct Unsupported {
    kind: String,
}

impl Unsupported {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl Exporter for Unsupported {
    fn name(&self) -> &str {
        &self.kind
    }

    fn open(&self, _input: Input, _decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        Err(Error::unsupported(self.kind.as_str()))
    }
}

/// Run `first` over the raw bytes, then `then` over its output.
#[derive(Debug, Clone)]
pub struct Chain {
    first: Arc<dyn Exporter>,
    then: Arc<dyn Exporter>,
}

impl Chain {
    pub fn new(first: Arc<dyn Exporter>, then: Arc<dyn Exporter>) -> Self {
        Self { first, then }
    }
}

impl Exporter for Chain {
    fn name(&self) -> &str {
        "chain"
    }

    fn open(&self, input: Input, decompressed_len: Option<u64>) -> Result<Box<dyn Read + Send>> {
        // The intermediate length is known when either stage keeps lengths.
        let stage_len = if self.first.preserves_length() {
            input.length()
        } else if self.then.preserves_length() {
            decompressed_len
        } else {
            None
        };
        let carrier = Input::new(
            Box::new(std::io::empty()),
            input.container().clone(),
            input.offset(),
            0,
            input.control().clone(),
        );
        let staged = self.first.open(input, stage_len)?;
        self.then
            .open(carrier.with_reader(staged, stage_len), decompressed_len)
    }

    fn preserves_length(&self) -> bool {
        self.first.preserves_length() && self.then.preserves_length()
    }
}

/// Map a transform name to an exporter.
///
/// Unknown names yield an [`Unsupported`] exporter rather than an error, so
/// a plugin can describe every entry even when one of them cannot be
/// decoded by this build.
pub fn lookup(name: &str) -> Arc<dyn Exporter> {
    match name.to_ascii_lowercase().as_str() {
        "" | "none" | "identity" | "stored" => Arc::new(Identity),
        "zlib" => Arc::new(Inflate::zlib()),
        "zlib-unsized" => Arc::new(Inflate::zlib().size_from_stream()),
        "deflate" => Arc::new(Inflate::raw()),
        "gzip" => Arc::new(Inflate::gzip()),
        "zstd" => Arc::new(Zstd),
        "lz4" => Arc::new(Lz4),
        other => Arc::new(Unsupported::new(other)),
    }
}
