//! Format plugin contract.
//!
//! A [`FormatPlugin`] is a plain descriptor: metadata plus two function
//! pointers. `score` looks at a candidate through a private [`Probe`] and
//! returns a confidence between 0 and 100. `parse` walks the directory with a
//! [`ParseContext`] and returns the resources. Plugins hold no state, so the
//! engine can score every registered plugin against one file concurrently.
//!
//! Scores are built from fixed [`weight`]s so plugins stay comparable:
//!
//! ```text
//! EXTENSION  10   file extension is one the plugin declares
//! MAGIC      25   signature bytes match
//! CONSISTENT 25   a self-consistency equation holds (e.g. stored size == file size)
//! PLAUSIBLE  15   counts and offsets are in range
//! ```

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{trace, warn};

use crate::config::Limits;
use crate::container::{Container, ReadSeek};
use crate::context::ParseContext;
use crate::resource::Resource;
use crate::utils::bytesv;
use crate::{Error, Result};

/// Score contributions.
pub mod weight {
    pub const EXTENSION: u32 = 10;
    pub const MAGIC: u32 = 25;
    pub const CONSISTENT: u32 = 25;
    pub const PLAUSIBLE: u32 = 15;
}

/// Scoring function: inspect the candidate and return points.
pub type ScoreFn = fn(&mut Probe<'_>) -> Result<u32>;

/// Parsing function: list every resource in the container.
pub type ParseFn = fn(&ParseContext<'_>) -> Result<Vec<Resource>>;

/// One registered format.
#[derive(Clone, Copy)]
pub struct FormatPlugin {
    /// Stable identifier, e.g. `"pfs0"`.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Lowercase extensions without the dot.
    pub extensions: &'static [&'static str],
    /// Informational platform tags.
    pub platforms: &'static [&'static str],
    /// Whether [`crate::Archive::patch`] may rewrite this format's fields.
    pub writable: bool,
    pub score: ScoreFn,
    pub parse: ParseFn,
}

impl FormatPlugin {
    /// True when `ext` (any case, with or without a leading dot) is declared.
    pub fn declares(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Score `container`, isolating the plugin: errors and panics score 0
    /// and the result is clamped to 100.
    pub fn evaluate(&self, container: &Container, limits: Limits) -> u8 {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut probe = Probe::new(container, limits)?;
            (self.score)(&mut probe)
        }));
        match outcome {
            Ok(Ok(points)) => points.min(100) as u8,
            Ok(Err(e)) => {
                trace!("{}: scorer failed on {}: {e}", self.id, container.path().display());
                0
            }
            Err(_) => {
                warn!("{}: scorer panicked on {}", self.id, container.path().display());
                0
            }
        }
    }
}

impl fmt::Debug for FormatPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatPlugin")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("platforms", &self.platforms)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}

/// Running total of score points.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Score(u32);

impl Score {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn add(&mut self, points: u32) {
        self.0 = self.0.saturating_add(points);
    }

    /// Add `points` when `ok`; returns `ok`.
    pub fn check(&mut self, ok: bool, points: u32) -> bool {
        if ok {
            self.add(points);
        }
        ok
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// A scorer's private view of the candidate.
///
/// Each probe owns an independent cursor, so concurrent scorers never share
/// a file position. Reads past the end fail instead of padding.
pub struct Probe<'a> {
    container: &'a Container,
    reader: Box<dyn ReadSeek>,
    extension: Option<String>,
    limits: Limits,
}

impl<'a> Probe<'a> {
    pub fn new(container: &'a Container, limits: Limits) -> Result<Self> {
        Ok(Self {
            container,
            reader: container.reader()?,
            extension: container.extension(),
            limits,
        })
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn size(&self) -> u64 {
        self.container.size()
    }

    /// Lowercase extension of the candidate.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.extension
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
    }

    /// Points for an extension the plugin declares.
    pub fn extension_points(&self, declared: &[&str]) -> u32 {
        if declared.iter().any(|d| self.has_extension(d)) {
            weight::EXTENSION
        } else {
            0
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Read `len` bytes at `offset`, moving the cursor past them.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset.saturating_add(len as u64) > self.size() {
            return Err(Error::UnexpectedEof);
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        bytesv(&mut self.reader, len)
    }

    /// Check the bytes at `offset` against `expected`. Short files are a
    /// mismatch, not an error.
    pub fn magic_at(&mut self, offset: u64, expected: &[u8]) -> Result<bool> {
        if offset.saturating_add(expected.len() as u64) > self.size() {
            return Ok(false);
        }
        Ok(self.read_at(offset, expected.len())? == expected)
    }

    pub fn sibling(&self, ext: &str) -> Result<Option<Container>> {
        self.container.sibling(ext)
    }
}

impl Read for Probe<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for Probe<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl fmt::Debug for Probe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("container", &self.container.path())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
