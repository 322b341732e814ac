//! Containers: the files resources are read from.
//!
//! A [`Container`] is cheap to clone and never holds an open handle. Every
//! call to [`Container::reader`] opens a fresh cursor, so scorers running in
//! parallel and resources extracted concurrently never share a read position.

use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::error::Bound;
use crate::{Error, Result};

/// Anything that can be read and seeked and handed to another thread.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

#[derive(Debug)]
enum Backing {
    File,
    Memory(Arc<[u8]>),
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    size: u64,
    backing: Backing,
}

/// A file (or in-memory buffer) with a known size.
#[derive(Debug, Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Open a file-backed container.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.is_file() {
            return Err(Error::FileOpen {
                path: path.to_path_buf(),
                source: std::io::Error::other("not a regular file"),
            });
        }
        Ok(Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                size: meta.len(),
                backing: Backing::File,
            }),
        })
    }

    /// Wrap an in-memory buffer. `name` supplies the extension and stem.
    pub fn from_bytes(name: impl Into<PathBuf>, data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        Self {
            inner: Arc::new(Inner {
                path: name.into(),
                size: data.len() as u64,
                backing: Backing::Memory(data),
            }),
        }
    }

    /// Path (or synthetic name for in-memory containers).
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    /// True for containers backed by a file on disk.
    pub fn is_file(&self) -> bool {
        matches!(self.inner.backing, Backing::File)
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.inner
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// File name without its extension.
    pub fn stem(&self) -> String {
        self.inner
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Open a new, independent cursor positioned at the start.
    pub fn reader(&self) -> Result<Box<dyn ReadSeek>> {
        match &self.inner.backing {
            Backing::File => {
                let file = File::open(&self.inner.path).map_err(|source| Error::FileOpen {
                    path: self.inner.path.clone(),
                    source,
                })?;
                Ok(Box::new(file))
            }
            Backing::Memory(data) => Ok(Box::new(Cursor::new(Arc::clone(data)))),
        }
    }

    /// Open a cursor limited to `length` bytes starting at `offset`.
    ///
    /// The range is re-checked against the current size, so a resource whose
    /// bounds no longer hold fails here rather than yielding garbage.
    pub fn range_reader(&self, offset: u64, length: u64) -> Result<Box<dyn Read + Send>> {
        let end = offset as i128 + length as i128;
        if end > self.size() as i128 {
            return Err(Error::out_of_bounds(Bound::Range, end, self.size()));
        }
        let mut r = self.reader()?;
        r.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(r.take(length)))
    }

    /// Read `len` bytes at `offset`.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut r = self.range_reader(offset, len as u64)?;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Path a sibling with extension `ext` would have.
    pub fn sibling_path(&self, ext: &str) -> PathBuf {
        self.inner.path.with_extension(ext)
    }

    /// Find the file sharing this container's base name with extension `ext`.
    ///
    /// Extension matching is case-insensitive. In-memory containers have no
    /// siblings.
    pub fn sibling(&self, ext: &str) -> Result<Option<Container>> {
        if !self.is_file() {
            return Ok(None);
        }
        let direct = self.sibling_path(ext);
        if direct.is_file() {
            return Container::open(direct).map(Some);
        }

        let stem = self.inner.path.file_stem();
        let dir = match self.inner.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Ok(entries) = fs::read_dir(&dir) else {
            return Ok(None);
        };
        for entry in entries.flatten() {
            let candidate = entry.path();
            let same_stem = candidate.file_stem() == stem;
            let same_ext = candidate
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext));
            if same_stem && same_ext && candidate != self.inner.path && candidate.is_file() {
                trace!("resolved sibling {}", candidate.display());
                return Container::open(candidate).map(Some);
            }
        }
        Ok(None)
    }
}
