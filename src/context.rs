//! Per-call parse state: validation bound to one container, plus
//! cancellation and progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::trace;

use crate::config::Limits;
use crate::container::Container;
use crate::validate;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct ControlState {
    cancelled: AtomicBool,
    entries: AtomicU64,
    chunks: AtomicU64,
}

/// Cancellation flag and progress counters shared between a caller and a
/// running parse or extraction.
///
/// Parsers tick it once per directory entry and chunked readers once per
/// chunk; either stops with [`Error::Cancelled`] at the next tick after
/// [`Control::cancel`].
#[derive(Debug, Clone, Default)]
pub struct Control {
    state: Arc<ControlState>,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Relaxed)
    }

    /// Directory entries visited so far.
    pub fn entries_seen(&self) -> u64 {
        self.state.entries.load(Ordering::Relaxed)
    }

    /// Chunks or blocks opened so far.
    pub fn chunks_seen(&self) -> u64 {
        self.state.chunks.load(Ordering::Relaxed)
    }

    pub(crate) fn tick_entry(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.entries.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn tick_chunk(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state.chunks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Everything a plugin's `parse` needs, bound to one container.
///
/// The hard-mode checks here are the [`crate::validate`] functions with the
/// container size and configured limits filled in.
#[derive(Debug)]
pub struct ParseContext<'a> {
    container: &'a Container,
    limits: Limits,
    control: Control,
}

impl<'a> ParseContext<'a> {
    pub fn new(container: &'a Container, limits: Limits, control: Control) -> Self {
        Self {
            container,
            limits,
            control,
        }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    /// Checkpoint for directory entry `index` of `total`.
    pub fn entry(&self, index: usize, total: usize) -> Result<()> {
        self.control.tick_entry()?;
        if index % 1024 == 0 {
            trace!("entry {index}/{total}");
        }
        Ok(())
    }

    pub fn check_offset(&self, value: impl Into<i128>) -> Result<u64> {
        validate::check_offset(value, self.container.size())
    }

    pub fn check_length(&self, value: impl Into<i128>) -> Result<u64> {
        validate::check_length(value, Some(self.container.size()))
    }

    pub fn check_range(
        &self,
        offset: impl Into<i128>,
        length: impl Into<i128>,
    ) -> Result<(u64, u64)> {
        validate::check_range(offset, length, self.container.size())
    }

    pub fn check_num_files(&self, value: impl Into<i128>) -> Result<usize> {
        validate::check_num_files(value, self.limits.max_files)
    }

    pub fn check_filename(&self, name: &str) -> Result<()> {
        validate::check_filename(name, self.limits.max_name_len)
    }

    pub fn check_equals(&self, field: &'static str, expected: u64, found: u64) -> Result<()> {
        validate::check_equals(field, expected, found)
    }
}
