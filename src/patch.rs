//! In-place rewriting of directory fields.
//!
//! Plugins for writable formats record, per resource, where that entry's
//! offset and length fields sit in the container and how they are encoded
//! ([`PatchLocations`]). Repointing an entry at new data (typically appended
//! to the end of the file) then only rewrites those few bytes; the rest of
//! the directory is left alone.
//!
//! A stored field value is `(value - base) / unit`, so a sector-addressed
//! field uses `unit = 2048` and a field relative to a data section start uses
//! `base = data_offset`.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::container::Container;
use crate::resource::Resource;
use crate::utils;
use crate::{Error, Result};

/// Width and byte order of a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    U16Le,
    U16Be,
    U32Le,
    U32Be,
    U64Le,
    U64Be,
    I32Le,
}

impl Encoding {
    /// Field width in bytes.
    pub fn width(self) -> usize {
        match self {
            Encoding::U16Le | Encoding::U16Be => 2,
            Encoding::U32Le | Encoding::U32Be | Encoding::I32Le => 4,
            Encoding::U64Le | Encoding::U64Be => 8,
        }
    }

    fn encode(self, stored: u64) -> Result<Vec<u8>> {
        let too_big = || Error::Patch("value does not fit field");
        Ok(match self {
            Encoding::U16Le => u16::try_from(stored).map_err(|_| too_big())?.to_le_bytes().to_vec(),
            Encoding::U16Be => u16::try_from(stored).map_err(|_| too_big())?.to_be_bytes().to_vec(),
            Encoding::U32Le => u32::try_from(stored).map_err(|_| too_big())?.to_le_bytes().to_vec(),
            Encoding::U32Be => u32::try_from(stored).map_err(|_| too_big())?.to_be_bytes().to_vec(),
            Encoding::U64Le => stored.to_le_bytes().to_vec(),
            Encoding::U64Be => stored.to_be_bytes().to_vec(),
            Encoding::I32Le => i32::try_from(stored).map_err(|_| too_big())?.to_le_bytes().to_vec(),
        })
    }

    fn decode(self, mut b: &[u8]) -> Result<u64> {
        let r = &mut b;
        Ok(match self {
            Encoding::U16Le => utils::le_u16(r)? as u64,
            Encoding::U16Be => utils::be_u16(r)? as u64,
            Encoding::U32Le => utils::le_u32(r)? as u64,
            Encoding::U32Be => utils::be_u32(r)? as u64,
            Encoding::U64Le => utils::le_u64(r)?,
            Encoding::U64Be => u64::from_be_bytes(utils::bytesa::<8>(r)?),
            Encoding::I32Le => u64::try_from(utils::le_i32(r)?)
                .map_err(|_| Error::Patch("negative field value"))?,
        })
    }
}

/// Location and encoding of one stored directory field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    /// Absolute container offset of the field.
    pub position: u64,
    pub encoding: Encoding,
    /// Multiplier applied to the stored value (1 for byte-addressed fields).
    pub unit: u64,
    /// Added after scaling (e.g. the start of a data section).
    pub base: u64,
}

impl Field {
    /// A byte-addressed field with no base.
    pub fn new(position: u64, encoding: Encoding) -> Self {
        Self {
            position,
            encoding,
            unit: 1,
            base: 0,
        }
    }

    pub fn unit(mut self, unit: u64) -> Self {
        self.unit = unit.max(1);
        self
    }

    pub fn base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    /// Bytes that store `value` in this field.
    pub fn encode(&self, value: u64) -> Result<Vec<u8>> {
        let rel = value
            .checked_sub(self.base)
            .ok_or(Error::Patch("value below field base"))?;
        if rel % self.unit != 0 {
            return Err(Error::Patch("value not aligned to field unit"));
        }
        self.encoding.encode(rel / self.unit)
    }

    /// Current value of the field in `container`.
    pub fn read(&self, container: &Container) -> Result<u64> {
        let raw = container.read_at(self.position, self.encoding.width())?;
        let stored = self.encoding.decode(&raw)?;
        stored
            .checked_mul(self.unit)
            .and_then(|v| v.checked_add(self.base))
            .ok_or(Error::Patch("field value overflows"))
    }
}

/// Where one resource's directory fields are stored.
///
/// Any subset may be present. `end` is for formats that store an exclusive
/// end offset instead of a length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PatchLocations {
    pub offset: Option<Field>,
    pub length: Option<Field>,
    pub end: Option<Field>,
    pub decompressed: Option<Field>,
}

/// New values for a resource's directory fields. Unset values keep the
/// resource's current ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Patch {
    offset: Option<u64>,
    length: Option<u64>,
    decompressed: Option<u64>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn decompressed(mut self, length: u64) -> Self {
        self.decompressed = Some(length);
        self
    }
}

/// One pending write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub position: u64,
    pub bytes: Vec<u8>,
}

/// Resolved patch: the byte writes to perform and the values they encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub writes: Vec<FieldWrite>,
    pub offset: u64,
    pub length: u64,
    pub decompressed: Option<u64>,
}

/// Compute the writes for `patch` against `resource`.
///
/// `container_size` is the current size of the backing file; the patched
/// range must lie inside it.
pub fn plan(resource: &Resource, patch: &Patch, container_size: u64) -> Result<Plan> {
    if resource.is_chunked() {
        return Err(Error::Patch("split entries cannot be repointed"));
    }
    let loc = resource
        .patch_locations()
        .ok_or(Error::Patch("entry has no recorded field locations"))?;

    let offset = patch.offset.unwrap_or_else(|| resource.offset());
    let length = patch.length.unwrap_or_else(|| resource.compressed_length());
    let decompressed = match (patch.decompressed, resource.exporter()) {
        (Some(d), _) => Some(d),
        (None, None) => Some(length),
        (None, Some(_)) => resource.decompressed_length(),
    };
    if resource.exporter().is_none() && decompressed != Some(length) {
        return Err(Error::Patch("stored entries decode to their raw length"));
    }
    crate::validate::check_range(offset, length, container_size)?;

    let mut writes = Vec::new();
    let mut put = |field: Option<Field>,
                   value: u64,
                   changed: bool,
                   what: &'static str|
     -> Result<()> {
        match field {
            Some(f) => {
                writes.push(FieldWrite {
                    position: f.position,
                    bytes: f.encode(value)?,
                });
                Ok(())
            }
            None if changed => Err(Error::Patch(what)),
            None => Ok(()),
        }
    };

    let moved = offset != resource.offset();
    let resized = length != resource.compressed_length();
    put(loc.offset, offset, moved, "entry has no offset field")?;
    put(loc.end, offset + length, false, "")?;
    put(
        loc.length,
        length,
        resized && loc.end.is_none(),
        "entry has no length field",
    )?;
    if let Some(d) = decompressed {
        let changed = decompressed != resource.decompressed_length();
        put(
            loc.decompressed,
            d,
            changed && resource.exporter().is_some(),
            "entry has no decompressed length field",
        )?;
    }

    Ok(Plan {
        writes,
        offset,
        length,
        decompressed,
    })
}

/// Perform the writes of `plan` on the file at `path`.
pub fn apply(path: &Path, plan: &Plan) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
    for w in &plan.writes {
        file.seek(SeekFrom::Start(w.position))?;
        file.write_all(&w.bytes)?;
    }
    file.flush()?;
    debug!(
        "patched {} field(s) in {}",
        plan.writes.len(),
        path.display()
    );
    Ok(())
}
