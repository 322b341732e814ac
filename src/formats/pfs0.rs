//! PFS0 (PartitionFS) - flat archive container.
//!
//! Used as the outer container for NSP files and embedded inside NCAs as the
//! ExeFS and Logo sections.
//!
//! ## Layout
//! ```text
//! [0x00] Magic "PFS0"              (4 bytes)
//! [0x04] FileCount                 (u32 LE)
//! [0x08] StringTableSize           (u32 LE)
//! [0x0C] Reserved (always 0)       (4 bytes)
//! [0x10] EntryTable                (FileCount × 0x18 bytes)
//! [0x10 + FileCount×0x18]
//!        StringTable               (StringTableSize bytes)
//! [0x10 + FileCount×0x18 + StringTableSize]
//!        FileData                  (remaining bytes)
//! ```
//!
//! ## File Entry (0x18 bytes)
//! ```text
//! [0x00] Offset  - relative to the data section start (u64 LE)
//! [0x08] Size    - in bytes (u64 LE)
//! [0x10] NameOffset - byte offset into the string table (u32 LE)
//! [0x14] Reserved   (u32)
//! ```
//!
//! HFS0 shares the header and differs only in entry size, so the table
//! reader here is used by [`super::hfs0`] and [`super::xci`] too.
//!
//! Entry offset and size fields are recorded for in-place patching; the
//! data section start is the offset field's base.

use std::io::{Read, Seek, SeekFrom};

use crate::context::ParseContext;
use crate::patch::{Encoding, Field, PatchLocations};
use crate::plugin::{FormatPlugin, Probe, Score, weight};
use crate::resource::Resource;
use crate::utils::{bytesv, le_u32, le_u64, magic, null_string};
use crate::{Result, validate};

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "pfs0",
    name: "PartitionFS (NSP)",
    extensions: &["nsp", "pfs0", "nsz"],
    platforms: &["switch"],
    writable: true,
    score,
    parse,
};

/// Header and entry geometry of a partition filesystem.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    pub magic: &'static [u8; 4],
    pub entry_size: u64,
}

pub(crate) const PFS0: Layout = Layout {
    magic: b"PFS0",
    entry_size: 0x18,
};

const HEADER_SIZE: u64 = 0x10;

/// One directory entry with absolute positions.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub name: String,
    /// Absolute container offset of the data.
    pub offset: u64,
    pub size: u64,
    /// Absolute container offset of the entry record.
    pub record: u64,
}

/// A parsed partition table.
#[derive(Debug)]
pub(crate) struct Table {
    pub entries: Vec<Entry>,
    /// Absolute container offset where file data begins.
    pub data_offset: u64,
}

impl Table {
    /// Read a table whose header starts at absolute offset `base`.
    pub fn read<R: Read + Seek>(
        ctx: &ParseContext<'_>,
        r: &mut R,
        base: u64,
        layout: Layout,
    ) -> Result<Self> {
        r.seek(SeekFrom::Start(base))?;
        magic(r, layout.magic)?;
        // Empty partitions occur inside game cards.
        let file_count = match le_u32(r)? {
            0 => 0,
            n => ctx.check_num_files(n)?,
        };
        let string_table_size = le_u32(r)? as u64;
        let _reserved = le_u32(r)?;

        let entries_size = file_count as u64 * layout.entry_size;
        let (_, header_len) =
            ctx.check_range(base, HEADER_SIZE + entries_size + string_table_size)?;
        let data_offset = base + header_len;

        let mut raw = Vec::with_capacity(file_count);
        for i in 0..file_count {
            ctx.entry(i, file_count)?;
            let record = base + HEADER_SIZE + i as u64 * layout.entry_size;
            r.seek(SeekFrom::Start(record))?;
            let offset = le_u64(r)?;
            let size = le_u64(r)?;
            let name_offset = le_u32(r)?;
            raw.push((offset, size, name_offset, record));
        }

        r.seek(SeekFrom::Start(base + HEADER_SIZE + entries_size))?;
        let string_table = bytesv(r, string_table_size as usize)?;

        let mut entries = Vec::with_capacity(file_count);
        for (offset, size, name_offset, record) in raw {
            let name = null_string(&string_table, name_offset as usize)?;
            ctx.check_filename(&name)?;
            let (offset, size) = ctx.check_range(data_offset as i128 + offset as i128, size)?;
            entries.push(Entry {
                name,
                offset,
                size,
                record,
            });
        }

        Ok(Self {
            entries,
            data_offset,
        })
    }
}

/// Score a partition table whose header starts at `base`.
///
/// Magic, then a plausible header, then the self-consistency check that
/// every entry lies inside the file and the last one ends at `expected_end`
/// (when given).
pub(crate) fn score_table(
    p: &mut Probe<'_>,
    base: u64,
    layout: Layout,
    expected_end: Option<u64>,
) -> Result<u32> {
    let mut s = Score::new();
    if !s.check(p.magic_at(base, layout.magic)?, weight::MAGIC) {
        return Ok(s.value());
    }
    p.seek(SeekFrom::Start(base + 4))?;
    let count = le_u32(p)? as u64;
    let string_table_size = le_u32(p)? as u64;
    let data_offset = base + HEADER_SIZE + count * layout.entry_size + string_table_size;
    let plausible = validate::num_files_ok(count, p.limits().max_files)
        && data_offset <= p.size();
    if !s.check(plausible, weight::PLAUSIBLE) {
        return Ok(s.value());
    }

    let mut end = data_offset;
    for i in 0..count {
        p.seek(SeekFrom::Start(base + HEADER_SIZE + i * layout.entry_size))?;
        let offset = le_u64(p)?;
        let size = le_u64(p)?;
        let name_offset = le_u32(p)? as u64;
        let entry_end = data_offset as u128 + offset as u128 + size as u128;
        if entry_end > p.size() as u128 || name_offset >= string_table_size.max(1) {
            return Ok(s.value());
        }
        end = end.max(entry_end as u64);
    }
    let consistent = match expected_end {
        Some(expected) => end == expected,
        None => true,
    };
    s.check(consistent, weight::CONSISTENT);
    Ok(s.value())
}

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let ext = p.extension_points(PLUGIN.extensions);
    let size = p.size();
    Ok(ext + score_table(p, 0, PFS0, Some(size))?)
}

/// Resources for `table`, with `prefix` prepended to every name.
pub(crate) fn resources(
    ctx: &ParseContext<'_>,
    table: &Table,
    prefix: &str,
    patchable: bool,
) -> Vec<Resource> {
    table
        .entries
        .iter()
        .map(|e| {
            let r = Resource::new(ctx.container(), format!("{prefix}{}", e.name), e.offset, e.size);
            if patchable {
                r.with_patch_locations(PatchLocations {
                    offset: Some(Field::new(e.record, Encoding::U64Le).base(table.data_offset)),
                    length: Some(Field::new(e.record + 8, Encoding::U64Le)),
                    ..Default::default()
                })
            } else {
                r
            }
        })
        .collect()
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let mut r = ctx.container().reader()?;
    let table = Table::read(ctx, &mut r, 0, PFS0)?;
    Ok(resources(ctx, &table, "", true))
}
