//! SARC (SEAD ARChive) - general-purpose Nintendo archive.
//!
//! Used pervasively in Switch (and Wii U/3DS) game content.
//!
//! ## Layout
//! ```text
//! [0x00] SARC header  (0x14 bytes)
//! [0x14] SFAT header  (0x0C bytes) + FAT entries (FileCount × 0x10)
//! [...]  SFNT header  (0x08 bytes) + null-terminated filenames (4-byte aligned)
//! [...]  Data section (begins at offset given in SARC header)
//! ```
//!
//! ## Endianness
//! Determined by BOM: `0xFEFF` = Big Endian, `0xFFFE` = Little Endian.
//!
//! ## SARC Header (0x14 bytes)
//! ```text
//! [0x00] Magic "SARC"       (4 bytes)
//! [0x04] HeaderSize (0x14)  (u16 LE)
//! [0x06] BOM                (u16 LE)
//! [0x08] TotalFileSize      (u32, endian per BOM)
//! [0x0C] DataOffset         (u32, endian per BOM)
//! [0x10] Version (0x0100)   (u16 LE)
//! [0x12] Padding
//! ```
//!
//! ## SFAT Header (0x0C bytes)
//! ```text
//! [0x00] Magic "SFAT"           (4 bytes)
//! [0x04] HeaderSize (0x0C)      (u16)
//! [0x06] FileCount (max 0x3FFF) (u16, endian per BOM)
//! [0x08] HashMultiplier (101)   (u32, endian per BOM)
//! ```
//!
//! ## SFAT Entry (0x10 bytes)
//! ```text
//! [0x00] FilenameHash           (u32, endian per BOM)
//! [0x04] FilenameAttrs          (u32, endian per BOM)
//!         0 = no name; else 0xAABBBBBB where BBBBBB = name-table word offset
//! [0x08] DataStart              (u32, endian per BOM) - relative to data section
//! [0x0C] DataEnd                (u32, endian per BOM)
//! ```
//!
//! Entries without a name get a synthesized `fileNNNN` name. DataStart and
//! DataEnd are recorded for in-place patching.

use std::io::{Read, Seek, SeekFrom};

use crate::context::ParseContext;
use crate::patch::{Encoding, Field, PatchLocations};
use crate::plugin::{FormatPlugin, Probe, Score, weight};
use crate::resource::{Resource, synthesized_name};
use crate::utils::{end_u16, end_u32, le_u16, magic, read_null_string};
use crate::{Error, Result};

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "sarc",
    name: "SEAD Archive",
    extensions: &["sarc", "pack", "arc", "bars", "bgenv"],
    platforms: &["switch", "wiiu", "3ds"],
    writable: true,
    score,
    parse,
};

const SFAT_OFFSET: u64 = 0x14;
const FAT_ENTRIES_OFFSET: u64 = SFAT_OFFSET + 0x0C;
const FAT_ENTRY_SIZE: u64 = 0x10;
const MAX_FILES: u16 = 0x3FFF;

#[derive(Debug, Clone, Copy)]
struct Header {
    le: bool,
    total_size: u32,
    data_offset: u32,
    file_count: u16,
    hash_multiplier: u32,
}

impl Header {
    fn read<R: Read + Seek>(r: &mut R) -> Result<Self> {
        r.seek(SeekFrom::Start(0))?;
        magic(r, b"SARC")?;
        if le_u16(r)? != 0x14 {
            return Err(Error::Parse("unexpected SARC header size"));
        }
        // BOM is always written LE regardless of archive endianness.
        let le = match le_u16(r)? {
            0xFFFE => true,
            0xFEFF => false,
            _ => return Err(Error::Parse("invalid SARC BOM")),
        };
        let total_size = end_u32(r, le)?;
        let data_offset = end_u32(r, le)?;

        r.seek(SeekFrom::Start(SFAT_OFFSET))?;
        magic(r, b"SFAT")?;
        if le_u16(r)? != 0x0C {
            return Err(Error::Parse("unexpected SFAT header size"));
        }
        let file_count = end_u16(r, le)?;
        let hash_multiplier = end_u32(r, le)?;
        Ok(Self {
            le,
            total_size,
            data_offset,
            file_count,
            hash_multiplier,
        })
    }

    fn u32_encoding(&self) -> Encoding {
        if self.le { Encoding::U32Le } else { Encoding::U32Be }
    }

    fn name_table_start(&self) -> u64 {
        // SFNT header follows the FAT and is 8 bytes long.
        FAT_ENTRIES_OFFSET + self.file_count as u64 * FAT_ENTRY_SIZE + 8
    }
}

/// SARC filename hash algorithm.
///
/// Each byte is sign-extended (cast to `i8`) before accumulating. This is
/// required to correctly handle non-ASCII characters in Switch game paths.
pub fn sarc_hash(name: &[u8], multiplier: u32) -> u32 {
    let mut h: u32 = 0;
    for &b in name {
        h = h.wrapping_mul(multiplier).wrapping_add(b as i8 as u32);
    }
    h
}

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let mut s = Score::new();
    s.add(p.extension_points(PLUGIN.extensions));
    if !s.check(p.magic_at(0, b"SARC")?, weight::MAGIC) {
        return Ok(s.value());
    }
    let Ok(header) = Header::read(p) else {
        return Ok(s.value());
    };
    let plausible = header.file_count <= MAX_FILES
        && header.name_table_start() <= p.size()
        && header.data_offset as u64 <= p.size();
    if !s.check(plausible, weight::PLAUSIBLE) {
        return Ok(s.value());
    }
    s.check(header.total_size as u64 == p.size(), weight::CONSISTENT);

    // The first named entry's stored hash must match its name.
    if header.file_count > 0 {
        p.seek(SeekFrom::Start(FAT_ENTRIES_OFFSET))?;
        let hash = end_u32(p, header.le)?;
        let attrs = end_u32(p, header.le)?;
        if attrs != 0 {
            let at = header.name_table_start() + (attrs & 0x00FF_FFFF) as u64 * 4;
            p.seek(SeekFrom::Start(at))?;
            let limit = p.limits().max_name_len;
            let name = read_null_string(p, limit)?;
            s.check(
                sarc_hash(name.as_bytes(), header.hash_multiplier) == hash,
                weight::CONSISTENT,
            );
        }
    }
    Ok(s.value())
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let c = ctx.container();
    let mut r = c.reader()?;
    let header = Header::read(&mut r)?;
    if header.file_count > MAX_FILES {
        return Err(Error::Parse("SARC file count exceeds maximum"));
    }
    let count = header.file_count as usize;
    let data_offset = ctx.check_offset(header.data_offset)?;
    let name_table = header.name_table_start();

    r.seek(SeekFrom::Start(name_table - 8))?;
    magic(&mut r, b"SFNT")?;

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        ctx.entry(i, count)?;
        let record = FAT_ENTRIES_OFFSET + i as u64 * FAT_ENTRY_SIZE;
        r.seek(SeekFrom::Start(record))?;
        let _hash = end_u32(&mut r, header.le)?;
        let attrs = end_u32(&mut r, header.le)?;
        let start = end_u32(&mut r, header.le)? as u64;
        let end = end_u32(&mut r, header.le)? as u64;
        if end < start {
            return Err(Error::InvalidRange);
        }

        let name = if attrs == 0 {
            synthesized_name(i)
        } else {
            let at = ctx.check_offset(name_table + (attrs & 0x00FF_FFFF) as u64 * 4)?;
            r.seek(SeekFrom::Start(at))?;
            let name = read_null_string(&mut r, ctx.limits().max_name_len)?;
            ctx.check_filename(&name)?;
            name
        };

        let (offset, length) = ctx.check_range(data_offset + start, end - start)?;
        let enc = header.u32_encoding();
        out.push(
            Resource::new(c, name, offset, length).with_patch_locations(PatchLocations {
                offset: Some(Field::new(record + 8, enc).base(data_offset)),
                end: Some(Field::new(record + 12, enc).base(data_offset)),
                ..Default::default()
            }),
        );
    }
    Ok(out)
}
