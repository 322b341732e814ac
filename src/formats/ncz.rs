//! NCZ - Zstandard-compressed NCA sections (used inside NSZ archives).
//!
//! An NSZ file is **not** a distinct binary format; it is an NSP (PFS0)
//! where individual NCA entries have been compressed with a Nintendo-specific
//! scheme and renamed from `.nca` to `.ncz`.
//!
//! ## NCZ Layout
//! ```text
//! [0x000]          Standard NCA header (0x400 bytes, still encrypted)
//! [0x400]          Magic "NCZSECTN"                    (8 bytes)
//! [0x408]          SectionCount                        (u64 LE)
//! [0x410 + N×0x38] Section descriptors                 (N × 0x38 bytes)
//! [...]            Zstandard-compressed data blocks
//! ```
//!
//! Each block starts with a `u32 LE` giving the compressed byte length,
//! followed by that many bytes of Zstd-compressed data. A zero length or the
//! end of the file ends the block list.
//!
//! ## Section Descriptor (0x38 bytes)
//! ```text
//! [0x00] Offset      - within the plaintext NCA (u64 LE)
//! [0x08] Size        - decompressed (u64 LE)
//! [0x10] CryptoType  (u8)
//! [0x11] Reserved    (7 bytes)
//! [0x18] CryptoKey   (16 bytes)
//! [0x28] CryptoCounter (16 bytes)
//! ```
//!
//! The plugin exposes two resources: `header.bin`, the raw NCA header, and
//! `sections.bin`, every block decompressed and concatenated by a
//! [`Blocks`] exporter. Block decompressed sizes are not stored, so the
//! second resource has no declared decompressed length.

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use tracing::debug;

use crate::context::ParseContext;
use crate::exporter::{Block, Blocks, Zstd};
use crate::plugin::{FormatPlugin, Probe, Score, weight};
use crate::resource::Resource;
use crate::utils::{bytesa, le_u32, le_u64, magic};
use crate::{Error, Result, validate};

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "ncz",
    name: "Compressed NCA",
    extensions: &["ncz"],
    platforms: &["switch"],
    writable: false,
    score,
    parse,
};

const NCA_HEADER_SIZE: u64 = 0x400;
const SECTION_TABLE: u64 = NCA_HEADER_SIZE + 0x10;
const SECTION_SIZE: u64 = 0x38;
const MAX_SECTIONS: u64 = 0x100;
const ZSTD_FRAME_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let mut s = Score::new();
    s.add(p.extension_points(PLUGIN.extensions));
    if !s.check(p.magic_at(NCA_HEADER_SIZE, b"NCZSECTN")?, weight::MAGIC) {
        return Ok(s.value());
    }
    p.seek(SeekFrom::Start(NCA_HEADER_SIZE + 8))?;
    let count = le_u64(p)?;
    let blocks = SECTION_TABLE + count.min(MAX_SECTIONS) * SECTION_SIZE;
    if !s.check(
        count > 0 && count <= MAX_SECTIONS && blocks + 4 <= p.size(),
        weight::PLAUSIBLE,
    ) {
        return Ok(s.value());
    }
    p.seek(SeekFrom::Start(blocks))?;
    let first = le_u32(p)? as u64;
    let framed = first >= 4
        && blocks + 4 + first <= p.size()
        && p.magic_at(blocks + 4, &ZSTD_FRAME_MAGIC)?;
    s.check(framed, weight::CONSISTENT);
    Ok(s.value())
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let c = ctx.container();
    let size = c.size();
    let mut r = c.reader()?;

    ctx.check_range(0, NCA_HEADER_SIZE)?;
    r.seek(SeekFrom::Start(NCA_HEADER_SIZE))?;
    magic(&mut r, b"NCZSECTN")?;
    let count = le_u64(&mut r)?;
    let count = validate::check_num_files(count, MAX_SECTIONS.min(ctx.limits().max_files))?;

    let mut plaintext = 0u64;
    for i in 0..count {
        ctx.entry(i, count)?;
        let _offset = le_u64(&mut r)?;
        plaintext = plaintext.saturating_add(le_u64(&mut r)?);
        bytesa::<0x28>(&mut r)?;
    }

    let blocks_offset = SECTION_TABLE + count as u64 * SECTION_SIZE;
    let mut pos = ctx.check_offset(blocks_offset)?;
    let mut blocks = Vec::new();
    while pos + 4 <= size {
        r.seek(SeekFrom::Start(pos))?;
        let len = le_u32(&mut r)? as u64;
        if len == 0 {
            break;
        }
        ctx.control().tick_entry()?;
        let (offset, compressed) = ctx.check_range(pos + 4, len)?;
        blocks.push(Block {
            offset,
            compressed,
            decompressed: None,
        });
        pos = offset + compressed;
    }
    if blocks.is_empty() {
        return Err(Error::Parse("NCZ has no compressed blocks"));
    }
    debug!("{count} sections ({plaintext} bytes plaintext) in {} blocks", blocks.len());

    let exporter = Blocks::new(blocks, Arc::new(Zstd));
    Ok(vec![
        Resource::new(c, "header.bin", 0, NCA_HEADER_SIZE),
        Resource::encoded(
            c,
            "sections.bin",
            blocks_offset,
            pos - blocks_offset,
            None,
            Arc::new(exporter),
        ),
    ])
}
