//! HFS0 (Hierarchical FileSystem 0 / SHA-256 FileSystem) - hashed archive.
//!
//! Used inside XCI game cards. The root HFS0 contains named sub-partitions
//! (`normal`, `logo`, `update`, `secure`), each itself an HFS0.
//!
//! ## Layout
//! ```text
//! [0x00] Magic "HFS0"              (4 bytes)
//! [0x04] FileCount                 (u32 LE)
//! [0x08] StringTableSize           (u32 LE)
//! [0x0C] Reserved                  (4 bytes)
//! [0x10] EntryTable                (FileCount × 0x40 bytes)
//! [0x10 + FileCount×0x40]
//!        StringTable               (StringTableSize bytes)
//! [(after StringTable)]
//!        FileData                  (remaining bytes)
//! ```
//!
//! ## File Entry (0x40 bytes)
//! ```text
//! [0x00] DataOffset - relative to the data section start (u64 LE)
//! [0x08] DataSize   - in bytes (u64 LE)
//! [0x10] NameOffset - byte offset into the string table (u32 LE)
//! [0x14] HashedRegionSize - number of leading bytes covered by the hash (u32 LE)
//! [0x18] Reserved   (u32)
//! [0x1C] Reserved   (u32)
//! [0x20] SHA-256 hash of the first HashedRegionSize bytes (32 bytes)
//! ```
//!
//! Entries carry a content hash, so the format is registered read-only.

use super::pfs0::{Layout, Table, resources, score_table};
use crate::Result;
use crate::context::ParseContext;
use crate::plugin::{FormatPlugin, Probe};
use crate::resource::Resource;

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "hfs0",
    name: "SHA-256 FileSystem",
    extensions: &["hfs0"],
    platforms: &["switch"],
    writable: false,
    score,
    parse,
};

pub(crate) const HFS0: Layout = Layout {
    magic: b"HFS0",
    entry_size: 0x40,
};

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let ext = p.extension_points(PLUGIN.extensions);
    let size = p.size();
    Ok(ext + score_table(p, 0, HFS0, Some(size))?)
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let mut r = ctx.container().reader()?;
    let table = Table::read(ctx, &mut r, 0, HFS0)?;
    Ok(resources(ctx, &table, "", false))
}
