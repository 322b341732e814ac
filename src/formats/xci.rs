//! XCI (NX Card Image) - physical game card dump format.
//!
//! ## Overall Layout
//! ```text
//! [0x0000–0x0FFF] CardKeyArea      (challenge-response authentication data)
//! [0x1000–0x11FF] CardHeader       (0x200 bytes; see below)
//! [0x1200–0x7FFF] Reserved / T2 header areas
//! [0x8000–0xFFFF] CertArea         (device certificate)
//! [0x10000+]      NormalArea → root HFS0
//! ```
//!
//! ## CardHeader (at 0x1000)
//! ```text
//! [+0x000] RSA-2048 signature over [+0x100..+0x200]     (0x100 bytes)
//! [+0x100] Magic "HEAD"                                  (4 bytes)
//! [+0x104] RomAreaStartPageAddress  (page × 0x200)       (u32 LE)
//! [+0x10D] RomSize                                       (1 byte)
//! [+0x110] PackageId                                     (u64 LE)
//! [+0x130] PartitionFsHeaderAddress (absolute byte offs) (u64 LE)
//! [+0x138] PartitionFsHeaderSize                         (u64 LE)
//! ```
//!
//! The root HFS0 lists the card partitions (`normal`, `logo`, `update`,
//! `secure`), each of which is itself an HFS0. The plugin walks the whole
//! tree and names resources by path, e.g. `secure/0100....nca`.

use std::io::{Read, Seek, SeekFrom};

use tracing::trace;

use super::hfs0::HFS0;
use super::pfs0::{Table, resources, score_table};
use crate::context::ParseContext;
use crate::plugin::{FormatPlugin, Probe, Score, weight};
use crate::resource::Resource;
use crate::utils::{bytesa, le_u64, magic};
use crate::{Error, Result};

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "xci",
    name: "NX Card Image",
    extensions: &["xci"],
    platforms: &["switch"],
    writable: false,
    score,
    parse,
};

const HEAD_MAGIC_OFFSET: u64 = 0x1100;
const ROOT_ADDRESS_OFFSET: u64 = 0x1130;
/// Partitions nest one level on real cards; allow a little slack.
const MAX_DEPTH: usize = 4;

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let mut s = Score::new();
    s.add(p.extension_points(PLUGIN.extensions));
    if !s.check(p.magic_at(HEAD_MAGIC_OFFSET, b"HEAD")?, weight::MAGIC) {
        return Ok(s.value());
    }
    p.seek(SeekFrom::Start(ROOT_ADDRESS_OFFSET))?;
    let root = le_u64(p)?;
    if !s.check(root >= 0x1200 && root < p.size(), weight::PLAUSIBLE) {
        return Ok(s.value());
    }
    let table = score_table(p, root, HFS0, None)?;
    s.check(
        table == weight::MAGIC + weight::PLAUSIBLE + weight::CONSISTENT,
        weight::CONSISTENT,
    );
    Ok(s.value())
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let mut r = ctx.container().reader()?;
    r.seek(SeekFrom::Start(HEAD_MAGIC_OFFSET))?;
    magic(&mut r, b"HEAD")?;
    r.seek(SeekFrom::Start(ROOT_ADDRESS_OFFSET))?;
    let root = ctx.check_offset(le_u64(&mut r)?)?;
    walk(ctx, &mut r, root, "", 0, Vec::new())
}

/// Append the resources of the HFS0 at `base` to `out`, descending into
/// nested partitions.
fn walk<R: Read + Seek>(
    ctx: &ParseContext<'_>,
    r: &mut R,
    base: u64,
    prefix: &str,
    depth: usize,
    mut out: Vec<Resource>,
) -> Result<Vec<Resource>> {
    if depth > MAX_DEPTH {
        return Err(Error::Parse("HFS0 partitions nested too deeply"));
    }
    let table = Table::read(ctx, r, base, HFS0)?;
    for (entry, resource) in table.entries.iter().zip(resources(ctx, &table, prefix, false)) {
        if entry.size >= 4 && depth < MAX_DEPTH {
            r.seek(SeekFrom::Start(entry.offset))?;
            if &bytesa::<4>(r)? == HFS0.magic {
                trace!("descending into partition {}{}", prefix, entry.name);
                let nested = format!("{prefix}{}/", entry.name);
                out = walk(ctx, r, entry.offset, &nested, depth + 1, out)?;
                continue;
            }
        }
        out.push(resource);
    }
    Ok(out)
}
