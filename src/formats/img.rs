//! GTA IMG v1 - directory file plus separate data file (GTA III, Vice City).
//!
//! The archive is split in two: `name.dir` holds the directory and
//! `name.img` holds the data, addressed in 2048-byte sectors. The plugin is
//! registered for the `.dir` half and resolves the `.img` sibling itself;
//! resources point into the `.img` container.
//!
//! ## Directory Entry (0x20 bytes, no header)
//! ```text
//! [0x00] Offset  (u32 LE, sectors)
//! [0x04] Size    (u32 LE, sectors)
//! [0x08] Name    (24 bytes, null-padded)
//! ```

use std::io::Read;

use crate::context::ParseContext;
use crate::plugin::{FormatPlugin, Probe, Score, weight};
use crate::resource::Resource;
use crate::utils::{bytesa, fixed_string, le_u32};
use crate::{Error, Result, validate};

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "gta-img",
    name: "GTA IMG v1 (DIR + IMG)",
    extensions: &["dir"],
    platforms: &["pc", "ps2"],
    writable: false,
    score,
    parse,
};

const ENTRY_SIZE: u64 = 0x20;
const NAME_SIZE: usize = 24;
pub const SECTOR: u64 = 2048;
/// Entries inspected while scoring.
const SCORE_SAMPLE: u64 = 64;

struct Entry {
    name: String,
    sector: u32,
    sectors: u32,
}

fn read_entry<R: Read>(r: &mut R) -> Result<Entry> {
    let sector = le_u32(r)?;
    let sectors = le_u32(r)?;
    let name = fixed_string(&bytesa::<NAME_SIZE>(r)?);
    Ok(Entry {
        name,
        sector,
        sectors,
    })
}

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let mut s = Score::new();
    s.add(p.extension_points(PLUGIN.extensions));
    let size = p.size();
    let count = size / ENTRY_SIZE;
    let plausible = size % ENTRY_SIZE == 0 && validate::num_files_ok(count, p.limits().max_files);
    if !s.check(plausible, weight::PLAUSIBLE) {
        return Ok(s.value());
    }

    let max_name = p.limits().max_name_len;
    let mut names_ok = true;
    let mut furthest = 0u64;
    for _ in 0..count.min(SCORE_SAMPLE) {
        let e = read_entry(p)?;
        names_ok &= validate::filename_ok(&e.name, max_name);
        furthest = furthest.max((e.sector as u64 + e.sectors as u64) * SECTOR);
    }
    if !s.check(names_ok, weight::PLAUSIBLE) {
        return Ok(s.value());
    }

    // The data half must exist and hold every sampled entry.
    if let Some(img) = p.sibling("img")? {
        s.add(weight::CONSISTENT);
        s.check(furthest <= img.size(), weight::CONSISTENT);
    }
    Ok(s.value())
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let dir = ctx.container();
    let img = dir
        .sibling("img")?
        .ok_or(Error::Parse("GTA directory without its .img data file"))?;
    if dir.size() % ENTRY_SIZE != 0 {
        return Err(Error::Parse("directory size is not a multiple of 32"));
    }
    let count = ctx.check_num_files(dir.size() / ENTRY_SIZE)?;

    let mut r = dir.reader()?;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        ctx.entry(i, count)?;
        let e = read_entry(&mut r)?;
        ctx.check_filename(&e.name)?;
        let (offset, length) = validate::check_range(
            e.sector as u64 * SECTOR,
            e.sectors as u64 * SECTOR,
            img.size(),
        )?;
        out.push(Resource::new(&img, e.name, offset, length));
    }
    Ok(out)
}
