//! Shared fixtures: image builders and a minimal custom plugin.
#![allow(dead_code)]

use pakscan::{
    Error, FormatPlugin, ParseContext, Probe, Resource, Result, Score, synthesized_name, validate,
    weight,
};

fn i32_at(b: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// `"XYZ0"`, an i32 entry count, then `(offset, length)` i32 pairs.
pub const XYZ0: FormatPlugin = FormatPlugin {
    id: "xyz0",
    name: "XYZ0 test archive",
    extensions: &["xyz"],
    platforms: &[],
    writable: false,
    score: xyz_score,
    parse: xyz_parse,
};

fn xyz_score(p: &mut Probe<'_>) -> Result<u32> {
    if p.size() < 8 {
        return Ok(0);
    }
    let head = p.read_at(0, 8)?;
    let count = i32_at(&head, 4);
    if count < 0 || p.size() < 8 + count as u64 * 8 {
        return Ok(0);
    }

    let mut s = Score::new();
    s.add(p.extension_points(XYZ0.extensions));
    if !s.check(&head[..4] == b"XYZ0", weight::MAGIC) {
        return Ok(s.value());
    }
    if !s.check(
        validate::num_files_ok(count, p.limits().max_files),
        weight::PLAUSIBLE,
    ) {
        return Ok(s.value());
    }
    let dir = p.read_at(8, count as usize * 8)?;
    let size = p.size();
    let in_bounds = (0..count as usize)
        .all(|i| validate::range_ok(i32_at(&dir, i * 8), i32_at(&dir, i * 8 + 4), size));
    s.check(in_bounds, weight::CONSISTENT);
    Ok(s.value())
}

fn xyz_parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let c = ctx.container();
    let head = c.read_at(0, 8)?;
    if &head[..4] != b"XYZ0" {
        return Err(Error::BadMagic);
    }
    let count = ctx.check_num_files(i32_at(&head, 4))?;
    let dir = c.read_at(8, count * 8)?;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        ctx.entry(i, count)?;
        let (offset, length) = ctx.check_range(i32_at(&dir, i * 8), i32_at(&dir, i * 8 + 4))?;
        out.push(Resource::new(c, synthesized_name(i), offset, length));
    }
    Ok(out)
}

pub fn xyz0(entries: &[(i32, i32)], payload: &[u8]) -> Vec<u8> {
    let mut out = b"XYZ0".to_vec();
    out.extend_from_slice(&(entries.len() as i32).to_le_bytes());
    for (offset, length) in entries {
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Quake PAK with data first and the directory at the end.
pub fn pak(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut dir = Vec::new();
    for (name, bytes) in files {
        let mut field = [0u8; 56];
        field[..name.len()].copy_from_slice(name.as_bytes());
        dir.extend_from_slice(&field);
        dir.extend_from_slice(&((12 + data.len()) as i32).to_le_bytes());
        dir.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
        data.extend_from_slice(bytes);
    }
    let mut out = b"PACK".to_vec();
    out.extend_from_slice(&((12 + data.len()) as i32).to_le_bytes());
    out.extend_from_slice(&(dir.len() as i32).to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&dir);
    out
}

/// PFS0 (NSP) image, entries packed in order.
pub fn pfs0(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut names = Vec::new();
    let mut name_offsets = Vec::new();
    for (name, _) in files {
        name_offsets.push(names.len() as u32);
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }
    while names.len() % 4 != 0 {
        names.push(0);
    }
    let mut out = b"PFS0".to_vec();
    out.extend_from_slice(&(files.len() as u32).to_le_bytes());
    out.extend_from_slice(&(names.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    let mut pos = 0u64;
    for ((_, data), name_offset) in files.iter().zip(&name_offsets) {
        out.extend_from_slice(&pos.to_le_bytes());
        out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        out.extend_from_slice(&name_offset.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        pos += data.len() as u64;
    }
    out.extend_from_slice(&names);
    for (_, data) in files {
        out.extend_from_slice(data);
    }
    out
}

/// GTA directory entry: sector offset, sector count, 24-byte name.
pub fn img_dir_entry(sector: u32, sectors: u32, name: &str) -> Vec<u8> {
    let mut e = Vec::new();
    e.extend_from_slice(&sector.to_le_bytes());
    e.extend_from_slice(&sectors.to_le_bytes());
    let mut field = [0u8; 24];
    field[..name.len()].copy_from_slice(name.as_bytes());
    e.extend_from_slice(&field);
    e
}
