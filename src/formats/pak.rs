//! Quake PAK - id Software's flat archive (Quake, Quake II, Half-Life).
//!
//! ## Layout
//! ```text
//! [0x00] Magic "PACK"          (4 bytes)
//! [0x04] DirectoryOffset       (i32 LE)
//! [0x08] DirectoryLength       (i32 LE, multiple of 0x40)
//! [...]  File data
//! [DirectoryOffset] Directory  (DirectoryLength / 0x40 entries)
//! ```
//!
//! ## Directory Entry (0x40 bytes)
//! ```text
//! [0x00] Name      (56 bytes, null-padded, '/' separated)
//! [0x38] FilePos   (i32 LE, absolute)
//! [0x3C] FileLen   (i32 LE)
//! ```
//!
//! Tools write the directory last, so it normally ends exactly at the end
//! of the file. FilePos and FileLen are recorded for in-place patching.

use std::io::{Seek, SeekFrom};

use crate::context::ParseContext;
use crate::patch::{Encoding, Field, PatchLocations};
use crate::plugin::{FormatPlugin, Probe, Score, weight};
use crate::resource::Resource;
use crate::utils::{bytesa, fixed_string, le_i32, magic};
use crate::{Error, Result, validate};

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "pak",
    name: "Quake PAK",
    extensions: &["pak"],
    platforms: &["pc"],
    writable: true,
    score,
    parse,
};

const HEADER_SIZE: i64 = 12;
const ENTRY_SIZE: i64 = 0x40;
const NAME_SIZE: usize = 56;

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let mut s = Score::new();
    s.add(p.extension_points(PLUGIN.extensions));
    if !s.check(p.magic_at(0, b"PACK")?, weight::MAGIC) {
        return Ok(s.value());
    }
    p.seek(SeekFrom::Start(4))?;
    let dir_offset = le_i32(p)? as i64;
    let dir_len = le_i32(p)? as i64;
    let size = p.size();
    let plausible = dir_offset >= HEADER_SIZE
        && dir_len >= 0
        && dir_len % ENTRY_SIZE == 0
        && validate::range_ok(dir_offset, dir_len, size)
        && validate::num_files_ok(dir_len / ENTRY_SIZE, p.limits().max_files);
    if !s.check(plausible, weight::PLAUSIBLE) {
        return Ok(s.value());
    }
    s.check(validate::equals(dir_offset + dir_len, size), weight::CONSISTENT);

    // First entry: printable name and an in-bounds range.
    let first = p.read_at(dir_offset as u64, ENTRY_SIZE as usize)?;
    let name = fixed_string(&first[..NAME_SIZE]);
    let pos = i32::from_le_bytes([first[56], first[57], first[58], first[59]]);
    let len = i32::from_le_bytes([first[60], first[61], first[62], first[63]]);
    s.check(
        validate::filename_ok(&name, p.limits().max_name_len) && validate::range_ok(pos, len, size),
        weight::CONSISTENT,
    );
    Ok(s.value())
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let c = ctx.container();
    let mut r = c.reader()?;
    magic(&mut r, b"PACK")?;
    let dir_offset = le_i32(&mut r)?;
    let dir_len = le_i32(&mut r)?;
    let (dir_offset, dir_len) = ctx.check_range(dir_offset, dir_len)?;
    if dir_len % ENTRY_SIZE as u64 != 0 {
        return Err(Error::Parse("PAK directory length is not a multiple of 64"));
    }
    let count = ctx.check_num_files(dir_len / ENTRY_SIZE as u64)?;

    r.seek(SeekFrom::Start(dir_offset))?;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        ctx.entry(i, count)?;
        let record = dir_offset + i as u64 * ENTRY_SIZE as u64;
        let name = fixed_string(&bytesa::<NAME_SIZE>(&mut r)?);
        ctx.check_filename(&name)?;
        let pos = le_i32(&mut r)?;
        let len = le_i32(&mut r)?;
        let (offset, length) = ctx.check_range(pos, len)?;
        out.push(
            Resource::new(c, name, offset, length).with_patch_locations(PatchLocations {
                offset: Some(Field::new(record + 56, Encoding::I32Le)),
                length: Some(Field::new(record + 60, Encoding::I32Le)),
                ..Default::default()
            }),
        );
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::container::Container;
    use crate::context::Control;

    /// Build a PAK with data first and the directory at the end.
    pub(crate) fn build(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut dir = Vec::new();
        for (name, bytes) in files {
            let pos = HEADER_SIZE as usize + data.len();
            let mut field = [0u8; NAME_SIZE];
            field[..name.len()].copy_from_slice(name.as_bytes());
            dir.extend_from_slice(&field);
            dir.extend_from_slice(&(pos as i32).to_le_bytes());
            dir.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            data.extend_from_slice(bytes);
        }
        let mut out = Vec::new();
        out.extend_from_slice(b"PACK");
        out.extend_from_slice(&((HEADER_SIZE as usize + data.len()) as i32).to_le_bytes());
        out.extend_from_slice(&(dir.len() as i32).to_le_bytes());
        out.extend_from_slice(&data);
        out.extend_from_slice(&dir);
        out
    }

    #[test]
    fn parse_pak() {
        let image = build(&[("maps/e1m1.bsp", b"BSP29"), ("sound/door.wav", b"RIFF")]);
        let c = Container::from_bytes("pak0.pak", image);
        assert_eq!(PLUGIN.evaluate(&c, Limits::default()), 100);

        let ctx = ParseContext::new(&c, Limits::default(), Control::new());
        let res = parse(&ctx).unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].name(), "maps/e1m1.bsp");
        assert_eq!(res[0].offset(), 12);
        assert_eq!(res[1].read_all().unwrap(), b"RIFF");
    }

    #[test]
    fn negative_position_is_out_of_bounds() {
        let mut image = build(&[("a.txt", b"hello")]);
        let rec = image.len() - 8;
        image[rec..rec + 4].copy_from_slice(&(-4i32).to_le_bytes());
        let c = Container::from_bytes("pak0.pak", image);
        assert_eq!(PLUGIN.evaluate(&c, Limits::default()), 75);
        let ctx = ParseContext::new(&c, Limits::default(), Control::new());
        assert!(matches!(
            parse(&ctx),
            Err(Error::OutOfBounds { value: -4, .. })
        ));
    }

    #[test]
    fn odd_directory_length_scores_low() {
        let mut image = build(&[("a.txt", b"hello")]);
        image[8..12].copy_from_slice(&63i32.to_le_bytes());
        let c = Container::from_bytes("x.dat", image);
        assert_eq!(PLUGIN.evaluate(&c, Limits::default()), 25);
    }
}
