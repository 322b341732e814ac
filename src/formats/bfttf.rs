//! BFTTF / BFOTF (Binary caFe TrueType/OpenType Font) - XOR-encrypted font.
//!
//! A standard TTF or OTF font file wrapped in simple XOR obfuscation.
//! Used as system fonts on Nintendo Switch and Wii U.
//!
//! There is **no custom file header**; the entire file is XOR-encrypted.
//! After decryption the result is a standard font file:
//! * TTF: starts with `\x00\x01\x00\x00`
//! * OTF: starts with `OTTO`
//! * TTC: starts with `ttcf`
//!
//! ## XOR Keys (16 bytes each, cycling over the entire file)
//!
//! | Platform | Key (hex) |
//! |----------|-----------|
//! | Wii U    | `2A CE F5 16 10 0D C4 C3 28 78 27 42 A5 5B F4 AB` |
//! | Switch   | `15 9A 7D 6F 16 6F D0 0C 67 E7 39 98 0B EB F6 62` |
//! | Windows  | `97 3B 5C 6C 26 F3 FA B5 A2 D5 8E B5 5A 4D D5 51` |
//!
//! The plugin yields one resource, the decrypted font, decoded lazily by an
//! [`XorKey`] exporter.

use std::sync::Arc;

use crate::context::ParseContext;
use crate::exporter::{XorKey, xor_in_place};
use crate::plugin::{FormatPlugin, Probe, Score, weight};
use crate::resource::Resource;
use crate::{Error, Result};

pub const PLUGIN: FormatPlugin = FormatPlugin {
    id: "bfttf",
    name: "Encrypted system font",
    extensions: &["bfttf", "bfotf"],
    platforms: &["switch", "wiiu", "windows"],
    writable: false,
    score,
    parse,
};

/// Platform for which a BFTTF/BFOTF font is intended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontPlatform {
    WiiU,
    Switch,
    Windows,
}

impl FontPlatform {
    /// Detection order.
    pub const ALL: [FontPlatform; 3] = [
        FontPlatform::Switch,
        FontPlatform::WiiU,
        FontPlatform::Windows,
    ];

    /// The 16-byte XOR key for this platform.
    pub fn xor_key(self) -> &'static [u8; 16] {
        match self {
            FontPlatform::WiiU => &[
                0x2A, 0xCE, 0xF5, 0x16, 0x10, 0x0D, 0xC4, 0xC3, 0x28, 0x78, 0x27, 0x42, 0xA5, 0x5B,
                0xF4, 0xAB,
            ],
            FontPlatform::Switch => &[
                0x15, 0x9A, 0x7D, 0x6F, 0x16, 0x6F, 0xD0, 0x0C, 0x67, 0xE7, 0x39, 0x98, 0x0B, 0xEB,
                0xF6, 0x62,
            ],
            FontPlatform::Windows => &[
                0x97, 0x3B, 0x5C, 0x6C, 0x26, 0xF3, 0xFA, 0xB5, 0xA2, 0xD5, 0x8E, 0xB5, 0x5A, 0x4D,
                0xD5, 0x51,
            ],
        }
    }
}

/// Kind of font found after decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    TrueType,
    OpenType,
    Collection,
}

impl FontKind {
    fn detect(head: &[u8]) -> Option<Self> {
        if head.starts_with(&[0x00, 0x01, 0x00, 0x00]) {
            Some(Self::TrueType)
        } else if head.starts_with(b"OTTO") {
            Some(Self::OpenType)
        } else if head.starts_with(b"ttcf") {
            Some(Self::Collection)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::TrueType => "ttf",
            Self::OpenType => "otf",
            Self::Collection => "ttc",
        }
    }
}

/// Encrypt a raw TTF/OTF byte slice into BFTTF/BFOTF form.
///
/// XOR is symmetric, so this also decrypts.
pub fn encrypt(data: &[u8], platform: FontPlatform) -> Vec<u8> {
    let mut out = data.to_vec();
    xor_in_place(&mut out, platform.xor_key(), 0);
    out
}

/// Length of the sfnt/TTC header the checks below look at.
const HEAD_LEN: usize = 12;

fn decrypt_head(encrypted: &[u8]) -> Option<(FontPlatform, FontKind, Vec<u8>)> {
    FontPlatform::ALL.into_iter().find_map(|platform| {
        let mut head = encrypted.to_vec();
        xor_in_place(&mut head, platform.xor_key(), 0);
        FontKind::detect(&head).map(|kind| (platform, kind, head))
    })
}

fn be16(b: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([b[at], b[at + 1]])
}

fn be32(b: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn score(p: &mut Probe<'_>) -> Result<u32> {
    let mut s = Score::new();
    s.add(p.extension_points(PLUGIN.extensions));
    if p.size() < HEAD_LEN as u64 {
        return Ok(s.value());
    }
    let encrypted = p.read_at(0, HEAD_LEN)?;
    let Some((_, kind, head)) = decrypt_head(&encrypted) else {
        return Ok(s.value());
    };
    s.add(weight::MAGIC);

    match kind {
        FontKind::TrueType | FontKind::OpenType => {
            let tables = be16(&head, 4);
            if !s.check((1..=64).contains(&tables), weight::PLAUSIBLE) {
                return Ok(s.value());
            }
            // searchRange = 16 * 2^floor(log2(numTables)), entrySelector = floor(log2).
            let selector = 15 - tables.leading_zeros() as u16;
            s.check(be16(&head, 6) == 16 << selector, weight::CONSISTENT);
            s.check(be16(&head, 8) == selector, weight::CONSISTENT);
        }
        FontKind::Collection => {
            let version = be32(&head, 4);
            if !s.check(matches!(version, 0x0001_0000 | 0x0002_0000), weight::PLAUSIBLE) {
                return Ok(s.value());
            }
            let fonts = be32(&head, 8) as u64;
            s.check(
                fonts > 0 && HEAD_LEN as u64 + fonts * 4 <= p.size(),
                weight::CONSISTENT,
            );
        }
    }
    Ok(s.value())
}

fn parse(ctx: &ParseContext<'_>) -> Result<Vec<Resource>> {
    let c = ctx.container();
    let size = ctx.check_length(c.size())?;
    if size < HEAD_LEN as u64 {
        return Err(Error::UnexpectedEof);
    }
    let encrypted = c.read_at(0, HEAD_LEN)?;
    let (platform, kind, _) = decrypt_head(&encrypted).ok_or(Error::BadMagic)?;
    ctx.entry(0, 1)?;

    let name = format!("{}.{}", c.stem(), kind.extension());
    let exporter = XorKey::new(platform.xor_key().to_vec())?;
    Ok(vec![Resource::encoded(
        c,
        name,
        0,
        size,
        Some(size),
        Arc::new(exporter),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::container::Container;
    use crate::context::Control;

    fn ttf() -> Vec<u8> {
        // sfnt header for 11 tables, then filler.
        let mut font = vec![0x00, 0x01, 0x00, 0x00, 0x00, 11, 0x00, 128, 0x00, 3, 0x00, 48];
        font.extend((0..200u8).map(|b| b.wrapping_mul(13)));
        font
    }

    #[test]
    fn scores_and_decrypts_switch_font() {
        let plain = ttf();
        let c = Container::from_bytes(
            "nintendo_udsg-r_std_003.bfttf",
            encrypt(&plain, FontPlatform::Switch),
        );
        assert_eq!(PLUGIN.evaluate(&c, Limits::default()), 100);

        let ctx = ParseContext::new(&c, Limits::default(), Control::new());
        let res = parse(&ctx).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].name(), "nintendo_udsg-r_std_003.ttf");
        assert_eq!(res[0].exporter_name(), "xor-key");
        assert_eq!(res[0].read_all().unwrap(), plain);
    }

    #[test]
    fn wiiu_opentype() {
        let mut plain = ttf();
        plain[..4].copy_from_slice(b"OTTO");
        let c = Container::from_bytes("font.bfotf", encrypt(&plain, FontPlatform::WiiU));
        let ctx = ParseContext::new(&c, Limits::default(), Control::new());
        let res = parse(&ctx).unwrap();
        assert_eq!(res[0].name(), "font.otf");
        assert_eq!(res[0].read_all().unwrap(), plain);
    }

    #[test]
    fn unencrypted_font_is_rejected() {
        let c = Container::from_bytes("plain.bfttf", ttf());
        assert_eq!(PLUGIN.evaluate(&c, Limits::default()), 10);
        let ctx = ParseContext::new(&c, Limits::default(), Control::new());
        assert!(matches!(parse(&ctx), Err(Error::BadMagic)));
    }

    #[test]
    fn tiny_file_scores_extension_only() {
        let c = Container::from_bytes("x.bfttf", vec![1, 2, 3]);
        assert_eq!(PLUGIN.evaluate(&c, Limits::default()), 10);
    }
}
