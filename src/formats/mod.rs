//! Built-in format plugins.
//!
//! Each submodule exports one `PLUGIN` descriptor. Parsers share the same
//! conventions:
//!
//! * **Metadata only** - `parse` reads the directory and describes every
//!   entry as a [`crate::Resource`]. File data is never loaded until a
//!   resource is extracted.
//! * **Validated** - every count, offset, length and name read from the
//!   directory goes through the [`crate::ParseContext`] checks first.
//! * **Decoding is separate** - encrypted or compressed entries carry an
//!   exporter instead of being decoded during the parse.
//!
//! ## Format overview
//!
//! | Module    | Format      | Description |
//! |-----------|-------------|-------------|
//! | [`pfs0`]  | PFS0 / NSP  | Flat archive; outer container for NSP files |
//! | [`hfs0`]  | HFS0        | SHA-256-hashed archive embedded in XCI game cards |
//! | [`xci`]   | XCI         | Game card dump; nested HFS0 partitions walked as one tree |
//! | [`sarc`]  | SARC        | General-purpose game asset archive, either endianness |
//! | [`bfttf`] | BFTTF/BFOTF | XOR-obfuscated TrueType/OpenType system font |
//! | [`ncz`]   | NCZ         | Zstandard block-compressed NCA sections |
//! | [`pak`]   | PAK         | Quake-family flat archive, directory at the end |
//! | [`img`]   | DIR + IMG   | GTA III era archive split across two files |

use crate::plugin::FormatPlugin;

pub mod bfttf;
pub mod hfs0;
pub mod img;
pub mod ncz;
pub mod pak;
pub mod pfs0;
pub mod sarc;
pub mod xci;

/// Every built-in plugin, in registration order.
pub fn builtin() -> Vec<FormatPlugin> {
    vec![
        pfs0::PLUGIN,
        hfs0::PLUGIN,
        xci::PLUGIN,
        sarc::PLUGIN,
        bfttf::PLUGIN,
        ncz::PLUGIN,
        pak::PLUGIN,
        img::PLUGIN,
    ]
}
