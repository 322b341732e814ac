//! **pakscan** - recognize game asset containers and extract their entries.
//!
//! An [`Engine`] holds a registry of [`FormatPlugin`]s. Given a file it asks
//! every plugin for a confidence score in `0..=100`, picks the best one above
//! the configured threshold and lets it parse the container's directory into
//! [`Resource`] descriptors. Resource bytes are only read when extracted, and
//! compressed or encrypted entries are decoded through an
//! [`exporter::Exporter`] at that point.
//!
//! ```no_run
//! use pakscan::Engine;
//!
//! # fn main() -> pakscan::Result<()> {
//! let engine = Engine::default();
//! let archive = engine.open_path("pak0.pak")?;
//! for res in archive.resources() {
//!     println!("{} ({} bytes)", res.name(), res.compressed_length());
//! }
//! let first = archive.extract(0)?;
//! # let _ = first;
//! # Ok(())
//! # }
//! ```
//!
//! # Built-in formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::pfs0`]  | PFS0 / NSP - PartitionFS flat archive |
//! | [`formats::hfs0`]  | HFS0 - SHA-256-hashed archive (XCI) |
//! | [`formats::xci`]   | XCI - Physical game card dump |
//! | [`formats::sarc`]  | SARC - SEAD ARChive |
//! | [`formats::bfttf`] | BFTTF/BFOTF - XOR-encrypted font |
//! | [`formats::ncz`]   | NCZ - Zstandard-compressed NCA sections |
//! | [`formats::pak`]   | PAK - Quake archive |
//! | [`formats::img`]   | DIR + IMG - GTA III era split archive |

pub mod config;
pub mod container;
pub mod context;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod formats;
pub mod patch;
pub mod plugin;
pub mod resource;
pub(crate) mod utils;
pub mod validate;

pub use config::{DEFAULT_MIN_SCORE, EngineConfig, Limits};
pub use container::Container;
pub use context::{Control, ParseContext};
pub use engine::{Archive, Engine, Ranked};
pub use error::{Bound, Error, Result};
pub use patch::{Encoding, Field, Patch, PatchLocations};
pub use plugin::{FormatPlugin, Probe, Score, weight};
pub use resource::{ByteRange, Extraction, Resource, Source, synthesized_name};
