//! # bgenkit
//!
//! A toolkit for the BGEN genotype probability format: a binary,
//! chunked, optionally compressed container of per-variant genotype
//! probability blocks used in statistical genetics.
//!
//! The library provides:
//!
//! - Codecs for the container header, per-variant identifying records,
//!   and compressed probability payloads across both on-disk layouts
//!   and all bit depths, via [`context`], [`variant`] and
//!   [`probability`]
//! - A stateful [`View`] reader: header once, then a cursor advancing
//!   through variants, optionally restricted and re-ordered by a query
//! - A persistent SQLite index sidecar ([`index`]) mapping variants to
//!   byte ranges, with a query planner composing inclusion and
//!   exclusion predicates into a sorted read plan
//! - Transcoders ([`transcode`]): an optimized layout-2 → layout-1
//!   rewrite, a VCF writer with per-bit-width lookup tables, and a raw
//!   byte-range copy for the no-transcode case
//! - Concatenation ([`cat`]) and in-place header edits ([`edit`])
//!
//! The binaries `bgenix`, `cat-bgen` and `edit-bgen` are thin shells
//! over these seams, sharing the option framework in [`cli`].
//!
//! # Example: list the variants of a file
//!
//! ```no_run
//! use bgenkit::View;
//!
//! fn main() -> bgenkit::Result<()> {
//!     let mut view = View::open("example.bgen")?;
//!     while let Some(variant) = view.read_variant()? {
//!         println!("{}\t{}\t{}", variant.chromosome, variant.position, variant.rsid);
//!         view.ignore_genotype_data_block()?;
//!     }
//!     Ok(())
//! }
//! ```

/// Multi-file concatenation
pub mod cat;

/// Command-line option framework shared by the binaries
pub mod cli;

/// Compression codec (zlib / zstd with verified lengths)
pub mod compress;

/// Container header codec
pub mod context;

/// In-place header edits
pub mod edit;

/// Little-endian wire primitives
pub mod endian;

/// Error definitions
pub mod error;

/// Index sidecar: store and query planner
pub mod index;

/// Genotype probability block codec
pub mod probability;

/// Output transcoders
pub mod transcode;

/// Variant identifier codec
pub mod variant;

/// Stateful reader over a BGEN file
pub mod view;

#[cfg(test)]
mod test_util;

pub use context::{Compression, Context, Layout};
pub use error::{Error, Result};
pub use index::{GenomicRange, IndexQuery, Plan};
pub use probability::{GenotypeDataBlock, OrderType, ProbabilitySink, ValueType};
pub use variant::Variant;
pub use view::{FileMetadata, View};
