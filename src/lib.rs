#![doc = include_str!("../README.md")]
//!
//! # Architecture
//!
//! The library is layered bottom-up:
//!
//! - [`container`] enumerates the members of a framed compressed file and
//!   decodes single members ([`container::scan_members`],
//!   [`container::decode_member`]).
//! - [`index`] joins the container member list with the sidecar coordinates
//!   file into per-chromosome interval trees over indexed blocks.
//! - [`buffer`] exposes a byte cursor per stream file, decompressing the
//!   blocks a query touches on demand ([`InputBuffer`]).
//! - [`streams`] interprets those cursors as record fields: offsets, edits,
//!   clips, flags, read ids and quality-group membership ([`InputStreams`]).
//! - [`head`] parses the archive header sidecar ([`ArchiveHeader`]).
//! - [`stitch`] reassembles aligned records in lock-step across all streams
//!   ([`Decompressor`]).
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use refz::{
//!     ArchiveHeader, DecodeOptions, Decompressor, GenomicInterval, IntervalSidecar,
//!     InputStreams, Result, SamWriter,
//! };
//!
//! fn main() -> Result<()> {
//!     let base = Path::new("./data/sample");
//!     let header = ArchiveHeader::load(Path::new("./data/sample.head"))?;
//!     let sidecar = IntervalSidecar::load(Path::new("./data/genomic_intervals.txt"))?;
//!     let mut streams = InputStreams::open(base, &sidecar, &header)?;
//!
//!     let decompressor = Decompressor::new(header, None);
//!     let mut sink = SamWriter::new(decompressor.header(), std::io::stdout());
//!     let interval = GenomicInterval::parse("chr0:100000000-105000000")?;
//!     decompressor.decompress_interval(
//!         interval,
//!         &mut streams,
//!         DecodeOptions::default(),
//!         &mut sink,
//!     )?;
//!     Ok(())
//! }
//! ```

/// Per-stream byte cursors over indexed blocks
pub mod buffer;

/// Framed compressed container reading and block decoding
pub mod container;

/// Genomic coordinates, query intervals and sidecar tuples
pub mod coords;

/// Error definitions
pub mod error;

/// Archive header sidecar parsing
pub mod head;

/// Interval-indexed view of container blocks
pub mod index;

/// Alignment records and record sinks
pub mod record;

/// Reference base lookup
pub mod reference;

/// Record stitching across parallel streams
pub mod stitch;

/// Typed decoders over the input buffers
pub mod streams;

pub use buffer::{InputBuffer, LoadedBlock};
pub use coords::{
    ChromoId, Coord, GenomicInterval, TrueGenomicInterval, ALL_CHROMOSOMES, CHROMO_MAX,
};
pub use error::{Error, Result};
pub use head::{ArchiveHeader, RemapTables, Transcript};
pub use index::{IndexedBlock, IntervalSidecar, IntervalTree};
pub use record::{AlignmentRecord, RecordSink, SamWriter, SinkFlow};
pub use reference::{InMemoryReference, ReferenceSource};
pub use stitch::{DecodeOptions, Decompressor};
pub use streams::InputStreams;
