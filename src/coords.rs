use std::fmt;

use crate::{Error, Result};

/// Chromosome (transcript) identifier - a small non-negative integer indexing
/// the header's transcript table. `-1` addresses every chromosome at once.
pub type ChromoId = i32;

/// Sentinel chromosome id selecting every chromosome.
pub const ALL_CHROMOSOMES: ChromoId = -1;

/// Exclusive upper bound on a genomic offset within one chromosome.
pub const CHROMO_MAX: i32 = 300_000_000;

/// Inclusive lower bound on a genomic offset.
pub const CHROMO_MIN: i32 = 0;

/// A genomic coordinate: `(chromosome, offset)` with `0 <= offset < CHROMO_MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coord {
    pub chromosome: ChromoId,
    pub offset: i32,
}

impl Coord {
    #[must_use]
    pub fn new(chromosome: ChromoId, offset: i32) -> Self {
        Self { chromosome, offset }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chromosome, self.offset)
    }
}

/// A single-chromosome query interval, `[start, end)` over one transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenomicInterval {
    pub chromosome: ChromoId,
    pub start: i32,
    pub end: i32,
}

impl GenomicInterval {
    #[must_use]
    pub fn new(chromosome: ChromoId, start: i32, end: i32) -> Self {
        Self {
            chromosome,
            start,
            end,
        }
    }

    /// Parses the `chr<N>:<start>-<end>` query grammar.
    ///
    /// `N` is a 0-based index into the transcript table. A missing `:` or `-`
    /// separator is a parse error.
    pub fn parse(location: &str) -> Result<Self> {
        let invalid = || Error::InvalidInterval(location.to_string());

        let (chromo_part, span) = location.split_once(':').ok_or_else(invalid)?;
        let chromo_digits = chromo_part.strip_prefix("chr").ok_or_else(invalid)?;
        let chromosome: ChromoId = chromo_digits.parse().map_err(|_| invalid())?;

        let (start, end) = span.split_once('-').ok_or_else(invalid)?;
        let start: i32 = start.parse().map_err(|_| invalid())?;
        let end: i32 = end.parse().map_err(|_| invalid())?;

        if chromosome < 0 || start < CHROMO_MIN || end > CHROMO_MAX || start > end {
            return Err(invalid());
        }
        Ok(Self::new(chromosome, start, end))
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chr{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

/// One sidecar tuple: the genomic span covered by a container block, possibly
/// crossing chromosome boundaries, plus the cumulative alignment count before
/// the block's first record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrueGenomicInterval {
    pub start: Coord,
    pub end: Coord,
    pub num_alignments: u64,
    /// True iff the span begins exactly on a transcript boundary. Such a block
    /// is a safe random-access entry point: all stream state resets there.
    pub is_aligned: bool,
}
