//! Interval-indexed view of a container's blocks.
//!
//! The sidecar coordinates file assigns each container member the genomic
//! span it covers. Joining the two positionally yields indexed blocks, which
//! are grouped into one interval tree per chromosome. A span crossing
//! chromosome boundaries is fragmented so that every indexed block belongs to
//! exactly one chromosome; the fragments share the same compressed bytes.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::{
    container::ContainerBlock,
    coords::{ChromoId, Coord, TrueGenomicInterval, CHROMO_MAX, CHROMO_MIN},
    error::{IndexError, Result},
    Error,
};

/// A container block enriched with the genomic interval it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexedBlock {
    /// Offset of the member header from the beginning of the file
    pub offset: u64,
    pub compressed_size: u64,
    pub decompressed_size: u64,
    pub chromosome: ChromoId,
    /// Covered span on `chromosome`, both ends inclusive
    pub start: i32,
    pub end: i32,
    /// Alignment records preceding this block's first record
    pub num_alignments: u64,
    /// True iff the block begins exactly on a transcript boundary
    pub is_aligned: bool,
    /// Start of the underlying (unfragmented) span. For a fragment of a
    /// cross-chromosome block this names where the member's byte content
    /// actually begins; elsewhere it equals `(chromosome, start)`.
    pub origin_chromosome: ChromoId,
    pub origin_start: i32,
}

/// Per-chromosome coordinate-range index over indexed blocks.
///
/// Blocks are held in file order; within one chromosome file order and
/// coordinate order coincide, so overlap queries answer in file-offset order
/// without further work. An empty tree is representable.
#[derive(Clone, Debug, Default)]
pub struct IntervalTree {
    blocks: Vec<IndexedBlock>,
}

impl IntervalTree {
    /// All blocks whose `[start, end]` intersects `[lo, hi]`, in file-offset
    /// order.
    #[must_use]
    pub fn find_overlapping(&self, lo: i32, hi: i32) -> Vec<IndexedBlock> {
        self.blocks
            .iter()
            .filter(|b| b.start <= hi && b.end >= lo)
            .copied()
            .collect()
    }

    /// The block with the smallest start on this chromosome, or `None` when
    /// the tree is empty.
    #[must_use]
    pub fn first_interval(&self) -> Option<&IndexedBlock> {
        self.blocks.iter().min_by_key(|b| b.start)
    }

    /// Forward iteration in block (file) order.
    pub fn intervals(&self) -> impl Iterator<Item = &IndexedBlock> {
        self.blocks.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

/// Joins sidecar tuples with container blocks into per-chromosome trees.
///
/// Tuples are paired positionally with blocks, so the block count must not
/// exceed the tuple count. Tuples are walked in order; a running list
/// accumulates blocks for the current chromosome and is sealed into a tree
/// whenever the chromosome changes. A tuple spanning several chromosomes is
/// split: `[start, CHROMO_MAX)` on the first, `[0, CHROMO_MAX)` on each fully
/// covered intermediate, `[0, end]` on the last.
pub fn build_trees(
    suffix: &str,
    intervals: &[TrueGenomicInterval],
    blocks: &[ContainerBlock],
    num_chromosomes: usize,
) -> Result<BTreeMap<ChromoId, IntervalTree>> {
    if blocks.len() > intervals.len() {
        return Err(IndexError::BlockCountExceedsTuples {
            suffix: suffix.to_string(),
            blocks: blocks.len(),
            tuples: intervals.len(),
        }
        .into());
    }

    let mut trees: BTreeMap<ChromoId, IntervalTree> = BTreeMap::new();
    let mut seal = |chromo: ChromoId, run: &mut Vec<IndexedBlock>| {
        if !run.is_empty() {
            trees
                .entry(chromo)
                .or_default()
                .blocks
                .append(&mut std::mem::take(run));
        }
    };

    let mut run: Vec<IndexedBlock> = Vec::new();
    let mut prev_chromo = match intervals.first() {
        Some(iv) => iv.start.chromosome,
        None => return Ok(trees),
    };

    for (interval, block) in intervals.iter().zip(blocks) {
        for coord in [interval.start, interval.end] {
            if coord.chromosome < 0 || coord.chromosome as usize >= num_chromosomes {
                return Err(IndexError::UnknownChromosome {
                    suffix: suffix.to_string(),
                    chromosome: coord.chromosome,
                }
                .into());
            }
        }

        if prev_chromo != interval.start.chromosome {
            seal(prev_chromo, &mut run);
            prev_chromo = interval.start.chromosome;
        }

        let indexed = |chromosome: ChromoId, start: i32, end: i32| IndexedBlock {
            offset: block.offset,
            compressed_size: block.compressed_size,
            decompressed_size: block.decompressed_size,
            chromosome,
            start,
            end,
            num_alignments: interval.num_alignments,
            is_aligned: interval.is_aligned,
            origin_chromosome: interval.start.chromosome,
            origin_start: interval.start.offset,
        };

        if interval.start.chromosome == interval.end.chromosome {
            run.push(indexed(
                interval.start.chromosome,
                interval.start.offset,
                interval.end.offset,
            ));
        } else {
            // fragment at chromosome boundaries; all fragments share the block
            run.push(indexed(
                interval.start.chromosome,
                interval.start.offset,
                CHROMO_MAX,
            ));
            seal(interval.start.chromosome, &mut run);
            for mid in interval.start.chromosome + 1..interval.end.chromosome {
                run.push(indexed(mid, CHROMO_MIN, CHROMO_MAX));
                seal(mid, &mut run);
            }
            run.push(indexed(
                interval.end.chromosome,
                CHROMO_MIN,
                interval.end.offset,
            ));
            prev_chromo = interval.end.chromosome;
        }
    }
    seal(prev_chromo, &mut run);
    Ok(trees)
}

/// The parsed sidecar coordinates file: tuples partitioned by stream suffix,
/// in physical block order within each suffix.
#[derive(Debug, Default)]
pub struct IntervalSidecar {
    by_suffix: FxHashMap<String, Vec<TrueGenomicInterval>>,
}

impl IntervalSidecar {
    /// Loads `genomic_intervals.txt`. A missing file is a missing archive
    /// component, not an I/O error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::MissingComponent(path.to_path_buf())
            } else {
                e.into()
            }
        })?;
        Self::parse(&text)
    }

    /// Parses the line grammar
    /// `<suffix> <num_alignments> <start_chr>:<start_off>-<end_chr>:<end_off> <is_aligned>`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut by_suffix: FxHashMap<String, Vec<TrueGenomicInterval>> = FxHashMap::default();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = |reason: &str| -> Error {
                IndexError::MalformedSidecar {
                    line: idx + 1,
                    reason: reason.to_string(),
                }
                .into()
            };

            let mut fields = line.split_whitespace();
            let suffix = fields.next().ok_or_else(|| malformed("missing suffix"))?;
            let num_alignments: u64 = fields
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| malformed("bad alignment count"))?;
            let span = fields.next().ok_or_else(|| malformed("missing span"))?;
            let is_aligned = match fields.next() {
                Some("1") => true,
                Some("0") => false,
                _ => return Err(malformed("bad alignment flag")),
            };
            if fields.next().is_some() {
                return Err(malformed("trailing fields"));
            }

            let (start, end) = span.split_once('-').ok_or_else(|| malformed("bad span"))?;
            let parse_coord = |s: &str| -> Option<Coord> {
                let (chromo, offset) = s.split_once(':')?;
                Some(Coord::new(chromo.parse().ok()?, offset.parse().ok()?))
            };
            let start = parse_coord(start).ok_or_else(|| malformed("bad start coordinate"))?;
            let end = parse_coord(end).ok_or_else(|| malformed("bad end coordinate"))?;

            by_suffix
                .entry(suffix.to_string())
                .or_default()
                .push(TrueGenomicInterval {
                    start,
                    end,
                    num_alignments,
                    is_aligned,
                });
        }
        Ok(Self { by_suffix })
    }

    /// The tuples recorded for one stream suffix, in block order.
    #[must_use]
    pub fn get(&self, suffix: &str) -> Option<&[TrueGenomicInterval]> {
        self.by_suffix.get(suffix).map(Vec::as_slice)
    }

    #[must_use]
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.by_suffix.keys().map(String::as_str)
    }
}
