//! Per-stream cursor over a framed compressed container.
//!
//! An [`InputBuffer`] memory-maps one stream file, enumerates its members,
//! and joins them with the sidecar tuples into per-chromosome interval trees.
//! A query enqueues the overlapping blocks; bytes are then served one block
//! at a time, decompressing on demand. No block is decoded twice within one
//! query session.

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, trace};

use crate::{
    container::{decode_member, scan_members},
    coords::{ChromoId, TrueGenomicInterval, ALL_CHROMOSOMES},
    error::{IndexError, Result, StreamError},
    index::{build_trees, IndexedBlock, IntervalTree},
    Error,
};

/// Longest admissible LEB128 varint, in bytes.
const MAX_VARINT_BYTES: usize = 10;

/// What a successful [`InputBuffer::load_overlapping_block`] reports about the
/// first decoded block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedBlock {
    /// Start offset of the first block's covered span
    pub start: i32,
    /// Alignment records preceding the first block's first record
    pub num_alignments: u64,
    /// True when the effective start sits on a transcript boundary, either
    /// because the request was clamped up to the chromosome's first available
    /// coordinate or because the first block is transcript-aligned
    pub is_transcript_start: bool,
}

/// A cursor over one compressed stream file.
#[derive(Debug)]
pub struct InputBuffer {
    /// Display name for diagnostics (the stream suffix)
    name: String,
    mmap: Mmap,
    trees: BTreeMap<ChromoId, IntervalTree>,
    /// Blocks queued for decompression, in serve order
    pending: VecDeque<IndexedBlock>,
    /// Currently available decompressed bytes of the underlying stream
    bytes: VecDeque<u8>,
    /// Chromosome of the most recently decoded block
    current_chromo: Option<ChromoId>,
    /// Underlying span origin of the most recently decoded block
    current_origin: Option<(ChromoId, i32)>,
    /// Set when a decode crosses into a transcript-aligned block mid-session
    crossed_transcript_start: Option<i32>,
}

impl InputBuffer {
    /// Opens the stream file, enumerates its container members and builds the
    /// per-chromosome trees from the sidecar tuples.
    pub fn open(
        path: &Path,
        intervals: &[TrueGenomicInterval],
        num_chromosomes: usize,
    ) -> Result<Self> {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::MissingComponent(path.to_path_buf())
            } else {
                e.into()
            }
        })?;
        let mmap = unsafe { Mmap::map(&file) }?;
        let blocks = scan_members(&mmap)?;
        debug!(stream = %name, blocks = blocks.len(), "enumerated container members");
        let trees = build_trees(&name, intervals, &blocks, num_chromosomes)?;
        Ok(Self {
            name,
            mmap,
            trees,
            pending: VecDeque::new(),
            bytes: VecDeque::new(),
            current_chromo: None,
            current_origin: None,
            crossed_transcript_start: None,
        })
    }

    /// Prepares the cursor for a query, discarding any prior session state.
    ///
    /// * With `at_num_alignments = Some(k)`, the single chosen block is the
    ///   last one (scanning every tree in ascending order) whose cumulative
    ///   alignment count is strictly below `k`; the pending queue stays empty.
    /// * With `chromo = -1`, every block of every tree is enqueued in order,
    ///   de-duplicated by file offset (adjacent trees may share a boundary
    ///   fragment backed by the same member).
    /// * Otherwise the chromosome's tree is consulted; a start below the
    ///   first available coordinate is clamped up to it.
    ///
    /// Returns `None` when the queried region holds no data.
    pub fn load_overlapping_block(
        &mut self,
        chromo: ChromoId,
        start: i32,
        end: i32,
        at_num_alignments: Option<u64>,
    ) -> Result<Option<LoadedBlock>> {
        debug!(stream = %self.name, chromo, start, end, "loading overlapping blocks");
        self.bytes.clear();
        self.pending.clear();
        self.current_chromo = None;
        self.current_origin = None;
        self.crossed_transcript_start = None;

        if let Some(k) = at_num_alignments {
            let chosen = self
                .trees
                .values()
                .flat_map(IntervalTree::intervals)
                .take_while(|b| b.num_alignments < k)
                .last()
                .copied()
                .ok_or(IndexError::NoSuchAlignmentPoint(k))?;
            self.decode_block(&chosen)?;
            self.crossed_transcript_start = None;
            return Ok(Some(LoadedBlock {
                start: chosen.start,
                num_alignments: chosen.num_alignments,
                is_transcript_start: chosen.is_aligned,
            }));
        }

        let mut clamped = false;
        if chromo == ALL_CHROMOSOMES {
            for block in self.trees.values().flat_map(IntervalTree::intervals) {
                // adjacent trees may share a boundary fragment; dedup by the
                // backing file offset, not by block identity
                let duplicate = self
                    .pending
                    .back()
                    .is_some_and(|last| last.offset == block.offset);
                if !duplicate {
                    self.pending.push_back(*block);
                }
            }
        } else {
            let Some(tree) = self.trees.get(&chromo) else {
                debug!(stream = %self.name, chromo, "no data for chromosome");
                return Ok(None);
            };
            let Some(first) = tree.first_interval() else {
                debug!(stream = %self.name, chromo, "no data for chromosome");
                return Ok(None);
            };
            // a request before the first available coordinate resumes at the
            // transcript's first record
            clamped = start < first.start;
            let actual_start = if clamped { first.start } else { start };
            self.pending.extend(tree.find_overlapping(actual_start, end));
        }

        let Some(head) = self.pending.pop_front() else {
            return Ok(None);
        };
        self.decode_block(&head)?;
        self.crossed_transcript_start = None;
        Ok(Some(LoadedBlock {
            start: head.start,
            num_alignments: head.num_alignments,
            is_transcript_start: clamped || head.is_aligned,
        }))
    }

    /// True iff decoded bytes remain or more blocks await decompression.
    #[must_use]
    pub fn has_more_bytes(&self) -> bool {
        !self.bytes.is_empty() || !self.pending.is_empty()
    }

    /// Streams the next byte out, decompressing the next pending block when
    /// the deque runs dry.
    pub fn get_next_byte(&mut self) -> Result<u8> {
        if self.bytes.is_empty() {
            self.decode_next_pending()?;
        }
        self.bytes
            .pop_front()
            .ok_or_else(|| StreamError::UnexpectedEndOfStream(self.name.clone()).into())
    }

    /// Drains the next `n` bytes, decoding further blocks as needed. Failing
    /// to gather `n` bytes mid-sequence is fatal.
    pub fn get_next_n_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.bytes.len() < n {
            if !self.decode_next_pending()? {
                return Err(StreamError::UnexpectedEndOfStream(self.name.clone()).into());
            }
        }
        Ok(self.bytes.drain(..n).collect())
    }

    /// Reads one LEB128 varint off the byte cursor.
    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.get_next_byte()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(StreamError::MalformedVarint(self.name.clone()).into())
    }

    /// Reports (and clears) the transcript boundary crossed by the most
    /// recent mid-session block decode, if any.
    pub fn take_transcript_start(&mut self) -> Option<i32> {
        self.crossed_transcript_start.take()
    }

    /// Chromosome of the most recently decoded block.
    #[must_use]
    pub fn current_chromosome(&self) -> Option<ChromoId> {
        self.current_chromo
    }

    /// Where the most recently decoded member's byte content begins. Differs
    /// from the served fragment when the member spans chromosome boundaries.
    #[must_use]
    pub fn current_origin(&self) -> Option<(ChromoId, i32)> {
        self.current_origin
    }

    /// Display name of the underlying stream.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn decode_next_pending(&mut self) -> Result<bool> {
        let Some(block) = self.pending.pop_front() else {
            trace!(stream = %self.name, "no more blocks");
            return Ok(false);
        };
        self.decode_block(&block)?;
        if block.is_aligned {
            self.crossed_transcript_start = Some(block.start);
        }
        Ok(true)
    }

    fn decode_block(&mut self, block: &IndexedBlock) -> Result<()> {
        let lo = block.offset as usize;
        let hi = lo + block.compressed_size as usize;
        let decoded = decode_member(&self.mmap[lo..hi], block.decompressed_size as usize)?;
        trace!(
            stream = %self.name,
            offset = block.offset,
            bytes = decoded.len(),
            "decoded block"
        );
        self.bytes.extend(decoded);
        self.current_chromo = Some(block.chromosome);
        self.current_origin = Some((block.origin_chromosome, block.origin_start));
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use std::io::Write;

    use super::*;
    use crate::container::testing::write_member;
    use crate::coords::Coord;

    /// Writes a container of `payloads` and pairs it with one sidecar tuple
    /// per payload.
    fn fixture(
        dir: &tempfile::TempDir,
        payloads: &[&[u8]],
        tuples: &[TrueGenomicInterval],
        num_chromosomes: usize,
    ) -> InputBuffer {
        let mut file = Vec::new();
        for p in payloads {
            write_member(&mut file, p);
        }
        let path = dir.path().join("stream.test.lz");
        let mut f = File::create(&path).unwrap();
        f.write_all(&file).unwrap();
        drop(f);
        InputBuffer::open(&path, tuples, num_chromosomes).unwrap()
    }

    fn tuple(
        start: (i32, i32),
        end: (i32, i32),
        num_alignments: u64,
        is_aligned: bool,
    ) -> TrueGenomicInterval {
        TrueGenomicInterval {
            start: Coord::new(start.0, start.1),
            end: Coord::new(end.0, end.1),
            num_alignments,
            is_aligned,
        }
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = InputBuffer::open(&dir.path().join("absent.lz"), &[], 1).unwrap_err();
        assert!(matches!(err, Error::MissingComponent(_)));
    }

    #[test]
    fn test_query_serves_bytes_across_blocks() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(
            &dir,
            &[b"aaaa", b"bbbb"],
            &[tuple((0, 100), (0, 199), 0, true), tuple((0, 199), (0, 300), 4, false)],
            1,
        );

        let loaded = buf
            .load_overlapping_block(0, 100, 250, None)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.start, 100);
        assert_eq!(loaded.num_alignments, 0);
        assert!(loaded.is_transcript_start);

        // first block decoded eagerly, second on demand
        let got = buf.get_next_n_bytes(6).unwrap();
        assert_eq!(got, b"aaaabb");
        assert!(buf.has_more_bytes());
        assert_eq!(buf.get_next_byte().unwrap(), b'b');
        assert_eq!(buf.get_next_byte().unwrap(), b'b');
        assert!(!buf.has_more_bytes());
        assert!(matches!(
            buf.get_next_byte().unwrap_err(),
            Error::Stream(StreamError::UnexpectedEndOfStream(_))
        ));
    }

    #[test]
    fn test_query_clamps_to_first_available() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(
            &dir,
            &[b"xyzw"],
            &[tuple((0, 5000), (0, 9000), 0, true)],
            1,
        );

        // the clamp pulls the effective start up to 5000
        let loaded = buf.load_overlapping_block(0, 0, 6000, None).unwrap().unwrap();
        assert_eq!(loaded.start, 5000);
        assert!(loaded.is_transcript_start);

        // a window ending before the first available coordinate holds no data
        assert!(buf.load_overlapping_block(0, 0, 100, None).unwrap().is_none());
    }

    #[test]
    fn test_query_unclamped_not_transcript_start() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(
            &dir,
            &[b"xyzw", b"qrst"],
            &[tuple((0, 0), (0, 99), 0, true), tuple((0, 99), (0, 200), 4, false)],
            1,
        );

        let loaded = buf.load_overlapping_block(0, 150, 180, None).unwrap().unwrap();
        assert_eq!(loaded.start, 99);
        assert!(!loaded.is_transcript_start);
    }

    #[test]
    fn test_query_empty_region() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(&dir, &[b"data"], &[tuple((0, 0), (0, 99), 0, true)], 2);

        assert!(buf.load_overlapping_block(1, 0, 100, None).unwrap().is_none());
        assert!(!buf.has_more_bytes());
    }

    #[test]
    fn test_full_scan_dedups_boundary_fragments() {
        let dir = tempfile::TempDir::new().unwrap();
        // middle block spans chromosomes 0 and 1, so its fragments land in
        // both trees backed by the same member
        let mut buf = fixture(
            &dir,
            &[b"aa", b"bb", b"cc"],
            &[
                tuple((0, 0), (0, 999), 0, true),
                tuple((0, 999), (1, 50), 2, false),
                tuple((1, 50), (1, 400), 4, false),
            ],
            2,
        );

        let loaded = buf
            .load_overlapping_block(ALL_CHROMOSOMES, 0, 0, None)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.start, 0);
        // three distinct members only, despite four tree entries
        let drained = buf.get_next_n_bytes(6).unwrap();
        assert_eq!(drained, b"aabbcc");
        assert!(!buf.has_more_bytes());
    }

    #[test]
    fn test_transcript_crossing_flag_fires_mid_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(
            &dir,
            &[b"aa", b"bb"],
            &[
                tuple((0, 0), (0, 999), 0, true),
                tuple((1, 0), (1, 500), 2, true),
            ],
            2,
        );

        buf.load_overlapping_block(ALL_CHROMOSOMES, 0, 0, None)
            .unwrap()
            .unwrap();
        // head block decode never reports a crossing
        assert!(buf.take_transcript_start().is_none());
        buf.get_next_n_bytes(2).unwrap();
        assert_eq!(buf.current_chromosome(), Some(0));

        // pulling into the second block crosses a transcript boundary
        buf.get_next_byte().unwrap();
        assert_eq!(buf.take_transcript_start(), Some(0));
        assert!(buf.take_transcript_start().is_none());
        assert_eq!(buf.current_chromosome(), Some(1));
    }

    #[test]
    fn test_at_num_alignments_strict_less_than() {
        let dir = tempfile::TempDir::new().unwrap();
        let tuples = [
            tuple((0, 0), (0, 99), 0, true),
            tuple((0, 99), (0, 199), 10, false),
            tuple((0, 199), (0, 299), 20, false),
        ];
        let mut buf = fixture(&dir, &[b"aa", b"bb", b"cc"], &tuples, 1);

        // k = 10 chooses the block with num_alignments = 0, not 10
        let loaded = buf
            .load_overlapping_block(0, 0, 0, Some(10))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.num_alignments, 0);

        let loaded = buf
            .load_overlapping_block(0, 0, 0, Some(11))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.num_alignments, 10);

        // beyond every block: the last block still qualifies
        let loaded = buf
            .load_overlapping_block(0, 0, 0, Some(1_000))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.num_alignments, 20);

        // only the chosen block is decoded; the queue stays empty
        assert_eq!(buf.get_next_n_bytes(2).unwrap(), b"cc");
        assert!(!buf.has_more_bytes());
    }

    #[test]
    fn test_at_num_alignments_no_such_point() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(&dir, &[b"aa"], &[tuple((0, 0), (0, 99), 5, true)], 1);

        let err = buf.load_overlapping_block(0, 0, 0, Some(0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Index(IndexError::NoSuchAlignmentPoint(0))
        ));
    }

    #[test]
    fn test_reload_discards_session_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(
            &dir,
            &[b"aaaa", b"bbbb"],
            &[tuple((0, 0), (0, 99), 0, true), tuple((0, 99), (0, 200), 4, false)],
            1,
        );

        buf.load_overlapping_block(0, 0, 200, None).unwrap().unwrap();
        buf.get_next_byte().unwrap();

        // a fresh load restarts from the head block
        buf.load_overlapping_block(0, 0, 200, None).unwrap().unwrap();
        assert_eq!(buf.get_next_n_bytes(4).unwrap(), b"aaaa");
    }

    #[test]
    fn test_varint_round_trip() {
        let mut payload = Vec::new();
        for value in [0u64, 1, 127, 128, 300, 1 << 20, u64::from(u32::MAX)] {
            let mut v = value;
            loop {
                let mut byte = (v & 0x7F) as u8;
                v >>= 7;
                if v != 0 {
                    byte |= 0x80;
                }
                payload.push(byte);
                if v == 0 {
                    break;
                }
            }
        }
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = fixture(
            &dir,
            &[payload.as_slice()],
            &[tuple((0, 0), (0, 99), 0, true)],
            1,
        );
        buf.load_overlapping_block(0, 0, 99, None).unwrap().unwrap();
        for expected in [0u64, 1, 127, 128, 300, 1 << 20, u64::from(u32::MAX)] {
            assert_eq!(buf.read_varint().unwrap(), expected);
        }
    }
}
