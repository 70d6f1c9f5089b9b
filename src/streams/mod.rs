//! Typed decoders over the per-stream input buffers.
//!
//! Each stream is a thin adaptor interpreting one buffer's byte cursor as a
//! record field sequence. The edits stream holds two buffers because edit
//! presence and edit payloads travel in separate containers. All streams of
//! one session are loaded with the same query so the stitcher can consume
//! them in lock-step.

mod clips;
mod edits;
mod flags;
mod membership;
mod offsets;
mod read_id;

pub use clips::ClipStream;
pub use edits::{EditOp, EditsStream};
pub use flags::{FlagsStream, FlagsTriple};
pub use membership::MembershipStream;
pub use offsets::{OffsetStep, OffsetsStream};
pub use read_id::ReadIdStream;

use std::path::Path;

use crate::{
    buffer::{InputBuffer, LoadedBlock},
    coords::ChromoId,
    error::{IndexError, Result},
    head::ArchiveHeader,
    index::IntervalSidecar,
};

/// Stream file suffixes relative to the archive base path.
pub const SUFFIX_OFFS: &str = ".offs.lz";
pub const SUFFIX_EDITS: &str = ".edits.lz";
pub const SUFFIX_HAS_EDITS: &str = ".has_edits.lz";
pub const SUFFIX_LEFT_CLIP: &str = ".left_clip.lz";
pub const SUFFIX_RIGHT_CLIP: &str = ".right_clip.lz";
pub const SUFFIX_FLAGS: &str = ".flags.lz";
pub const SUFFIX_IDS: &str = ".ids.lz";
pub const SUFFIX_MEMBERSHIP: &str = ".membership.lz";

/// The full set of typed streams participating in a decompression session.
#[derive(Debug)]
pub struct InputStreams {
    pub offsets: OffsetsStream,
    pub edits: EditsStream,
    pub left_clips: ClipStream,
    pub right_clips: ClipStream,
    pub flags: FlagsStream,
    pub read_ids: ReadIdStream,
    pub membership: MembershipStream,
}

impl InputStreams {
    /// Opens every stream of the archive rooted at `base`, wiring each buffer
    /// to its sidecar tuples.
    pub fn open(base: &Path, sidecar: &IntervalSidecar, header: &ArchiveHeader) -> Result<Self> {
        let open_buffer = |suffix: &str| -> Result<InputBuffer> {
            let intervals = sidecar
                .get(suffix)
                .ok_or_else(|| IndexError::MissingSuffix(suffix.to_string()))?;
            let mut path = base.as_os_str().to_owned();
            path.push(suffix);
            InputBuffer::open(Path::new(&path), intervals, header.transcripts.len())
        };

        Ok(Self {
            offsets: OffsetsStream::new(open_buffer(SUFFIX_OFFS)?),
            edits: EditsStream::new(open_buffer(SUFFIX_EDITS)?, open_buffer(SUFFIX_HAS_EDITS)?),
            left_clips: ClipStream::new(open_buffer(SUFFIX_LEFT_CLIP)?),
            right_clips: ClipStream::new(open_buffer(SUFFIX_RIGHT_CLIP)?),
            flags: FlagsStream::new(open_buffer(SUFFIX_FLAGS)?, header.tables().clone()),
            read_ids: ReadIdStream::new(open_buffer(SUFFIX_IDS)?),
            membership: MembershipStream::new(open_buffer(SUFFIX_MEMBERSHIP)?),
        })
    }

    /// Loads every stream for one query. Returns `None` (and zero records for
    /// the session) when any participating stream has no data in the region.
    pub fn load_all(
        &mut self,
        chromo: ChromoId,
        start: i32,
        end: i32,
        at_num_alignments: Option<u64>,
    ) -> Result<Option<SessionStart>> {
        let Some(offsets) = self.offsets.load(chromo, start, end, at_num_alignments)? else {
            return Ok(None);
        };
        let loads = [
            self.edits.load(chromo, start, end, at_num_alignments)?,
            self.left_clips.load(chromo, start, end, at_num_alignments)?,
            self.right_clips.load(chromo, start, end, at_num_alignments)?,
            self.flags.load(chromo, start, end, at_num_alignments)?,
            self.read_ids.load(chromo, start, end, at_num_alignments)?,
            self.membership.load(chromo, start, end, at_num_alignments)?,
        ];
        if loads.iter().any(Option::is_none) {
            return Ok(None);
        }
        let is_transcript_start = offsets.is_transcript_start
            || loads.iter().flatten().any(|l| l.is_transcript_start);
        Ok(Some(SessionStart {
            first_block: offsets,
            is_transcript_start,
        }))
    }

    /// True while every stream still has record bytes to serve.
    #[must_use]
    pub fn all_have_more(&self) -> bool {
        self.offsets.has_more()
            && self.edits.has_more()
            && self.left_clips.has_more()
            && self.right_clips.has_more()
            && self.flags.has_more()
            && self.read_ids.has_more()
            && self.membership.has_more()
    }

    /// Skips `n` records on every stream except offsets (the caller walks the
    /// offsets stream itself to maintain its position accumulator).
    pub fn skip_records_except_offsets(&mut self, n: u64) -> Result<()> {
        self.edits.skip_records(n)?;
        self.left_clips.skip_records(n)?;
        self.right_clips.skip_records(n)?;
        self.flags.skip_records(n)?;
        self.read_ids.skip_records(n)?;
        self.membership.skip_records(n)?;
        Ok(())
    }
}

/// What a successful [`InputStreams::load_all`] reports about the session's
/// entry point.
#[derive(Clone, Copy, Debug)]
pub struct SessionStart {
    /// The offsets stream's first block
    pub first_block: LoadedBlock,
    /// True when any stream resumed on a transcript boundary
    pub is_transcript_start: bool,
}
