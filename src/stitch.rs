//! Record stitching: consumes the typed streams in lock-step and reassembles
//! aligned records across a requested interval.

use bitflags::bitflags;
use tracing::debug;

use crate::{
    coords::{GenomicInterval, ALL_CHROMOSOMES, CHROMO_MAX, CHROMO_MIN},
    error::{Result, StreamError},
    head::ArchiveHeader,
    record::{AlignmentRecord, RecordSink, SinkFlow},
    reference::ReferenceSource,
    streams::{EditOp, InputStreams, OffsetStep},
};

bitflags! {
    /// Which record fields a session materializes. Unselected fields are
    /// still decoded past, keeping every stream in lock-step, but are not
    /// emitted.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DecodeOptions: u8 {
        const SEQ = 1 << 0;
        const FLAGS = 1 << 1;
        const READ_IDS = 1 << 2;
        const OPTIONAL_FIELDS = 1 << 3;
        const QUALITIES = 1 << 4;
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::SEQ | Self::FLAGS | Self::READ_IDS | Self::OPTIONAL_FIELDS
    }
}

/// Orchestrates decompression sessions over one archive.
pub struct Decompressor<'r> {
    header: ArchiveHeader,
    reference: Option<&'r dyn ReferenceSource>,
}

impl<'r> Decompressor<'r> {
    #[must_use]
    pub fn new(header: ArchiveHeader, reference: Option<&'r dyn ReferenceSource>) -> Self {
        Self { header, reference }
    }

    #[must_use]
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Emits every record in the archive.
    pub fn decompress(
        &self,
        streams: &mut InputStreams,
        options: DecodeOptions,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        self.run(None, None, streams, options, sink)
    }

    /// Emits exactly the records whose `(chromosome, position)` falls in the
    /// half-open `interval`.
    pub fn decompress_interval(
        &self,
        interval: GenomicInterval,
        streams: &mut InputStreams,
        options: DecodeOptions,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        self.run(Some(interval), None, streams, options, sink)
    }

    /// Resumes decompression so the first emitted record is the `(k+1)`-th
    /// alignment of the archive.
    pub fn decompress_from_alignment(
        &self,
        k: u64,
        streams: &mut InputStreams,
        options: DecodeOptions,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        self.run(None, Some(k), streams, options, sink)
    }

    fn run(
        &self,
        interval: Option<GenomicInterval>,
        at_num_alignments: Option<u64>,
        streams: &mut InputStreams,
        options: DecodeOptions,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let (chromo, start, end) = match interval {
            Some(iv) => (iv.chromosome, iv.start, iv.end),
            None => (ALL_CHROMOSOMES, CHROMO_MIN, CHROMO_MAX),
        };
        let Some(session) = streams.load_all(chromo, start, end, at_num_alignments)? else {
            debug!(chromo, start, end, "queried region holds no data");
            return Ok(());
        };

        // the accumulator seeds at the first member's true span start; the
        // transcript-start flag only confirms it sits on a safe resync point
        let (mut chromosome, mut position) = streams
            .offsets
            .current_origin()
            .map_or((chromo.max(0), i64::from(session.first_block.start)), |(c, p)| {
                (c, i64::from(p))
            });
        debug!(
            chromosome,
            position,
            is_transcript_start = session.is_transcript_start,
            "session start"
        );

        if let Some(k) = at_num_alignments {
            let skip = k.saturating_sub(session.first_block.num_alignments);
            for _ in 0..skip {
                if !streams.all_have_more() {
                    return Ok(());
                }
                match streams.offsets.next_step()? {
                    OffsetStep::Delta(delta) => position += i64::from(delta),
                    OffsetStep::NewTranscript {
                        chromosome: c,
                        position: p,
                    } => {
                        chromosome = c;
                        position = i64::from(p);
                    }
                }
                streams.skip_records_except_offsets(1)?;
            }
        }

        while streams.all_have_more() {
            // a block boundary on a transcript start is the only safe place
            // to resynchronize the accumulator
            if let Some(ts) = streams.offsets.take_transcript_start() {
                position = i64::from(ts);
            }
            match streams.offsets.next_step()? {
                OffsetStep::Delta(delta) => position += i64::from(delta),
                OffsetStep::NewTranscript {
                    chromosome: c,
                    position: p,
                } => {
                    chromosome = c;
                    position = i64::from(p);
                }
            }

            let edits = if streams.edits.next_has_edits()? {
                streams.edits.next_script()?
            } else {
                Vec::new()
            };
            let left = streams.left_clips.next_clip()?;
            let right = streams.right_clips.next_clip()?;
            let triple = streams.flags.next_flags()?;
            let read_id = streams.read_ids.next_id()?;
            let group = streams.membership.next_group()?;

            // validates the edit script even when no field needs it
            let cigar = cigar_string(left.len(), right.len(), self.header.read_len, &edits)?;

            if let Some(iv) = interval {
                if chromosome > iv.chromosome {
                    break;
                }
                if chromosome < iv.chromosome {
                    continue;
                }
                if position >= i64::from(iv.end) {
                    break;
                }
                if position < i64::from(iv.start) {
                    continue;
                }
            }

            let sequence = match self.reference {
                Some(reference) if options.contains(DecodeOptions::SEQ) => {
                    let window =
                        reference.window(chromosome, position as i32, self.header.read_len)?;
                    let mut seq = apply_edits(window, &edits)?;
                    let mut full = Vec::with_capacity(left.len() + seq.len() + right.len());
                    full.extend_from_slice(&left);
                    full.append(&mut seq);
                    full.extend_from_slice(&right);
                    Some(full)
                }
                _ => None,
            };

            let record = AlignmentRecord {
                chromosome,
                position: position as i32,
                flags: options.contains(DecodeOptions::FLAGS).then_some(triple),
                read_id: options
                    .contains(DecodeOptions::READ_IDS)
                    .then_some(read_id),
                cigar,
                sequence,
                quality_group: options
                    .contains(DecodeOptions::OPTIONAL_FIELDS)
                    .then_some(group),
            };
            if sink.emit(&record)? == SinkFlow::Stop {
                debug!("sink requested stop");
                break;
            }
        }
        Ok(())
    }
}

/// Applies an edit script to a reference window, yielding the read's middle
/// section. Substitutions change a base, insertions lengthen, deletions
/// shorten; every op must land inside the evolving read.
fn apply_edits(window: Vec<u8>, edits: &[EditOp]) -> Result<Vec<u8>> {
    let mut seq = window;
    for op in edits {
        let pos = op.pos() as usize;
        if pos >= seq.len() {
            return Err(StreamError::MalformedEditScript {
                pos: op.pos(),
                len: seq.len(),
            }
            .into());
        }
        match op {
            EditOp::Sub { base, .. } => seq[pos] = *base,
            EditOp::Ins { base, .. } => seq.insert(pos, *base),
            EditOp::Del { .. } => {
                seq.remove(pos);
            }
        }
    }
    Ok(seq)
}

/// Derives the CIGAR-like text for one record: leading clip as `S`, matched
/// stretches as `M` split by `I`/`D` runs, trailing clip as `S`. Also
/// validates op ordering and bounds against the evolving read length.
fn cigar_string(left: usize, right: usize, read_len: usize, edits: &[EditOp]) -> Result<String> {
    let mut segments: Vec<(usize, char)> = Vec::new();
    let mut push = |segments: &mut Vec<(usize, char)>, n: usize, kind: char| {
        if n == 0 {
            return;
        }
        match segments.last_mut() {
            Some(last) if last.1 == kind => last.0 += n,
            _ => segments.push((n, kind)),
        }
    };

    let mut cur_len = read_len;
    let mut cursor = 0usize;
    for op in edits {
        let pos = op.pos() as usize;
        let in_order = match op {
            EditOp::Sub { .. } => true,
            EditOp::Ins { .. } | EditOp::Del { .. } => pos >= cursor,
        };
        if pos >= cur_len || !in_order {
            return Err(StreamError::MalformedEditScript {
                pos: op.pos(),
                len: cur_len,
            }
            .into());
        }
        match op {
            EditOp::Sub { .. } => {}
            EditOp::Ins { .. } => {
                push(&mut segments, pos - cursor, 'M');
                push(&mut segments, 1, 'I');
                cursor = pos + 1;
                cur_len += 1;
            }
            EditOp::Del { .. } => {
                push(&mut segments, pos - cursor, 'M');
                push(&mut segments, 1, 'D');
                cursor = pos;
                cur_len -= 1;
            }
        }
    }
    push(&mut segments, cur_len - cursor, 'M');

    let mut out = String::new();
    if left > 0 {
        out.push_str(&format!("{left}S"));
    }
    for (n, kind) in segments {
        out.push_str(&format!("{n}{kind}"));
    }
    if right > 0 {
        out.push_str(&format!("{right}S"));
    }
    Ok(out)
}
