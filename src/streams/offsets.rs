//! Reference-relative position deltas.
//!
//! Per record the stream carries one varint `v`. `v >= 1` encodes the delta
//! `v - 1` from the previous record's position (from the block's start offset
//! for the first record served after a random-access entry). `v == 0` opens a
//! transcript marker: two further varints carry the new chromosome and the
//! record's absolute position, resetting the accumulator. Every
//! transcript-aligned block begins with such a marker.

use crate::{
    buffer::{InputBuffer, LoadedBlock},
    coords::ChromoId,
    error::Result,
};

/// One step of the offsets stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffsetStep {
    /// Position delta from the previous record
    Delta(u32),
    /// The record opens a new transcript at an absolute position
    NewTranscript { chromosome: ChromoId, position: i32 },
}

#[derive(Debug)]
pub struct OffsetsStream {
    buf: InputBuffer,
}

impl OffsetsStream {
    #[must_use]
    pub fn new(buf: InputBuffer) -> Self {
        Self { buf }
    }

    pub fn load(
        &mut self,
        chromo: ChromoId,
        start: i32,
        end: i32,
        at_num_alignments: Option<u64>,
    ) -> Result<Option<LoadedBlock>> {
        self.buf
            .load_overlapping_block(chromo, start, end, at_num_alignments)
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.buf.has_more_bytes()
    }

    /// Decodes the next step of the stream.
    pub fn next_step(&mut self) -> Result<OffsetStep> {
        let v = self.buf.read_varint()?;
        if v == 0 {
            let chromosome = self.buf.read_varint()? as ChromoId;
            let position = self.buf.read_varint()? as i32;
            return Ok(OffsetStep::NewTranscript {
                chromosome,
                position,
            });
        }
        Ok(OffsetStep::Delta((v - 1) as u32))
    }

    /// Reports (and clears) a transcript boundary crossed by a mid-session
    /// block decode.
    pub fn take_transcript_start(&mut self) -> Option<i32> {
        self.buf.take_transcript_start()
    }

    /// Chromosome of the block currently being served.
    #[must_use]
    pub fn current_chromosome(&self) -> Option<ChromoId> {
        self.buf.current_chromosome()
    }

    /// Where the current member's byte content begins. This is the correct
    /// seed for the position accumulator: for a fragment of a block spanning
    /// chromosome boundaries it names the span's true start.
    #[must_use]
    pub fn current_origin(&self) -> Option<(ChromoId, i32)> {
        self.buf.current_origin()
    }
}
