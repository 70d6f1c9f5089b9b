//! Edit presence bits and edit scripts.
//!
//! `.has_edits.lz` carries one byte per record (0 or 1). For records flagged
//! 1, `.edits.lz` carries a varint op count followed by the ops: an opcode
//! byte (0 substitution, 1 insertion, 2 deletion), a varint position within
//! the read, and for substitutions and insertions one base byte. Ops are
//! position-sorted; bounds are validated against the evolving read when the
//! script is applied.

use crate::{
    buffer::{InputBuffer, LoadedBlock},
    coords::ChromoId,
    error::{Result, StreamError},
};

/// One operation of an edit script, relative to the reference window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOp {
    /// Replace the base at `pos`
    Sub { pos: u32, base: u8 },
    /// Insert `base` before `pos`, lengthening the read
    Ins { pos: u32, base: u8 },
    /// Remove the base at `pos`, shortening the read
    Del { pos: u32 },
}

impl EditOp {
    /// Position the op applies at.
    #[must_use]
    pub fn pos(&self) -> u32 {
        match self {
            Self::Sub { pos, .. } | Self::Ins { pos, .. } | Self::Del { pos } => *pos,
        }
    }
}

const OP_SUB: u8 = 0;
const OP_INS: u8 = 1;
const OP_DEL: u8 = 2;

/// Decoder over the split edit presence / edit payload containers.
#[derive(Debug)]
pub struct EditsStream {
    edits: InputBuffer,
    has_edits: InputBuffer,
}

impl EditsStream {
    #[must_use]
    pub fn new(edits: InputBuffer, has_edits: InputBuffer) -> Self {
        Self { edits, has_edits }
    }

    /// Loads both buffers for the query. The per-record presence stream
    /// decides whether the region holds data; a region whose records carry no
    /// edits legitimately has nothing in the payload container.
    pub fn load(
        &mut self,
        chromo: ChromoId,
        start: i32,
        end: i32,
        at_num_alignments: Option<u64>,
    ) -> Result<Option<LoadedBlock>> {
        let _ = self
            .edits
            .load_overlapping_block(chromo, start, end, at_num_alignments)
            .or_else(|err| match err {
                // a payload container may hold no block before alignment k
                // when every earlier record is edit-free
                crate::Error::Index(crate::error::IndexError::NoSuchAlignmentPoint(_)) => Ok(None),
                other => Err(other),
            })?;
        self.has_edits
            .load_overlapping_block(chromo, start, end, at_num_alignments)
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_edits.has_more_bytes()
    }

    /// Presence bit of the next record.
    pub fn next_has_edits(&mut self) -> Result<bool> {
        match self.has_edits.get_next_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StreamError::InvalidHasEditsByte(other).into()),
        }
    }

    /// The next record's edit script. Only valid after [`Self::next_has_edits`]
    /// returned true.
    pub fn next_script(&mut self) -> Result<Vec<EditOp>> {
        let count = self.edits.read_varint()? as usize;
        let mut ops = Vec::with_capacity(count);
        for _ in 0..count {
            let opcode = self.edits.get_next_byte()?;
            let pos = self.edits.read_varint()? as u32;
            let op = match opcode {
                OP_SUB => EditOp::Sub {
                    pos,
                    base: self.edits.get_next_byte()?,
                },
                OP_INS => EditOp::Ins {
                    pos,
                    base: self.edits.get_next_byte()?,
                },
                OP_DEL => EditOp::Del { pos },
                other => return Err(StreamError::UnknownEditOpcode(other).into()),
            };
            ops.push(op);
        }
        Ok(ops)
    }

    /// Consumes `n` records' worth of presence bits and scripts.
    pub fn skip_records(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            if self.next_has_edits()? {
                self.next_script()?;
            }
        }
        Ok(())
    }
}
