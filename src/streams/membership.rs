//! Quality-group membership: per record one varint index into the quality
//! group table. The quality bytes themselves live in an auxiliary stream set
//! outside this core; the group index is the observable output.

use crate::{
    buffer::{InputBuffer, LoadedBlock},
    coords::ChromoId,
    error::Result,
};

#[derive(Debug)]
pub struct MembershipStream {
    buf: InputBuffer,
}

impl MembershipStream {
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

    /// The next record's quality-group index.
    pub fn next_group(&mut self) -> Result<u32> {
        Ok(self.buf.read_varint()? as u32)
    }

    pub fn skip_records(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.next_group()?;
        }
        Ok(())
    }
}
