//! Read identifiers: per record a varint length followed by the identifier
//! bytes.

use crate::{
    buffer::{InputBuffer, LoadedBlock},
    coords::ChromoId,
    error::Result,
};

#[derive(Debug)]
pub struct ReadIdStream {
    buf: InputBuffer,
}

impl ReadIdStream {
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

    /// The next record's identifier.
    pub fn next_id(&mut self) -> Result<Vec<u8>> {
        let len = self.buf.read_varint()? as usize;
        self.buf.get_next_n_bytes(len)
    }

    pub fn skip_records(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.next_id()?;
        }
        Ok(())
    }
}
