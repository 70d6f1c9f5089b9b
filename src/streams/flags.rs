//! Flag/MAPQ/RNEXT triples: three varint codes per record, each an index into
//! the corresponding header remap table. The stream resolves codes to the
//! user-facing values itself.

use crate::{
    buffer::{InputBuffer, LoadedBlock},
    coords::ChromoId,
    error::Result,
    head::RemapTables,
};

/// The remapped triple of one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagsTriple {
    pub flags: u16,
    pub mapq: u8,
    pub rnext: i32,
}

#[derive(Debug)]
pub struct FlagsStream {
    buf: InputBuffer,
    tables: RemapTables,
}

impl FlagsStream {
    #[must_use]
    pub fn new(buf: InputBuffer, tables: RemapTables) -> Self {
        Self { buf, tables }
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

    /// Decodes and remaps the next record's triple.
    pub fn next_flags(&mut self) -> Result<FlagsTriple> {
        let flag_code = self.buf.read_varint()? as u32;
        let mapq_code = self.buf.read_varint()? as u32;
        let rnext_code = self.buf.read_varint()? as u32;
        Ok(FlagsTriple {
            flags: self.tables.remap_flag(flag_code)?,
            mapq: self.tables.remap_mapq(mapq_code)?,
            rnext: self.tables.remap_rnext(rnext_code)?,
        })
    }

    pub fn skip_records(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.buf.read_varint()?;
            self.buf.read_varint()?;
            self.buf.read_varint()?;
        }
        Ok(())
    }
}
