//! Stitched alignment records and the sinks that receive them.

use std::io::Write;

use crate::{
    coords::ChromoId,
    error::Result,
    head::ArchiveHeader,
    streams::FlagsTriple,
};

/// One aligned read's worth of reconstructed fields.
///
/// Fields the session did not materialize stay `None`; the record still went
/// through every stream so the session stays in lock-step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub chromosome: ChromoId,
    /// 0-based reference position
    pub position: i32,
    pub flags: Option<FlagsTriple>,
    pub read_id: Option<Vec<u8>>,
    /// CIGAR-like representation derived from edits and clips
    pub cigar: String,
    pub sequence: Option<Vec<u8>>,
    pub quality_group: Option<u32>,
}

/// Whether the session should keep stitching after an emitted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkFlow {
    Continue,
    Stop,
}

/// Receives stitched records. Returning [`SinkFlow::Stop`] aborts the session
/// after the current record; no further blocks are decoded.
pub trait RecordSink {
    fn emit(&mut self, record: &AlignmentRecord) -> Result<SinkFlow>;
}

/// Collects every record, mainly for tests and small sessions.
impl RecordSink for Vec<AlignmentRecord> {
    fn emit(&mut self, record: &AlignmentRecord) -> Result<SinkFlow> {
        self.push(record.clone());
        Ok(SinkFlow::Continue)
    }
}

/// Renders records in the canonical tab-separated alignment text: read id,
/// flags, transcript name, 1-based position, MAPQ, CIGAR, RNEXT, sequence,
/// optional fields. Unmaterialized fields render as `*` (or `0` for numeric
/// columns).
pub struct SamWriter<'h, W: Write> {
    header: &'h ArchiveHeader,
    writer: W,
}

impl<'h, W: Write> SamWriter<'h, W> {
    pub fn new(header: &'h ArchiveHeader, writer: W) -> Self {
        Self { header, writer }
    }

    /// Unwraps the inner writer, flushing it first.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn rnext_text<'h>(header: &'h ArchiveHeader, record: &AlignmentRecord) -> &'h str {
    match record.flags {
        None => "*",
        Some(triple) if triple.rnext < 0 => "*",
        Some(triple) if triple.rnext == record.chromosome => "=",
        Some(triple) => header.transcript_name(triple.rnext).unwrap_or("*"),
    }
}

impl<W: Write> RecordSink for SamWriter<'_, W> {
    fn emit(&mut self, record: &AlignmentRecord) -> Result<SinkFlow> {
        let chr_name = self.header.transcript_name(record.chromosome).unwrap_or("*");
        let rnext = rnext_text(self.header, record);
        let (flags, mapq) = record
            .flags
            .map_or((0, 0), |triple| (triple.flags, triple.mapq));

        let w = &mut self.writer;
        match &record.read_id {
            Some(id) => w.write_all(id)?,
            None => w.write_all(b"*")?,
        }
        write!(
            w,
            "\t{}\t{}\t{}\t{}\t{}",
            flags,
            chr_name,
            record.position + 1,
            mapq,
            if record.cigar.is_empty() {
                "*"
            } else {
                record.cigar.as_str()
            },
        )?;
        write!(w, "\t{rnext}\t")?;
        match &record.sequence {
            Some(seq) => w.write_all(seq)?,
            None => w.write_all(b"*")?,
        }
        if let Some(group) = record.quality_group {
            write!(w, "\tqg:i:{group}")?;
        }
        writeln!(w)?;
        Ok(SinkFlow::Continue)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::head::ArchiveHeader;

    fn header() -> ArchiveHeader {
        ArchiveHeader::parse(
            "read_len 8\ntranscript chrA 1000\ntranscript chrB 1000\n\
             flag 0 0\nflag 16 1\nmapq 60 0\nrnext -1 0\nrnext 1 1\n",
        )
        .unwrap()
    }

    fn record() -> AlignmentRecord {
        AlignmentRecord {
            chromosome: 0,
            position: 99,
            flags: Some(FlagsTriple {
                flags: 16,
                mapq: 60,
                rnext: 1,
            }),
            read_id: Some(b"read.1".to_vec()),
            cigar: "8M".to_string(),
            sequence: Some(b"ACGTACGT".to_vec()),
            quality_group: Some(3),
        }
    }

    #[test]
    fn test_sam_line() {
        let header = header();
        let mut sink = SamWriter::new(&header, Vec::new());
        sink.emit(&record()).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out, "read.1\t16\tchrA\t100\t60\t8M\tchrB\tACGTACGT\tqg:i:3\n");
    }

    #[test]
    fn test_sam_line_placeholders() {
        let header = header();
        let mut rec = record();
        rec.flags = None;
        rec.read_id = None;
        rec.sequence = None;
        rec.quality_group = None;

        let mut sink = SamWriter::new(&header, Vec::new());
        sink.emit(&rec).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out, "*\t0\tchrA\t100\t0\t8M\t*\t*\n");
    }

    #[test]
    fn test_sam_rnext_self_reference() {
        let header = header();
        let mut rec = record();
        rec.flags = Some(FlagsTriple {
            flags: 0,
            mapq: 60,
            rnext: 0,
        });
        let mut sink = SamWriter::new(&header, Vec::new());
        sink.emit(&rec).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert!(out.contains("\t=\t"));
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<AlignmentRecord> = Vec::new();
        assert_eq!(sink.emit(&record()).unwrap(), SinkFlow::Continue);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].position, 99);
    }
}
