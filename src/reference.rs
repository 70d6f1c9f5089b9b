//! Reference base lookup consumed by the stitcher.
//!
//! The core only depends on the [`ReferenceSource`] trait; loading an actual
//! FASTA file is the caller's concern. [`InMemoryReference`] is the obvious
//! implementation for references that fit in memory.

use std::path::Path;

use needletail::parse_fastx_file;

use crate::{coords::ChromoId, error::Result, head::ArchiveHeader, Error};

/// Supplies reference windows for sequence reconstruction.
pub trait ReferenceSource {
    /// Returns `len` reference bases starting at `(chromosome, start)`.
    /// Positions beyond the stored sequence read as `N`.
    fn window(&self, chromosome: ChromoId, start: i32, len: usize) -> Result<Vec<u8>>;
}

/// Reference sequences held in memory, indexed by chromosome id in transcript
/// table order.
#[derive(Debug, Default)]
pub struct InMemoryReference {
    seqs: Vec<Vec<u8>>,
}

impl InMemoryReference {
    #[must_use]
    pub fn new(seqs: Vec<Vec<u8>>) -> Self {
        Self { seqs }
    }

    /// Loads a FASTA file and orders its sequences by the header's transcript
    /// table. Transcripts absent from the FASTA read as all-`N`.
    pub fn from_fasta(path: &Path, header: &ArchiveHeader) -> Result<Self> {
        let mut reader = parse_fastx_file(path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to open FASTA {}: {e}",
                path.display()
            )))
        })?;

        let mut by_name: Vec<(String, Vec<u8>)> = Vec::new();
        while let Some(result) = reader.next() {
            let record = result.map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to parse FASTA record: {e}"
                )))
            })?;
            let name = std::str::from_utf8(record.id())
                .unwrap_or("")
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string();
            let mut seq = record.seq().to_vec();
            seq.make_ascii_uppercase();
            by_name.push((name, seq));
        }

        let seqs = header
            .transcripts
            .iter()
            .map(|t| {
                by_name
                    .iter()
                    .find(|(name, _)| *name == t.name)
                    .map(|(_, seq)| seq.clone())
                    .unwrap_or_default()
            })
            .collect();
        Ok(Self { seqs })
    }
}

impl ReferenceSource for InMemoryReference {
    fn window(&self, chromosome: ChromoId, start: i32, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![b'N'; len];
        let Some(seq) = usize::try_from(chromosome).ok().and_then(|i| self.seqs.get(i)) else {
            return Ok(out);
        };
        let Ok(start) = usize::try_from(start) else {
            return Ok(out);
        };
        if start < seq.len() {
            let end = (start + len).min(seq.len());
            out[..end - start].copy_from_slice(&seq[start..end]);
        }
        Ok(out)
    }
}
