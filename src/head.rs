//! The `.head` sidecar: transcript table, read length, and the reversible
//! encodings for flags, MAPQ and RNEXT.
//!
//! Line-oriented text. `read_len <n>` fixes the read length, each
//! `transcript <name> <length>` line appends to the transcript table (the
//! transcript id is the line order), and `flag`/`mapq`/`rnext` lines record
//! one `<original> <code>` pair of the corresponding remap table.

use std::fs;
use std::io;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::{
    coords::ChromoId,
    error::{HeaderError, Result},
    Error,
};

/// One named reference sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    pub name: String,
    pub length: u64,
}

/// The bijective small-integer encodings for flags, MAPQ and RNEXT.
///
/// The flags stream holds its own copy of these tables; the header keeps the
/// originals.
#[derive(Clone, Debug, Default)]
pub struct RemapTables {
    flag: FxHashMap<u32, u16>,
    mapq: FxHashMap<u32, u8>,
    rnext: FxHashMap<u32, i32>,
}

impl RemapTables {
    /// Maps an on-disk flag code back to the user-facing flag value.
    pub fn remap_flag(&self, code: u32) -> Result<u16> {
        self.flag
            .get(&code)
            .copied()
            .ok_or_else(|| HeaderError::UnknownCode { table: "flag", code }.into())
    }

    pub fn remap_mapq(&self, code: u32) -> Result<u8> {
        self.mapq
            .get(&code)
            .copied()
            .ok_or_else(|| HeaderError::UnknownCode { table: "mapq", code }.into())
    }

    pub fn remap_rnext(&self, code: u32) -> Result<i32> {
        self.rnext
            .get(&code)
            .copied()
            .ok_or_else(|| HeaderError::UnknownCode { table: "rnext", code }.into())
    }

    /// Inverse flag lookup, original value to on-disk code.
    #[must_use]
    pub fn encode_flag(&self, original: u16) -> Option<u32> {
        self.flag.iter().find(|(_, v)| **v == original).map(|(k, _)| *k)
    }

    /// Inverse MAPQ lookup.
    #[must_use]
    pub fn encode_mapq(&self, original: u8) -> Option<u32> {
        self.mapq.iter().find(|(_, v)| **v == original).map(|(k, _)| *k)
    }

    /// Inverse RNEXT lookup.
    #[must_use]
    pub fn encode_rnext(&self, original: i32) -> Option<u32> {
        self.rnext.iter().find(|(_, v)| **v == original).map(|(k, _)| *k)
    }
}

/// The parsed archive header.
#[derive(Clone, Debug, Default)]
pub struct ArchiveHeader {
    pub transcripts: Vec<Transcript>,
    pub read_len: usize,
    tables: RemapTables,
}

impl ArchiveHeader {
    /// Loads and parses `<base>.head`. A missing file is a missing archive
    /// component, not an I/O error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::MissingComponent(path.to_path_buf())
            } else {
                e.into()
            }
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut header = Self::default();
        let mut saw_read_len = false;

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(keyword) = fields.next() else {
                continue;
            };
            let malformed = || -> Error {
                HeaderError::MalformedLine {
                    line: idx + 1,
                    keyword: keyword.to_string(),
                }
                .into()
            };

            match keyword {
                "read_len" => {
                    header.read_len = fields
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(malformed)?;
                    saw_read_len = true;
                }
                "transcript" => {
                    let name = fields.next().ok_or_else(malformed)?;
                    let length: u64 = fields
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(malformed)?;
                    header.transcripts.push(Transcript {
                        name: name.to_string(),
                        length,
                    });
                }
                "flag" => {
                    let (original, code) = parse_pair(&mut fields).ok_or_else(malformed)?;
                    let original = u16::try_from(original).map_err(|_| malformed())?;
                    insert_unique(&mut header.tables.flag, code, original, "flag")?;
                }
                "mapq" => {
                    let (original, code) = parse_pair(&mut fields).ok_or_else(malformed)?;
                    let original = u8::try_from(original).map_err(|_| malformed())?;
                    insert_unique(&mut header.tables.mapq, code, original, "mapq")?;
                }
                "rnext" => {
                    let (original, code) = parse_pair(&mut fields).ok_or_else(malformed)?;
                    insert_unique(&mut header.tables.rnext, code, original, "rnext")?;
                }
                other => {
                    return Err(HeaderError::UnknownKeyword {
                        line: idx + 1,
                        keyword: other.to_string(),
                    }
                    .into())
                }
            }
            if fields.next().is_some() {
                return Err(malformed());
            }
        }

        if !saw_read_len || header.read_len == 0 {
            return Err(HeaderError::MissingReadLen.into());
        }
        if header.transcripts.is_empty() {
            return Err(HeaderError::EmptyTranscriptTable.into());
        }
        Ok(header)
    }

    /// Resolves a chromosome id to its transcript name.
    #[must_use]
    pub fn transcript_name(&self, chromosome: ChromoId) -> Option<&str> {
        usize::try_from(chromosome)
            .ok()
            .and_then(|i| self.transcripts.get(i))
            .map(|t| t.name.as_str())
    }

    /// The flag/MAPQ/RNEXT remap tables.
    #[must_use]
    pub fn tables(&self) -> &RemapTables {
        &self.tables
    }
}

fn parse_pair<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Option<(i32, u32)> {
    let original: i32 = fields.next()?.parse().ok()?;
    let code: u32 = fields.next()?.parse().ok()?;
    Some((original, code))
}

fn insert_unique<V>(
    map: &mut FxHashMap<u32, V>,
    code: u32,
    value: V,
    table: &'static str,
) -> Result<()> {
    if map.insert(code, value).is_some() {
        return Err(HeaderError::DuplicateCode { table, code }.into());
    }
    Ok(())
}

#[cfg(test)]
mod testing {
    use super::*;

    const GOOD: &str = "\
read_len 100
transcript chr1 248956422
transcript chr2 242193529
flag 0 0
flag 16 1
flag 99 2
mapq 60 0
mapq 0 1
rnext -1 0
rnext 0 1
rnext 1 2
";

    #[test]
    fn test_parse_header() {
        let header = ArchiveHeader::parse(GOOD).unwrap();
        assert_eq!(header.read_len, 100);
        assert_eq!(header.transcripts.len(), 2);
        assert_eq!(header.transcript_name(1), Some("chr2"));
        assert_eq!(header.transcript_name(5), None);
        assert_eq!(header.transcript_name(-1), None);

        assert_eq!(header.tables().remap_flag(2).unwrap(), 99);
        assert_eq!(header.tables().remap_mapq(0).unwrap(), 60);
        assert_eq!(header.tables().remap_rnext(0).unwrap(), -1);
    }

    #[test]
    fn test_remap_round_trip() {
        let header = ArchiveHeader::parse(GOOD).unwrap();
        for code in 0..3u32 {
            let original = header.tables().remap_flag(code).unwrap();
            assert_eq!(header.tables().encode_flag(original), Some(code));
        }
    }

    #[test]
    fn test_unknown_code() {
        let header = ArchiveHeader::parse(GOOD).unwrap();
        assert!(matches!(
            header.tables().remap_flag(9).unwrap_err(),
            Error::Header(HeaderError::UnknownCode { table: "flag", code: 9 })
        ));
    }

    #[test]
    fn test_missing_read_len() {
        let err = ArchiveHeader::parse("transcript chr1 100\n").unwrap_err();
        assert!(matches!(err, Error::Header(HeaderError::MissingReadLen)));
    }

    #[test]
    fn test_empty_transcript_table() {
        let err = ArchiveHeader::parse("read_len 100\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Header(HeaderError::EmptyTranscriptTable)
        ));
    }

    #[test]
    fn test_unknown_keyword() {
        let err = ArchiveHeader::parse("read_len 100\nbogus 1 2\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Header(HeaderError::UnknownKeyword { line: 2, .. })
        ));
    }

    #[test]
    fn test_duplicate_code() {
        let text = "read_len 100\ntranscript chr1 10\nflag 0 0\nflag 16 0\n";
        let err = ArchiveHeader::parse(text).unwrap_err();
        assert!(matches!(
            err,
            Error::Header(HeaderError::DuplicateCode { table: "flag", code: 0 })
        ));
    }

    #[test]
    fn test_malformed_line() {
        let err = ArchiveHeader::parse("read_len 100\ntranscript chr1\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Header(HeaderError::MalformedLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_negative_flag_rejected() {
        let err = ArchiveHeader::parse("read_len 100\ntranscript chr1 10\nflag -4 0\n");
        assert!(err.is_err());
    }
}
