//! Test-only archive writer: builds the eight stream containers, the sidecar
//! coordinates file and the header sidecar that the decompression core reads.
//!
//! Every stream is flushed at the same record boundaries, so one block
//! ordinal owns one sidecar tuple shared by all suffixes.

use std::fs;
use std::path::{Path, PathBuf};

use refz::container::{MemberHeader, MemberTrailer, SIZE_MEMBER_HEADER, SIZE_MEMBER_TRAILER};
use refz::streams::EditOp;

pub const SUFFIXES: [&str; 8] = [
    ".offs.lz",
    ".edits.lz",
    ".has_edits.lz",
    ".left_clip.lz",
    ".right_clip.lz",
    ".flags.lz",
    ".ids.lz",
    ".membership.lz",
];

/// One simulated alignment record.
#[derive(Clone, Debug)]
pub struct SimRecord {
    pub chromosome: i32,
    pub position: i32,
    pub edits: Vec<EditOp>,
    pub left: Vec<u8>,
    pub right: Vec<u8>,
    pub flag_code: u64,
    pub mapq_code: u64,
    pub rnext_code: u64,
    pub id: Vec<u8>,
    pub group: u64,
}

impl SimRecord {
    pub fn at(chromosome: i32, position: i32) -> Self {
        Self {
            chromosome,
            position,
            edits: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            flag_code: 0,
            mapq_code: 0,
            rnext_code: 0,
            id: format!("read.{chromosome}.{position}").into_bytes(),
            group: 0,
        }
    }

    pub fn with_edits(mut self, edits: Vec<EditOp>) -> Self {
        self.edits = edits;
        self
    }

    pub fn with_clips(mut self, left: &[u8], right: &[u8]) -> Self {
        self.left = left.to_vec();
        self.right = right.to_vec();
        self
    }

    pub fn with_codes(mut self, flag: u64, mapq: u64, rnext: u64) -> Self {
        self.flag_code = flag;
        self.mapq_code = mapq;
        self.rnext_code = rnext;
        self
    }

    pub fn with_group(mut self, group: u64) -> Self {
        self.group = group;
        self
    }
}

fn push_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn write_member(out: &mut Vec<u8>, payload: &[u8]) {
    let mut compressed = Vec::new();
    zstd::stream::copy_encode(payload, &mut compressed, 0).unwrap();
    let member_size = (SIZE_MEMBER_HEADER + compressed.len() + SIZE_MEMBER_TRAILER) as u64;
    out.extend_from_slice(MemberHeader::new().as_bytes());
    out.extend_from_slice(&compressed);
    out.extend_from_slice(MemberTrailer::new(payload.len() as u64, member_size).as_bytes());
}

/// A header sidecar with three flag codes (0, 16, 99), two MAPQ codes
/// (60, 0) and three RNEXT codes (-1, 0, 1).
pub fn default_header(transcripts: &[(&str, u64)], read_len: usize) -> String {
    let mut out = format!("read_len {read_len}\n");
    for (name, length) in transcripts {
        out.push_str(&format!("transcript {name} {length}\n"));
    }
    out.push_str("flag 0 0\nflag 16 1\nflag 99 2\n");
    out.push_str("mapq 60 0\nmapq 0 1\n");
    out.push_str("rnext -1 0\nrnext 0 1\nrnext 1 2\n");
    out
}

/// Writes a complete archive under `dir` and returns its base path.
///
/// `blocks` fixes the block partition; records must be position-sorted, with
/// chromosomes non-decreasing across the whole archive.
pub fn write_archive(
    dir: &Path,
    base_name: &str,
    header_text: &str,
    blocks: &[Vec<SimRecord>],
) -> PathBuf {
    let base = dir.join(base_name);
    fs::write(dir.join(format!("{base_name}.head")), header_text).unwrap();

    let mut offs_file = Vec::new();
    let mut edits_file = Vec::new();
    let mut has_edits_file = Vec::new();
    let mut left_file = Vec::new();
    let mut right_file = Vec::new();
    let mut flags_file = Vec::new();
    let mut ids_file = Vec::new();
    let mut membership_file = Vec::new();
    let mut sidecar_tuples: Vec<String> = Vec::new();

    let mut prev: Option<(i32, i32)> = None;
    let mut num_alignments = 0u64;
    for block in blocks {
        assert!(!block.is_empty(), "empty blocks are not written");
        let first = &block[0];
        let is_aligned = prev.map_or(true, |(chromo, _)| chromo != first.chromosome);
        let span_start = if is_aligned {
            (first.chromosome, first.position)
        } else {
            prev.unwrap()
        };

        let mut offs = Vec::new();
        let mut edits = Vec::new();
        let mut has_edits = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut flags = Vec::new();
        let mut ids = Vec::new();
        let mut membership = Vec::new();

        for record in block {
            match prev {
                Some((chromo, pos)) if chromo == record.chromosome => {
                    let delta = record.position - pos;
                    assert!(delta >= 0, "records must be position-sorted");
                    push_varint(&mut offs, delta as u64 + 1);
                }
                _ => {
                    // transcript marker: new chromosome, absolute position
                    push_varint(&mut offs, 0);
                    push_varint(&mut offs, record.chromosome as u64);
                    push_varint(&mut offs, record.position as u64);
                }
            }
            prev = Some((record.chromosome, record.position));

            has_edits.push(u8::from(!record.edits.is_empty()));
            if !record.edits.is_empty() {
                push_varint(&mut edits, record.edits.len() as u64);
                for op in &record.edits {
                    match op {
                        EditOp::Sub { pos, base } => {
                            edits.push(0);
                            push_varint(&mut edits, u64::from(*pos));
                            edits.push(*base);
                        }
                        EditOp::Ins { pos, base } => {
                            edits.push(1);
                            push_varint(&mut edits, u64::from(*pos));
                            edits.push(*base);
                        }
                        EditOp::Del { pos } => {
                            edits.push(2);
                            push_varint(&mut edits, u64::from(*pos));
                        }
                    }
                }
            }
            for (out, clip) in [(&mut left, &record.left), (&mut right, &record.right)] {
                push_varint(out, clip.len() as u64);
                out.extend_from_slice(clip);
            }
            push_varint(&mut flags, record.flag_code);
            push_varint(&mut flags, record.mapq_code);
            push_varint(&mut flags, record.rnext_code);
            push_varint(&mut ids, record.id.len() as u64);
            ids.extend_from_slice(&record.id);
            push_varint(&mut membership, record.group);
        }

        write_member(&mut offs_file, &offs);
        write_member(&mut edits_file, &edits);
        write_member(&mut has_edits_file, &has_edits);
        write_member(&mut left_file, &left);
        write_member(&mut right_file, &right);
        write_member(&mut flags_file, &flags);
        write_member(&mut ids_file, &ids);
        write_member(&mut membership_file, &membership);

        let last = block.last().unwrap();
        sidecar_tuples.push(format!(
            "{} {}:{}-{}:{} {}",
            num_alignments,
            span_start.0,
            span_start.1,
            last.chromosome,
            last.position,
            u8::from(is_aligned),
        ));
        num_alignments += block.len() as u64;
    }

    for (suffix, file) in SUFFIXES.iter().zip([
        &offs_file,
        &edits_file,
        &has_edits_file,
        &left_file,
        &right_file,
        &flags_file,
        &ids_file,
        &membership_file,
    ]) {
        let mut path = base.as_os_str().to_owned();
        path.push(suffix);
        fs::write(&path, file).unwrap();
    }

    let mut sidecar = String::new();
    for suffix in SUFFIXES {
        for tuple in &sidecar_tuples {
            sidecar.push_str(&format!("{suffix} {tuple}\n"));
        }
    }
    fs::write(dir.join("genomic_intervals.txt"), sidecar).unwrap();

    base
}
