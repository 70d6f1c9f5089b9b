//! Framed compressed container reader.
//!
//! Every `.lz` stream file is a sequence of self-delimiting members, each
//! `header | zstd payload | trailer`. The trailer records the member's total
//! on-disk size and its decompressed payload size, so the member list can be
//! recovered by walking trailers from the end of the file back to its start.

use std::io::Read;

use bytemuck::{Pod, Zeroable};

use crate::{
    error::{ContainerError, Result},
    Error,
};

/// The magic number opening every container member.
pub const MEMBER_MAGIC: &[u8; 4] = b"RFZB";

/// The current member framing version.
pub const MEMBER_VERSION: u8 = 1;

/// Upper bound a trailer may claim for a decompressed payload.
const MAX_DATA_SIZE: u64 = 1 << 31;

/// The fixed header opening a container member.
///
/// This is stored identically in memory and on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct MemberHeader {
    magic: [u8; 4],
    version: u8,
    reserved: [u8; 3],
}

pub const SIZE_MEMBER_HEADER: usize = size_of::<MemberHeader>();

impl MemberHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MEMBER_MAGIC,
            version: MEMBER_VERSION,
            reserved: [0; 3],
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads a header off a (possibly unaligned) byte slice.
    pub fn from_bytes(bytes: &[u8], offset: u64) -> Result<Self> {
        let header: Self = bytemuck::pod_read_unaligned(bytes);
        if header.magic != *MEMBER_MAGIC {
            return Err(ContainerError::InvalidMemberMagic(offset).into());
        }
        Ok(header)
    }
}

impl Default for MemberHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// The trailer closing a container member.
///
/// This is stored identically in memory and on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct MemberTrailer {
    /// Decompressed payload length in bytes
    pub data_size: u64,
    /// Total on-disk member length, header and trailer included
    pub member_size: u64,
}

pub const SIZE_MEMBER_TRAILER: usize = size_of::<MemberTrailer>();

impl MemberTrailer {
    #[must_use]
    pub fn new(data_size: u64, member_size: u64) -> Self {
        Self {
            data_size,
            member_size,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads a trailer off a (possibly unaligned) byte slice. Trailers sit
    /// wherever the preceding payload ends, so no alignment is assumed.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(bytes)
    }
}

/// One enumerated container member: where it sits in the file and how large
/// its compressed and decompressed forms are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerBlock {
    /// Total on-disk member size, header and trailer included
    pub compressed_size: u64,
    /// Decompressed payload size
    pub decompressed_size: u64,
    /// Offset of the member header from the beginning of the file
    pub offset: u64,
}

/// Enumerates the members of a framed container, in forward (file) order.
///
/// Walks from end-of-file toward the start: read the trailer, derive the
/// member size, step back to the member header, repeat until the cursor
/// reaches byte zero. Fails with a container error when a trailer reports an
/// implausible size or the members do not tile the file exactly.
pub fn scan_members(data: &[u8]) -> Result<Vec<ContainerBlock>> {
    let file_len = data.len() as u64;
    let min_member = (SIZE_MEMBER_HEADER + SIZE_MEMBER_TRAILER) as u64;

    let mut blocks = Vec::new();
    let mut pos = file_len;
    let mut total = 0u64;
    while pos > 0 {
        if pos < min_member {
            return Err(ContainerError::ImplausibleTrailer {
                pos,
                member_size: 0,
                data_size: 0,
            }
            .into());
        }
        let trailer_off = pos as usize - SIZE_MEMBER_TRAILER;
        let trailer = MemberTrailer::from_bytes(&data[trailer_off..pos as usize]);
        if trailer.member_size < min_member
            || trailer.member_size > pos
            || trailer.data_size > MAX_DATA_SIZE
        {
            return Err(ContainerError::ImplausibleTrailer {
                pos,
                member_size: trailer.member_size,
                data_size: trailer.data_size,
            }
            .into());
        }
        let start = pos - trailer.member_size;
        MemberHeader::from_bytes(
            &data[start as usize..start as usize + SIZE_MEMBER_HEADER],
            start,
        )?;
        blocks.push(ContainerBlock {
            compressed_size: trailer.member_size,
            decompressed_size: trailer.data_size,
            offset: start,
        });
        total += trailer.member_size;
        pos = start;
    }
    if total != file_len {
        return Err(ContainerError::SizeMismatch { total, file_len }.into());
    }
    blocks.reverse();
    Ok(blocks)
}

/// Decompresses one member's payload into exactly `decompressed_size` bytes.
///
/// `member` spans the whole on-disk member, framing included. The decoder is
/// drained as it writes; a short payload or one that keeps producing output
/// past the promised length is fatal.
pub fn decode_member(member: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let payload = &member[SIZE_MEMBER_HEADER..member.len() - SIZE_MEMBER_TRAILER];
    let mut decoder = zstd::stream::read::Decoder::new(payload)
        .map_err(|e| Error::from(ContainerError::Decode(e)))?;

    let mut out = vec![0u8; decompressed_size];
    let mut got = 0;
    while got < decompressed_size {
        match decoder.read(&mut out[got..]) {
            Ok(0) => {
                return Err(ContainerError::ShortDecode {
                    expected: decompressed_size,
                    got,
                }
                .into())
            }
            Ok(n) => got += n,
            Err(e) => return Err(ContainerError::Decode(e).into()),
        }
    }

    let mut probe = [0u8; 1];
    match decoder.read(&mut probe) {
        Ok(0) => Ok(out),
        Ok(_) => Err(ContainerError::TrailingGarbage {
            expected: decompressed_size,
        }
        .into()),
        Err(e) => Err(ContainerError::Decode(e).into()),
    }
}
