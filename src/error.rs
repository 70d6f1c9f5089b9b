use std::path::PathBuf;

/// Custom Result type for refz operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the refz library, encompassing all error cases
/// that can occur while reading or decoding an alignment archive.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors raised while enumerating or decoding container members
    #[error("Error reading container: {0}")]
    Container(#[from] ContainerError),

    /// Errors raised while building or consulting the block index
    #[error("Error processing block index: {0}")]
    Index(#[from] IndexError),

    /// Errors raised while parsing the archive header
    #[error("Error parsing header: {0}")]
    Header(#[from] HeaderError),

    /// Errors raised while decoding a typed stream
    #[error("Error decoding stream: {0}")]
    Stream(#[from] StreamError),

    /// A required archive file is absent
    #[error("Missing archive component: {0}")]
    MissingComponent(PathBuf),

    /// A query interval that does not follow the `chr<N>:<start>-<end>` grammar
    #[error("Cannot parse interval {0:?} - expected format: chr2:5000000-100000000")]
    InvalidInterval(String),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps the error onto the process exit code contract:
    /// `2` malformed input, `3` missing archive component, `4` I/O error,
    /// `5` internal invariant violated.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Container(_) | Self::Header(_) | Self::Stream(_) | Self::InvalidInterval(_) => 2,
            Self::Index(err) => err.exit_code(),
            Self::MissingComponent(_) => 3,
            Self::Io(_) => 4,
        }
    }
}

/// Errors raised by the framed container reader and the block decoder
#[derive(thiserror::Error, Debug)]
pub enum ContainerError {
    /// The cumulative member size does not equal the file length
    #[error("member sizes sum to {total} bytes but the file holds {file_len}")]
    SizeMismatch { total: u64, file_len: u64 },

    /// A trailer reported a size that cannot be satisfied by the file
    #[error(
        "implausible trailer ending at byte {pos}: member_size {member_size}, data_size {data_size}"
    )]
    ImplausibleTrailer {
        pos: u64,
        member_size: u64,
        data_size: u64,
    },

    /// A member does not begin with the expected magic bytes
    #[error("invalid member magic at byte {0}")]
    InvalidMemberMagic(u64),

    /// The decoder produced fewer bytes than the trailer promised
    #[error("decoder produced {got} bytes - expected {expected}")]
    ShortDecode { expected: usize, got: usize },

    /// The decoder still had output after the promised byte count
    #[error("trailing garbage after {expected} decoded bytes")]
    TrailingGarbage { expected: usize },

    /// The underlying decompressor reported an error
    #[error("decoder error: {0}")]
    Decode(#[source] std::io::Error),
}

/// Errors raised while joining the sidecar index with container members
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// More container blocks than sidecar tuples for one stream
    #[error("stream {suffix}: {blocks} container blocks exceed {tuples} sidecar tuples")]
    BlockCountExceedsTuples {
        suffix: String,
        blocks: usize,
        tuples: usize,
    },

    /// A sidecar tuple cites a chromosome absent from the transcript table
    #[error("stream {suffix}: sidecar cites unknown chromosome {chromosome}")]
    UnknownChromosome { suffix: String, chromosome: i32 },

    /// A sidecar line that does not follow the documented grammar
    #[error("sidecar line {line}: {reason}")]
    MalformedSidecar { line: usize, reason: String },

    /// The sidecar holds no tuples for a stream the session requires
    #[error("sidecar holds no intervals for stream suffix {0}")]
    MissingSuffix(String),

    /// No block precedes the requested alignment count
    #[error("no block precedes alignment {0}")]
    NoSuchAlignmentPoint(u64),
}

impl IndexError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::MalformedSidecar { .. } | Self::UnknownChromosome { .. } => 2,
            Self::MissingSuffix(_) => 3,
            Self::BlockCountExceedsTuples { .. } | Self::NoSuchAlignmentPoint(_) => 5,
        }
    }
}

/// Errors raised while parsing the `.head` sidecar
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The header does not declare a read length
    #[error("missing read_len section")]
    MissingReadLen,

    /// The header declares no transcripts
    #[error("empty transcript table")]
    EmptyTranscriptTable,

    /// A line beginning with an unrecognized keyword
    #[error("line {line}: unknown keyword {keyword:?}")]
    UnknownKeyword { line: usize, keyword: String },

    /// A line with the wrong arity or an unparseable field
    #[error("line {line}: malformed {keyword} entry")]
    MalformedLine { line: usize, keyword: String },

    /// The same code mapped twice within one remap table
    #[error("duplicate code {code} in {table} table")]
    DuplicateCode { table: &'static str, code: u32 },

    /// A stream cited a code the remap table does not hold
    #[error("code {code} not present in {table} table")]
    UnknownCode { table: &'static str, code: u32 },
}

/// Errors raised while interpreting the byte grammar of a typed stream
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// A required byte could not be obtained mid-record
    #[error("unexpected end of stream in {0}")]
    UnexpectedEndOfStream(String),

    /// A varint with too many continuation bytes
    #[error("malformed varint in {0}")]
    MalformedVarint(String),

    /// A has-edits byte that is neither 0 nor 1
    #[error("invalid has-edits byte {0:#04x}")]
    InvalidHasEditsByte(u8),

    /// An edit opcode outside the known set
    #[error("unknown edit opcode {0:#04x}")]
    UnknownEditOpcode(u8),

    /// An edit op citing a position outside the evolving read
    #[error("edit op at position {pos} outside read of length {len}")]
    MalformedEditScript { pos: u32, len: usize },
}
