/// Custom Result type for bgenkit operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the bgenkit library, encompassing all failure
/// domains of the codec, view, index, and transcoder subsystems.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors at the byte-stream boundary (short reads)
    #[error("Error reading stream: {0}")]
    Read(#[from] ReadError),

    /// Errors at the byte-stream boundary (short or failed writes)
    #[error("Error writing stream: {0}")]
    Write(#[from] WriteError),

    /// Errors decoding or validating the file header
    #[error("Error processing header: {0}")]
    Header(#[from] HeaderError),

    /// Errors in per-variant identifying records
    #[error("Error processing variant record: {0}")]
    Variant(#[from] VariantError),

    /// Errors in genotype probability blocks
    #[error("Error processing probability data: {0}")]
    Probability(#[from] ProbabilityError),

    /// Errors wrapping the zlib/zstd codecs
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    /// View cursor misuse
    #[error("View error: {0}")]
    View(#[from] ViewError),

    /// Errors in the index sidecar lifecycle
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Feature-set violations in the transcoders
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the underlying relational store
    #[error("Error in index store: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// UTF-8 conversion errors in on-disk strings
    #[error("Error with UTF8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors raised when a read cannot be satisfied from the input stream
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The input ended before a fixed-width field or counted payload was complete
    #[error("Truncated input: needed {needed} more bytes")]
    TruncatedInput { needed: usize },
}

/// Errors raised when a write cannot be completed
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("Write failed: {0}")]
    WriteFailed(std::io::Error),
}

/// Errors specific to decoding and validating the container header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic bytes are neither "bgen" nor all-zero
    #[error("Invalid magic bytes: {0:?}")]
    InvalidMagic([u8; 4]),

    /// The layout field of the flags word encodes an unknown dialect
    #[error("Unsupported layout in flags word: {0}")]
    UnsupportedLayout(u32),

    /// The compression field of the flags word encodes an unknown codec
    #[error("Unsupported compression in flags word: {0}")]
    UnsupportedCompression(u32),

    /// Bits outside the compression/layout/sample-identifier fields are set
    #[error("Reserved flag bits set: {0:#010x}")]
    ReservedFlagBits(u32),

    /// The declared header size cannot hold the fixed fields
    #[error("Invalid header size: {0} (must be at least 20)")]
    InvalidHeaderSize(u32),

    /// Concatenation requires every input to share the first file's sample count
    #[error("Input file \"{filename}\" has the wrong number of samples ({got}, expected {expected})")]
    IncompatibleSampleCount {
        filename: String,
        expected: u32,
        got: u32,
    },

    /// Concatenation requires every input to share the first file's flags
    #[error("Input file \"{filename}\" has the wrong flags ({got:#x}, expected {expected:#x})")]
    IncompatibleFlags {
        filename: String,
        expected: u32,
        got: u32,
    },

    /// In-place free-data edits must preserve the header size
    #[error("Size of new free data ({got} bytes) does not match that of free data in file ({expected} bytes)")]
    FreeDataSizeMismatch { expected: usize, got: usize },
}

/// Errors in per-variant identifying records
#[derive(thiserror::Error, Debug)]
pub enum VariantError {
    /// A layout-1 record repeats the sample count and it disagrees with the header
    #[error("Sample count in variant record ({got}) does not match the header ({expected})")]
    SampleCountMismatch { expected: u32, got: u32 },

    /// Every variant carries at least two alleles
    #[error("Variant has {0} alleles, at least 2 are required")]
    TooFewAlleles(u16),

    /// The record is structurally malformed
    #[error("Invalid variant record: {0}")]
    InvalidRecord(String),
}

/// Errors in genotype probability blocks
#[derive(thiserror::Error, Debug)]
pub enum ProbabilityError {
    /// The sample count embedded in the block disagrees with the header
    #[error("Sample count in probability block ({got}) does not match the header ({expected})")]
    SampleCountMismatch { expected: u32, got: u32 },

    /// Bits per probability must lie in 1..=32
    #[error("Unsupported bit depth: {0} (expected 1..=32)")]
    UnsupportedBitDepth(u8),

    /// A sample's ploidy lies outside the declared extent
    #[error("Ploidy {ploidy} outside declared extent [{min}, {max}]")]
    PloidyOutOfRange { ploidy: u8, min: u8, max: u8 },

    /// The packed payload is shorter than the declared geometry requires
    #[error("Probability payload too short: needed {needed} bytes, have {have}")]
    BufferOverrun { needed: usize, have: usize },
}

/// Errors wrapping the zlib/zstd codecs
#[derive(thiserror::Error, Debug)]
pub enum CompressionError {
    /// The decoded payload length disagrees with the length recorded on disk
    #[error("Decompressed size ({got}) does not match the recorded size ({expected})")]
    LengthMismatch { expected: usize, got: usize },

    /// The codec itself rejected the payload
    #[error("Codec failure: {0}")]
    Codec(String),
}

/// View cursor misuse
#[derive(thiserror::Error, Debug)]
pub enum ViewError {
    /// An operation was called while the cursor was at the wrong position
    #[error("Operation requires cursor {expected}, but it is {found}")]
    StateViolation {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors in the index sidecar lifecycle
///
/// All of these are recoverable by rebuilding the index.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// An index (or an incomplete temp index) is already present
    #[error("Index file \"{0}\" already exists, use -clobber if you want to overwrite it")]
    Exists(String),

    /// The data file no longer matches the fingerprint bound into the index
    #[error("{0}\nDo you need to recreate the index?")]
    Stale(String),

    /// The sidecar is unreadable or structurally wrong
    #[error("Index file is corrupt: {0}")]
    Corrupt(String),

    /// A mid-build failure, annotated with the last variant seen
    #[error(
        "{message}\nLast observed variant was {identity}.\nReached byte {position} in input file, which has size {file_size}."
    )]
    BuildFailed {
        message: String,
        identity: String,
        position: u64,
        file_size: u64,
    },

    /// The sidecar has no Metadata row to verify against
    #[error("Index file has no file metadata record")]
    MetadataMissing,
}

/// Feature-set violations in the transcoders
#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    /// The fast transcoders only accept layout-2 input
    #[error("Transcoding requires a layout-2 input file")]
    RequiresLayout2,

    /// BGEN v1.1 output holds exactly two alleles per variant
    #[error("Found variant with {0} alleles, only 2 alleles are supported by BGEN v1.1")]
    RequiresBiallelic(u16),

    /// The v1.1 lookup-table path is specific to 8-bit probabilities
    #[error("Expected 8 bits per probability, found {0}")]
    RequiresEightBits(u8),

    /// The v1.1 path handles unphased data only
    #[error("Expected unphased data")]
    RequiresUnphased,

    /// The v1.1 path handles diploid samples only
    #[error("Expected diploid samples, found ploidy extent [{0}, {1}]")]
    RequiresDiploid(u8, u8),
}
