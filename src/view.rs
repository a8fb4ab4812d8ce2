//! Stateful reader over a BGEN file
//!
//! A [`View`] owns the file handle for the duration of reading. It
//! decodes the offset and header once at open, captures a
//! [`FileMetadata`] fingerprint for index verification, and then serves
//! variants through a cursor that alternates between the identifying
//! block and the probability block of each variant. Attaching a
//! [`Plan`] re-orders service to the plan's ascending file positions.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::compress;
use crate::context::{self, Compression, Context, Layout};
use crate::endian;
use crate::error::{Result, ViewError};
use crate::index::query::Plan;
use crate::probability::{self, GenotypeDataBlock, ProbabilitySink};
use crate::variant::{self, Variant};

/// Number of leading bytes bound into the index fingerprint
pub const FINGERPRINT_BYTES: usize = 1000;

/// Identity of a data file at a point in time, bound into the index at
/// build time and re-verified at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub filename: String,
    pub size: u64,
    /// Unix seconds; advisory only when verifying
    pub last_write_time: i64,
    /// First [`FINGERPRINT_BYTES`] bytes (fewer for shorter files)
    pub first_bytes: Vec<u8>,
}

impl FileMetadata {
    /// Captures the current fingerprint of `path`.
    pub fn capture<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let stat = fs::metadata(path)?;
        let last_write_time = stat
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut first_bytes = vec![0u8; FINGERPRINT_BYTES.min(stat.len() as usize)];
        let mut file = File::open(path)?;
        file.read_exact(&mut first_bytes)?;

        Ok(Self {
            filename: path.to_string_lossy().into_owned(),
            size: stat.len(),
            last_write_time,
            first_bytes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    AtVariantId,
    AtProbBlock,
}

impl CursorState {
    fn name(self) -> &'static str {
        match self {
            Self::AtVariantId => "at a variant identifying block",
            Self::AtProbBlock => "at a probability block",
        }
    }
}

/// Stateful reader over a BGEN file
pub struct View {
    file: BufReader<File>,
    context: Context,
    offset: u32,
    header_size: u32,
    metadata: FileMetadata,
    state: CursorState,
    plan: Option<Plan>,
    plan_cursor: usize,
    /// Scratch for the compressed probability payload
    zbuf: Vec<u8>,
    /// Scratch for the decompressed probability payload
    ubuf: Vec<u8>,
}

impl View {
    /// Opens a file, decodes offset and header, and captures the
    /// metadata fingerprint. The cursor lands on the first variant.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let metadata = FileMetadata::capture(&path)?;
        let mut file = BufReader::new(File::open(&path)?);

        let offset = context::read_offset(&mut file)?;
        let (ctx, header_size) = context::read_header_block(&mut file)?;

        let mut view = Self {
            file,
            context: ctx,
            offset,
            header_size: header_size as u32,
            metadata,
            state: CursorState::AtVariantId,
            plan: None,
            plan_cursor: 0,
            zbuf: Vec::new(),
            ubuf: Vec::new(),
        };
        view.file.seek(SeekFrom::Start(u64::from(offset) + 4))?;
        Ok(view)
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn file_metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Offset field from the start of the file
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Variants this view will serve: the plan's count when a query is
    /// attached, otherwise the header's advisory count.
    #[must_use]
    pub fn number_of_variants(&self) -> u32 {
        match &self.plan {
            Some(plan) => plan.number_of_variants() as u32,
            None => self.context.number_of_variants,
        }
    }

    /// Current byte position of the cursor
    pub fn current_file_position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    /// Restricts and re-orders subsequent reads to the plan's entries.
    pub fn set_query(&mut self, plan: Plan) {
        self.plan = Some(plan);
        self.plan_cursor = 0;
        self.state = CursorState::AtVariantId;
    }

    fn expect_state(&self, expected: CursorState) -> Result<()> {
        if self.state != expected {
            return Err(ViewError::StateViolation {
                expected: expected.name(),
                found: self.state.name(),
            }
            .into());
        }
        Ok(())
    }

    /// Advances past the next variant's identifying block, leaving the
    /// cursor at its probability block. Returns `None` when the stream
    /// (or the attached plan) is exhausted.
    pub fn read_variant(&mut self) -> Result<Option<Variant>> {
        self.expect_state(CursorState::AtVariantId)?;
        if let Some(plan) = &self.plan {
            if self.plan_cursor >= plan.number_of_variants() {
                return Ok(None);
            }
            let (file_start, _) = plan.locate_variant(self.plan_cursor);
            self.plan_cursor += 1;
            self.file.seek(SeekFrom::Start(file_start))?;
        }
        match variant::read_snp_identifying_data(&mut self.file, &self.context)? {
            Some(variant) => {
                self.state = CursorState::AtProbBlock;
                Ok(Some(variant))
            }
            None => Ok(None),
        }
    }

    /// Skips the probability block using its length prefix, without
    /// decompressing anything.
    pub fn ignore_genotype_data_block(&mut self) -> Result<()> {
        self.expect_state(CursorState::AtProbBlock)?;
        let skip = match (self.context.layout, self.context.compression) {
            (Layout::V1, Compression::None) => 6 * u64::from(self.context.number_of_samples),
            _ => u64::from(endian::read_u32(&mut self.file)?),
        };
        self.file.seek(SeekFrom::Current(skip as i64))?;
        self.state = CursorState::AtVariantId;
        Ok(())
    }

    /// Reads and decompresses the probability block into the internal
    /// scratch buffer, returning the uncompressed payload.
    fn read_genotype_block_bytes(&mut self) -> Result<()> {
        match (self.context.layout, self.context.compression) {
            (Layout::V1, Compression::None) => {
                let len = 6 * self.context.number_of_samples as usize;
                self.ubuf.resize(len, 0);
                endian::read_bytes(&mut self.file, &mut self.ubuf)?;
            }
            (Layout::V1, kind) => {
                let compressed_size = endian::read_u32(&mut self.file)? as usize;
                self.zbuf.resize(compressed_size, 0);
                endian::read_bytes(&mut self.file, &mut self.zbuf)?;
                let expected = 6 * self.context.number_of_samples as usize;
                self.ubuf = compress::decompress(kind, &self.zbuf, expected)?;
            }
            (Layout::V2, Compression::None) => {
                let total = endian::read_u32(&mut self.file)? as usize;
                self.ubuf.resize(total, 0);
                endian::read_bytes(&mut self.file, &mut self.ubuf)?;
            }
            (Layout::V2, kind) => {
                // the total length counts the uncompressed-size field
                let total = endian::read_u32(&mut self.file)? as usize;
                let uncompressed_size = endian::read_u32(&mut self.file)? as usize;
                self.zbuf.resize(total.saturating_sub(4), 0);
                endian::read_bytes(&mut self.file, &mut self.zbuf)?;
                self.ubuf = compress::decompress(kind, &self.zbuf, uncompressed_size)?;
            }
        }
        Ok(())
    }

    /// Drives a full probability decode against a sink.
    pub fn read_genotype_data_block<S: ProbabilitySink>(&mut self, sink: &mut S) -> Result<()> {
        self.expect_state(CursorState::AtProbBlock)?;
        self.read_genotype_block_bytes()?;
        self.state = CursorState::AtVariantId;
        probability::parse_probability_data(&self.context, &self.ubuf, sink)
    }

    /// Fast path: decompresses the layout-2 block and parses only its
    /// preamble, exposing the still-packed probability buffer.
    pub fn read_and_unpack_v2_genotype_data_block(&mut self) -> Result<GenotypeDataBlock<'_>> {
        self.expect_state(CursorState::AtProbBlock)?;
        self.read_genotype_block_bytes()?;
        self.state = CursorState::AtVariantId;
        GenotypeDataBlock::parse(&self.context, &self.ubuf)
    }

    /// Decodes the sample-identifier block and hands each identifier to
    /// the callback. Returns `false` if the file carries none.
    ///
    /// The cursor position is preserved.
    pub fn get_sample_ids<F: FnMut(&str)>(&mut self, mut callback: F) -> Result<bool> {
        if !self.context.has_sample_identifiers {
            return Ok(false);
        }
        let saved = self.file.stream_position()?;
        self.file
            .seek(SeekFrom::Start(u64::from(self.header_size) + 4))?;
        let _block_length = endian::read_u32(&mut self.file)?;
        let count = endian::read_u32(&mut self.file)?;
        for _ in 0..count {
            let id = endian::read_u16_prefixed_string(&mut self.file)?;
            callback(&id);
        }
        self.file.seek(SeekFrom::Start(saved))?;
        Ok(true)
    }
}
