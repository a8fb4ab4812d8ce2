//! Genotype probability block codec
//!
//! A variant's probability payload arrives zlib/zstd-compressed (§
//! container header flags) and decodes into per-sample probability
//! vectors. Layout 1 stores three `u16` probabilities per sample scaled
//! by 32768. Layout 2 stores a geometry preamble followed by bit-packed
//! fixed-point probabilities with denominator `2^bits - 1`, sample-major
//! and entry-minor, with the final probability of each vector implicit.
//!
//! Decoding drives a [`ProbabilitySink`]; the diploid unphased fast path
//! instead exposes the still-packed buffer through [`GenotypeDataBlock`]
//! so transcoders can work from lookup tables.

use crate::context::{Context, Layout};
use crate::endian;
use crate::error::{ProbabilityError, Result};

/// How the probabilities of one sample are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// One probability per genotype (allele-count multiset), colex order
    PerUnorderedGenotype,
    /// One probability per haplotype per allele
    PerPhasedHaplotypePerAllele,
}

/// What kind of value the decoder is delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Probability,
}

/// Receiver for decoded probability data.
///
/// The decoder calls `initialise` once, then `set_min_max_ploidy`, then
/// per sample: `set_sample` (returning false skips the sample's values),
/// `set_number_of_entries`, and one `set_value`/`set_missing` per entry.
/// `finalise` closes the block.
pub trait ProbabilitySink {
    fn initialise(&mut self, number_of_samples: u32, number_of_alleles: u16) -> Result<()>;

    fn set_min_max_ploidy(
        &mut self,
        min_ploidy: u8,
        max_ploidy: u8,
        min_entries: u32,
        max_entries: u32,
    ) {
        let _ = (min_ploidy, max_ploidy, min_entries, max_entries);
    }

    fn set_sample(&mut self, i: usize) -> bool;

    fn set_number_of_entries(
        &mut self,
        ploidy: u8,
        number_of_entries: u32,
        order: OrderType,
        value_type: ValueType,
    );

    fn set_value(&mut self, index: u32, value: f64);

    fn set_missing(&mut self, index: u32);

    fn finalise(&mut self);
}

/// Binomial coefficient, sized for genotype counting
fn binomial(n: u32, k: u32) -> u32 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u64 = 1;
    for i in 0..k as u64 {
        result = result * (n as u64 - i) / (i + 1);
    }
    result as u32
}

/// Number of probabilities delivered to the sink for one sample
#[must_use]
pub fn full_entry_count(phased: bool, ploidy: u8, number_of_alleles: u16) -> u32 {
    if phased {
        u32::from(ploidy) * u32::from(number_of_alleles)
    } else {
        binomial(
            u32::from(ploidy) + u32::from(number_of_alleles) - 1,
            u32::from(number_of_alleles) - 1,
        )
    }
}

/// Number of probabilities physically stored for one sample
///
/// The last probability of each vector (per haplotype for phased data)
/// is implicit: the stored values of a vector sum to at most one.
#[must_use]
pub fn stored_entry_count(phased: bool, ploidy: u8, number_of_alleles: u16) -> u32 {
    if phased {
        u32::from(ploidy) * (u32::from(number_of_alleles) - 1)
    } else {
        full_entry_count(phased, ploidy, number_of_alleles) - 1
    }
}

/// Parsed layout-2 preamble over a still-packed probability buffer
#[derive(Debug, Clone, Copy)]
pub struct GenotypeDataBlock<'a> {
    pub number_of_samples: u32,
    pub number_of_alleles: u16,
    /// `[min_ploidy, max_ploidy]`
    pub ploidy_extent: [u8; 2],
    /// One byte per sample: ploidy in the low 6 bits, missing in the high bit
    pub ploidy: &'a [u8],
    pub phased: bool,
    pub bits: u8,
    /// Packed probabilities, bit-adjacent across samples
    pub buffer: &'a [u8],
}

impl<'a> GenotypeDataBlock<'a> {
    /// Parses the preamble of a decompressed layout-2 payload.
    pub fn parse(context: &Context, data: &'a [u8]) -> Result<Self> {
        let need = |needed: usize, have: usize| -> crate::Error {
            ProbabilityError::BufferOverrun { needed, have }.into()
        };
        if data.len() < 10 {
            return Err(need(10, data.len()));
        }
        let number_of_samples = u32::from_le_bytes(data[0..4].try_into().unwrap());
        if number_of_samples != context.number_of_samples {
            return Err(ProbabilityError::SampleCountMismatch {
                expected: context.number_of_samples,
                got: number_of_samples,
            }
            .into());
        }
        let number_of_alleles = u16::from_le_bytes(data[4..6].try_into().unwrap());
        if number_of_alleles == 0 {
            return Err(crate::error::VariantError::TooFewAlleles(0).into());
        }
        let min_ploidy = data[6];
        let max_ploidy = data[7];

        let ploidy_end = 8 + number_of_samples as usize;
        if data.len() < ploidy_end + 2 {
            return Err(need(ploidy_end + 2, data.len()));
        }
        let ploidy = &data[8..ploidy_end];
        let phased = data[ploidy_end] != 0;
        let bits = data[ploidy_end + 1];
        if bits == 0 || bits > 32 {
            return Err(ProbabilityError::UnsupportedBitDepth(bits).into());
        }

        Ok(Self {
            number_of_samples,
            number_of_alleles,
            ploidy_extent: [min_ploidy, max_ploidy],
            ploidy,
            phased,
            bits,
            buffer: &data[ploidy_end + 2..],
        })
    }

    /// Total packed bits the per-sample geometry calls for
    fn packed_bits(&self) -> Result<usize> {
        let mut total = 0usize;
        for &p in self.ploidy {
            let ploidy = p & 0x3F;
            let [min, max] = self.ploidy_extent;
            if ploidy < min || ploidy > max {
                return Err(ProbabilityError::PloidyOutOfRange { ploidy, min, max }.into());
            }
            total += stored_entry_count(self.phased, ploidy, self.number_of_alleles) as usize
                * self.bits as usize;
        }
        Ok(total)
    }
}

/// Extracts `bits` bits starting at `bit_offset`, little-endian.
///
/// Loads an eight-byte window so a value of up to 32 bits can straddle
/// the current byte at any alignment.
#[must_use]
pub fn read_packed_value(buffer: &[u8], bit_offset: usize, bits: u8) -> u64 {
    let byte = bit_offset / 8;
    let shift = bit_offset % 8;
    let mut window = [0u8; 8];
    let end = (byte + 8).min(buffer.len());
    if byte < end {
        window[..end - byte].copy_from_slice(&buffer[byte..end]);
    }
    let mask = (1u64 << bits) - 1;
    (u64::from_le_bytes(window) >> shift) & mask
}

/// Decodes a decompressed layout-2 payload against a sink.
pub fn parse_probability_data_v2<S: ProbabilitySink>(
    context: &Context,
    data: &[u8],
    sink: &mut S,
) -> Result<()> {
    let block = GenotypeDataBlock::parse(context, data)?;
    parse_genotype_data_block(&block, sink)
}

/// Decodes an already-unpacked [`GenotypeDataBlock`] against a sink.
pub fn parse_genotype_data_block<S: ProbabilitySink>(
    block: &GenotypeDataBlock<'_>,
    sink: &mut S,
) -> Result<()> {
    let needed_bits = block.packed_bits()?;
    let have_bits = block.buffer.len() * 8;
    if needed_bits > have_bits {
        return Err(ProbabilityError::BufferOverrun {
            needed: needed_bits.div_ceil(8),
            have: block.buffer.len(),
        }
        .into());
    }

    sink.initialise(block.number_of_samples, block.number_of_alleles)?;
    let [min_ploidy, max_ploidy] = block.ploidy_extent;
    sink.set_min_max_ploidy(
        min_ploidy,
        max_ploidy,
        full_entry_count(block.phased, min_ploidy, block.number_of_alleles),
        full_entry_count(block.phased, max_ploidy, block.number_of_alleles),
    );

    let order = if block.phased {
        OrderType::PerPhasedHaplotypePerAllele
    } else {
        OrderType::PerUnorderedGenotype
    };
    let bits = block.bits as usize;
    let denominator = ((1u64 << block.bits) - 1) as f64;
    let n_alleles = block.number_of_alleles as u32;

    let mut bit_offset = 0usize;
    for (i, &ploidy_byte) in block.ploidy.iter().enumerate() {
        let ploidy = ploidy_byte & 0x3F;
        let missing = ploidy_byte & 0x80 != 0;
        let stored = stored_entry_count(block.phased, ploidy, block.number_of_alleles);
        let full = full_entry_count(block.phased, ploidy, block.number_of_alleles);

        if !sink.set_sample(i) {
            bit_offset += stored as usize * bits;
            continue;
        }
        sink.set_number_of_entries(ploidy, full, order, ValueType::Probability);

        if missing {
            // the packed bits are present (zeroed) and must be skipped
            for entry in 0..full {
                sink.set_missing(entry);
            }
            bit_offset += stored as usize * bits;
        } else if block.phased {
            for haplotype in 0..u32::from(ploidy) {
                let mut sum = 0.0;
                for allele in 0..n_alleles - 1 {
                    let raw = read_packed_value(block.buffer, bit_offset, block.bits);
                    bit_offset += bits;
                    let value = raw as f64 / denominator;
                    sum += value;
                    sink.set_value(haplotype * n_alleles + allele, value);
                }
                sink.set_value(haplotype * n_alleles + n_alleles - 1, 1.0 - sum);
            }
        } else {
            let mut sum = 0.0;
            for entry in 0..full - 1 {
                let raw = read_packed_value(block.buffer, bit_offset, block.bits);
                bit_offset += bits;
                let value = raw as f64 / denominator;
                sum += value;
                sink.set_value(entry, value);
            }
            sink.set_value(full - 1, 1.0 - sum);
        }
    }
    sink.finalise();
    Ok(())
}

/// Layout-1 probability scale denominator
pub const V1_DENOMINATOR: f64 = 32768.0;

/// Decodes a decompressed layout-1 payload (three `u16` per sample).
///
/// An all-zero triple encodes a missing sample.
pub fn parse_probability_data_v1<S: ProbabilitySink>(
    context: &Context,
    data: &[u8],
    sink: &mut S,
) -> Result<()> {
    let expected = 6 * context.number_of_samples as usize;
    if data.len() != expected {
        return Err(ProbabilityError::BufferOverrun {
            needed: expected,
            have: data.len(),
        }
        .into());
    }

    sink.initialise(context.number_of_samples, 2)?;
    sink.set_min_max_ploidy(2, 2, 3, 3);
    for i in 0..context.number_of_samples as usize {
        if !sink.set_sample(i) {
            continue;
        }
        sink.set_number_of_entries(2, 3, OrderType::PerUnorderedGenotype, ValueType::Probability);
        let base = 6 * i;
        let aa = u16::from_le_bytes(data[base..base + 2].try_into().unwrap());
        let ab = u16::from_le_bytes(data[base + 2..base + 4].try_into().unwrap());
        let bb = u16::from_le_bytes(data[base + 4..base + 6].try_into().unwrap());
        if aa == 0 && ab == 0 && bb == 0 {
            for entry in 0..3 {
                sink.set_missing(entry);
            }
        } else {
            sink.set_value(0, f64::from(aa) / V1_DENOMINATOR);
            sink.set_value(1, f64::from(ab) / V1_DENOMINATOR);
            sink.set_value(2, f64::from(bb) / V1_DENOMINATOR);
        }
    }
    sink.finalise();
    Ok(())
}

/// Decodes a decompressed payload in the context's dialect.
pub fn parse_probability_data<S: ProbabilitySink>(
    context: &Context,
    data: &[u8],
    sink: &mut S,
) -> Result<()> {
    match context.layout {
        Layout::V1 => parse_probability_data_v1(context, data, sink),
        Layout::V2 => parse_probability_data_v2(context, data, sink),
    }
}

/// One sample's probabilities, ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct SampleProbabilities {
    pub ploidy: u8,
    pub missing: bool,
    /// Full vector, including the probability that will be left implicit
    pub probabilities: Vec<f64>,
}

impl SampleProbabilities {
    /// Diploid sample with the given full probability vector
    #[must_use]
    pub fn diploid(probabilities: Vec<f64>) -> Self {
        Self {
            ploidy: 2,
            missing: false,
            probabilities,
        }
    }

    /// Missing diploid sample
    #[must_use]
    pub fn missing_diploid() -> Self {
        Self {
            ploidy: 2,
            missing: true,
            probabilities: Vec::new(),
        }
    }
}

/// Assembles an uncompressed layout-2 payload from per-sample vectors.
///
/// Probabilities are quantized to `round(p * (2^bits - 1))`. Missing
/// samples contribute zeroed packed bits. This is an in-memory encoder
/// used to synthesize files and exercise the decoder; there is no
/// incremental writer for the newer layout.
pub fn encode_probability_data_v2(
    number_of_alleles: u16,
    phased: bool,
    bits: u8,
    samples: &[SampleProbabilities],
) -> Result<Vec<u8>> {
    if bits == 0 || bits > 32 {
        return Err(ProbabilityError::UnsupportedBitDepth(bits).into());
    }
    let min_ploidy = samples.iter().map(|s| s.ploidy).min().unwrap_or(0);
    let max_ploidy = samples.iter().map(|s| s.ploidy).max().unwrap_or(0);

    let mut out = Vec::new();
    endian::write_u32(&mut out, samples.len() as u32)?;
    endian::write_u16(&mut out, number_of_alleles)?;
    out.push(min_ploidy);
    out.push(max_ploidy);
    for sample in samples {
        out.push(sample.ploidy | if sample.missing { 0x80 } else { 0 });
    }
    out.push(u8::from(phased));
    out.push(bits);

    let denominator = ((1u64 << bits) - 1) as f64;
    let mut packed = Vec::new();
    let mut bit_offset = 0usize;
    let mut push_value = |packed: &mut Vec<u8>, bit_offset: &mut usize, raw: u64| {
        let byte = *bit_offset / 8;
        let shift = *bit_offset % 8;
        let needed = byte + (shift + bits as usize).div_ceil(8);
        if packed.len() < needed {
            packed.resize(needed, 0);
        }
        // a value of up to 32 bits at any alignment spans at most 5 bytes
        let mut window = [0u8; 8];
        let span = packed.len() - byte;
        window[..span].copy_from_slice(&packed[byte..]);
        let word = u64::from_le_bytes(window) | (raw << shift);
        window = word.to_le_bytes();
        packed[byte..].copy_from_slice(&window[..span]);
        *bit_offset += bits as usize;
    };

    for sample in samples {
        let stored = stored_entry_count(phased, sample.ploidy, number_of_alleles) as usize;
        if sample.missing {
            for _ in 0..stored {
                push_value(&mut packed, &mut bit_offset, 0);
            }
            continue;
        }
        let full = full_entry_count(phased, sample.ploidy, number_of_alleles) as usize;
        if sample.probabilities.len() != full {
            return Err(ProbabilityError::BufferOverrun {
                needed: full,
                have: sample.probabilities.len(),
            }
            .into());
        }
        if phased {
            let k = number_of_alleles as usize;
            for haplotype in 0..sample.ploidy as usize {
                for allele in 0..k - 1 {
                    let p = sample.probabilities[haplotype * k + allele];
                    push_value(&mut packed, &mut bit_offset, (p * denominator).round() as u64);
                }
            }
        } else {
            for &p in &sample.probabilities[..full - 1] {
                push_value(&mut packed, &mut bit_offset, (p * denominator).round() as u64);
            }
        }
    }
    out.extend_from_slice(&packed);
    Ok(out)
}

/// Assembles an uncompressed layout-1 payload (three `u16` per sample).
pub fn encode_probability_data_v1(samples: &[SampleProbabilities]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(6 * samples.len());
    for sample in samples {
        if sample.missing {
            out.extend_from_slice(&[0u8; 6]);
            continue;
        }
        if sample.probabilities.len() != 3 {
            return Err(ProbabilityError::BufferOverrun {
                needed: 3,
                have: sample.probabilities.len(),
            }
            .into());
        }
        for &p in &sample.probabilities {
            endian::write_u16(&mut out, (p * V1_DENOMINATOR).round() as u16)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Compression;

    fn context(layout: Layout, number_of_samples: u32) -> Context {
        Context {
            layout,
            compression: Compression::None,
            has_sample_identifiers: false,
            number_of_samples,
            number_of_variants: 1,
            free_data: Vec::new(),
        }
    }

    /// Sink collecting every delivered value, `None` for missing
    #[derive(Default)]
    struct Collector {
        number_of_alleles: u16,
        per_sample: Vec<Vec<Option<f64>>>,
        orders: Vec<OrderType>,
        finalised: bool,
    }

    impl ProbabilitySink for Collector {
        fn initialise(&mut self, _number_of_samples: u32, number_of_alleles: u16) -> Result<()> {
            self.number_of_alleles = number_of_alleles;
            Ok(())
        }
        fn set_sample(&mut self, _i: usize) -> bool {
            true
        }
        fn set_number_of_entries(
            &mut self,
            _ploidy: u8,
            number_of_entries: u32,
            order: OrderType,
            _value_type: ValueType,
        ) {
            self.per_sample.push(vec![None; number_of_entries as usize]);
            self.orders.push(order);
        }
        fn set_value(&mut self, index: u32, value: f64) {
            *self.per_sample.last_mut().unwrap().get_mut(index as usize).unwrap() = Some(value);
        }
        fn set_missing(&mut self, _index: u32) {}
        fn finalise(&mut self) {
            self.finalised = true;
        }
    }

    fn assert_close(got: f64, want: f64, tolerance: f64) {
        assert!(
            (got - want).abs() <= tolerance,
            "value {got} not within {tolerance} of {want}"
        );
    }

    #[test]
    fn test_entry_counts() {
        // diploid biallelic unphased: 3 genotypes, 2 stored
        assert_eq!(full_entry_count(false, 2, 2), 3);
        assert_eq!(stored_entry_count(false, 2, 2), 2);
        // triploid triallelic unphased: C(5,2) = 10
        assert_eq!(full_entry_count(false, 3, 3), 10);
        assert_eq!(stored_entry_count(false, 3, 3), 9);
        // phased diploid triallelic: 2*3 full, 2*2 stored
        assert_eq!(full_entry_count(true, 2, 3), 6);
        assert_eq!(stored_entry_count(true, 2, 3), 4);
    }

    #[test]
    fn test_read_packed_value_alignments() {
        // 0b...1010_1010 pattern
        let buffer = [0xAA, 0xAA, 0xAA, 0xAA, 0xAA];
        assert_eq!(read_packed_value(&buffer, 0, 1), 0);
        assert_eq!(read_packed_value(&buffer, 1, 1), 1);
        assert_eq!(read_packed_value(&buffer, 0, 8), 0xAA);
        assert_eq!(read_packed_value(&buffer, 4, 8), 0xAA);
        assert_eq!(read_packed_value(&buffer, 3, 32), 0x5555_5555);
    }

    #[test]
    fn test_v2_round_trip_8_bits() {
        let ctx = context(Layout::V2, 3);
        let samples = vec![
            SampleProbabilities::diploid(vec![1.0, 0.0, 0.0]),
            SampleProbabilities::diploid(vec![0.1, 0.7, 0.2]),
            SampleProbabilities::diploid(vec![0.0, 0.03, 0.97]),
        ];
        let data = encode_probability_data_v2(2, false, 8, &samples).unwrap();

        let mut sink = Collector::default();
        parse_probability_data_v2(&ctx, &data, &mut sink).unwrap();
        assert!(sink.finalised);
        assert_eq!(sink.per_sample.len(), 3);
        let tolerance = 1.0 / 255.0;
        for (decoded, original) in sink.per_sample.iter().zip(&samples) {
            for (got, want) in decoded.iter().zip(&original.probabilities) {
                assert_close(got.unwrap(), *want, tolerance);
            }
        }
    }

    #[test]
    fn test_v2_round_trip_all_bit_depths() {
        for bits in [1, 2, 4, 8, 11, 16, 23, 32] {
            let ctx = context(Layout::V2, 2);
            let samples = vec![
                SampleProbabilities::diploid(vec![0.25, 0.5, 0.25]),
                SampleProbabilities::diploid(vec![0.0, 1.0, 0.0]),
            ];
            let data = encode_probability_data_v2(2, false, bits, &samples).unwrap();
            let mut sink = Collector::default();
            parse_probability_data_v2(&ctx, &data, &mut sink).unwrap();
            let tolerance = 1.0 / ((1u64 << bits) - 1) as f64;
            for (decoded, original) in sink.per_sample.iter().zip(&samples) {
                for (got, want) in decoded.iter().zip(&original.probabilities) {
                    assert_close(got.unwrap(), *want, tolerance);
                }
            }
        }
    }

    #[test]
    fn test_v2_phased_round_trip() {
        let ctx = context(Layout::V2, 2);
        let samples = vec![
            SampleProbabilities::diploid(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            SampleProbabilities::diploid(vec![0.0, 0.5, 0.5, 1.0, 0.0, 0.0]),
        ];
        let data = encode_probability_data_v2(3, true, 16, &samples).unwrap();
        let mut sink = Collector::default();
        parse_probability_data_v2(&ctx, &data, &mut sink).unwrap();
        assert_eq!(sink.orders[0], OrderType::PerPhasedHaplotypePerAllele);
        let tolerance = 2.0 / 65535.0;
        for (decoded, original) in sink.per_sample.iter().zip(&samples) {
            assert_eq!(decoded.len(), 6);
            for (got, want) in decoded.iter().zip(&original.probabilities) {
                assert_close(got.unwrap(), *want, tolerance);
            }
        }
    }

    #[test]
    fn test_v2_missing_sample_skips_bits() {
        let ctx = context(Layout::V2, 3);
        let samples = vec![
            SampleProbabilities::diploid(vec![1.0, 0.0, 0.0]),
            SampleProbabilities::missing_diploid(),
            SampleProbabilities::diploid(vec![0.0, 0.0, 1.0]),
        ];
        let data = encode_probability_data_v2(2, false, 8, &samples).unwrap();

        #[derive(Default)]
        struct MissingAware {
            values: Vec<Vec<Option<f64>>>,
        }
        impl ProbabilitySink for MissingAware {
            fn initialise(&mut self, _n: u32, _k: u16) -> Result<()> {
                Ok(())
            }
            fn set_sample(&mut self, _i: usize) -> bool {
                true
            }
            fn set_number_of_entries(&mut self, _p: u8, n: u32, _o: OrderType, _v: ValueType) {
                self.values.push(vec![None; n as usize]);
            }
            fn set_value(&mut self, index: u32, value: f64) {
                self.values.last_mut().unwrap()[index as usize] = Some(value);
            }
            fn set_missing(&mut self, _index: u32) {}
            fn finalise(&mut self) {}
        }

        let mut sink = MissingAware::default();
        parse_probability_data_v2(&ctx, &data, &mut sink).unwrap();
        // middle sample delivered as missing, third sample unaffected by the skip
        assert!(sink.values[1].iter().all(Option::is_none));
        assert_close(sink.values[2][2].unwrap(), 1.0, 1.0 / 255.0);
    }

    #[test]
    fn test_v2_skipped_sample_keeps_alignment() {
        let ctx = context(Layout::V2, 3);
        let samples = vec![
            SampleProbabilities::diploid(vec![1.0, 0.0, 0.0]),
            SampleProbabilities::diploid(vec![0.0, 1.0, 0.0]),
            SampleProbabilities::diploid(vec![0.0, 0.0, 1.0]),
        ];
        let data = encode_probability_data_v2(2, false, 8, &samples).unwrap();

        struct SkipSecond {
            collector: Collector,
        }
        impl ProbabilitySink for SkipSecond {
            fn initialise(&mut self, n: u32, k: u16) -> Result<()> {
                self.collector.initialise(n, k)
            }
            fn set_sample(&mut self, i: usize) -> bool {
                i != 1
            }
            fn set_number_of_entries(&mut self, p: u8, n: u32, o: OrderType, v: ValueType) {
                self.collector.set_number_of_entries(p, n, o, v);
            }
            fn set_value(&mut self, index: u32, value: f64) {
                self.collector.set_value(index, value);
            }
            fn set_missing(&mut self, index: u32) {
                self.collector.set_missing(index);
            }
            fn finalise(&mut self) {
                self.collector.finalise();
            }
        }

        let mut sink = SkipSecond {
            collector: Collector::default(),
        };
        parse_probability_data_v2(&ctx, &data, &mut sink).unwrap();
        assert_eq!(sink.collector.per_sample.len(), 2);
        assert_close(sink.collector.per_sample[1][2].unwrap(), 1.0, 1.0 / 255.0);
    }

    #[test]
    fn test_v2_sample_count_mismatch() {
        let samples = vec![SampleProbabilities::diploid(vec![1.0, 0.0, 0.0])];
        let data = encode_probability_data_v2(2, false, 8, &samples).unwrap();
        let ctx = context(Layout::V2, 5);
        let mut sink = Collector::default();
        let err = parse_probability_data_v2(&ctx, &data, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Probability(ProbabilityError::SampleCountMismatch { .. })
        ));
    }

    #[test]
    fn test_v2_truncated_packed_buffer() {
        let ctx = context(Layout::V2, 2);
        let samples = vec![
            SampleProbabilities::diploid(vec![0.5, 0.5, 0.0]),
            SampleProbabilities::diploid(vec![0.5, 0.5, 0.0]),
        ];
        let mut data = encode_probability_data_v2(2, false, 16, &samples).unwrap();
        data.truncate(data.len() - 3);
        let mut sink = Collector::default();
        let err = parse_probability_data_v2(&ctx, &data, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Probability(ProbabilityError::BufferOverrun { .. })
        ));
    }

    #[test]
    fn test_v2_rejects_zero_bits() {
        let err = encode_probability_data_v2(2, false, 0, &[]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Probability(ProbabilityError::UnsupportedBitDepth(0))
        ));
    }

    #[test]
    fn test_v1_round_trip() {
        let ctx = context(Layout::V1, 3);
        let samples = vec![
            SampleProbabilities::diploid(vec![0.9, 0.1, 0.0]),
            SampleProbabilities::missing_diploid(),
            SampleProbabilities::diploid(vec![0.0, 0.25, 0.75]),
        ];
        let data = encode_probability_data_v1(&samples).unwrap();
        assert_eq!(data.len(), 18);

        let mut sink = Collector::default();
        parse_probability_data_v1(&ctx, &data, &mut sink).unwrap();
        assert_eq!(sink.per_sample.len(), 3);
        let tolerance = 1.0 / 32768.0;
        assert_close(sink.per_sample[0][0].unwrap(), 0.9, tolerance);
        assert!(sink.per_sample[1].iter().all(Option::is_none));
        assert_close(sink.per_sample[2][2].unwrap(), 0.75, tolerance);
    }

    #[test]
    fn test_v1_wrong_length() {
        let ctx = context(Layout::V1, 3);
        let mut sink = Collector::default();
        let err = parse_probability_data_v1(&ctx, &[0u8; 17], &mut sink).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Probability(ProbabilityError::BufferOverrun { .. })
        ));
    }

    #[test]
    fn test_fast_path_block_exposes_packed_buffer() {
        let ctx = context(Layout::V2, 2);
        let samples = vec![
            SampleProbabilities::diploid(vec![1.0, 0.0, 0.0]),
            SampleProbabilities::diploid(vec![0.0, 1.0, 0.0]),
        ];
        let data = encode_probability_data_v2(2, false, 8, &samples).unwrap();
        let block = GenotypeDataBlock::parse(&ctx, &data).unwrap();
        assert_eq!(block.bits, 8);
        assert!(!block.phased);
        assert_eq!(block.ploidy_extent, [2, 2]);
        // two stored bytes per sample: (255, 0) then (0, 255)
        assert_eq!(block.buffer, &[255, 0, 0, 255]);
    }
}
