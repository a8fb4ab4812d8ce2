//! VCF transcoder
//!
//! Emits VCFv4.2 with a GT field thresholded at 0.9 and a GP field of
//! the probabilities. Layout-2 diploid unphased data at 1, 2, 4 or 8
//! bits goes through a per-bit-width encoding table mapping each packed
//! `(x, y)` pair to a preformatted `GT:pAA,pAB,pBB` byte string, so the
//! hot loop never touches floating point. Everything else is decoded
//! through the generic probability sink.

use std::collections::HashMap;
use std::io::Write;

use crate::context::Layout;
use crate::error::{ProbabilityError, Result};
use crate::probability::{
    self, read_packed_value, OrderType, ProbabilitySink, ValueType,
};
use crate::view::View;

/// Genotype call threshold for the GT field
pub const GT_THRESHOLD: f64 = 0.9;

/// Preformatted per-genotype VCF fields for one bit width
pub(crate) struct VcfEncodingTable {
    /// Bytes per entry
    value_size: usize,
    data: Vec<u8>,
}

impl VcfEncodingTable {
    fn entry(&self, genotype: usize) -> &[u8] {
        &self.data[genotype * self.value_size..(genotype + 1) * self.value_size]
    }
}

/// Decimal places used per probability at each supported bit width
fn decimal_places(bits: u8) -> usize {
    match bits {
        1 => 0,
        2 => 2,
        4 => 3,
        _ => 4,
    }
}

/// Builds the encoding table for `bits` ∈ {1, 2, 4, 8}.
///
/// The key of an entry is `(y << bits) | x` where `x` and `y` are the
/// two stored probabilities; keys with `x + y` above the scale are
/// unreachable and left blank.
pub(crate) fn compute_vcf_encoding_table(bits: u8) -> VcfEncodingTable {
    debug_assert!(matches!(bits, 1 | 2 | 4 | 8));
    let dps = decimal_places(bits);
    let value_size = 3 + 3 + 3 * (dps + if dps > 0 { 2 } else { 1 });
    let count = 1usize << bits;
    let max = (count - 1) as u16;

    let mut data = vec![b' '; value_size * count * count];
    for x in 0..=max {
        for y in 0..=(max - x) {
            let z = max - x - y;
            let key = usize::from(y) << bits | usize::from(x);
            let p0 = f64::from(x) / f64::from(max);
            let p1 = f64::from(y) / f64::from(max);
            let p2 = f64::from(z) / f64::from(max);
            let gt = if p0 > GT_THRESHOLD {
                "0/0"
            } else if p1 > GT_THRESHOLD {
                "0/1"
            } else if p2 > GT_THRESHOLD {
                "1/1"
            } else {
                "./."
            };
            let value = format!("{gt}:{p0:.dps$},{p1:.dps$},{p2:.dps$}");
            debug_assert_eq!(value.len(), value_size);
            data[key * value_size..(key + 1) * value_size].copy_from_slice(value.as_bytes());
        }
    }
    VcfEncodingTable { value_size, data }
}

/// Formats one probability the way the plain-text writer does:
/// fixed six decimals with trailing zeros trimmed.
fn format_probability(value: f64) -> String {
    let mut text = format!("{value:.6}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    text
}

/// Probability sink assembling one `GT:GP` field per sample
struct VcfProbWriter<'a, W: Write> {
    out: &'a mut W,
    number_of_alleles: usize,
    data: Vec<f64>,
    ploidy: u8,
    order: OrderType,
    missing: bool,
    /// First write failure, surfaced after the parse returns
    failure: Option<std::io::Error>,
}

impl<'a, W: Write> VcfProbWriter<'a, W> {
    fn new(out: &'a mut W) -> Self {
        Self {
            out,
            number_of_alleles: 0,
            data: Vec::new(),
            ploidy: 0,
            order: OrderType::PerUnorderedGenotype,
            missing: false,
            failure: None,
        }
    }

    fn emit(&mut self, bytes: &[u8]) {
        if self.failure.is_none() {
            if let Err(e) = self.out.write_all(bytes) {
                self.failure = Some(e);
            }
        }
    }

    fn finish(self) -> Result<()> {
        match self.failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn write_sample_entry(&mut self) {
        let field = if self.missing {
            let separator = match self.order {
                OrderType::PerPhasedHaplotypePerAllele => "|",
                OrderType::PerUnorderedGenotype => "/",
            };
            vec!["."; self.ploidy as usize].join(separator)
        } else {
            match self.order {
                OrderType::PerPhasedHaplotypePerAllele => self.phased_gt(),
                OrderType::PerUnorderedGenotype => self.unphased_gt(),
            }
        };
        let mut text = field;
        text.push(':');
        for (i, &value) in self.data.iter().enumerate() {
            if i > 0 {
                text.push(',');
            }
            if value < 0.0 {
                text.push('.');
            } else {
                text.push_str(&format_probability(value));
            }
        }
        self.emit(text.as_bytes());
    }

    fn phased_gt(&self) -> String {
        let k = self.number_of_alleles;
        let mut parts = Vec::with_capacity(self.ploidy as usize);
        for haplotype in 0..self.ploidy as usize {
            let called = (0..k).find(|&j| self.data[haplotype * k + j] > GT_THRESHOLD);
            parts.push(match called {
                Some(j) => j.to_string(),
                None => ".".to_string(),
            });
        }
        parts.join("|")
    }

    /// Walks genotypes in colex order of their allele-count vectors
    /// until one clears the threshold.
    fn unphased_gt(&self) -> String {
        let k = self.number_of_alleles;
        let ploidy = self.ploidy as usize;
        let mut limits = vec![ploidy; k - 1];
        let mut genotype = vec![0usize; k];
        genotype[0] = ploidy;

        let mut met_threshold = false;
        let mut index = 0;
        loop {
            if self.data[index] > GT_THRESHOLD {
                met_threshold = true;
                break;
            }
            index += 1;

            let mut j = 0;
            while j < k - 1 {
                let value = genotype[j + 1];
                if value < limits[j] {
                    genotype[j + 1] += 1;
                    genotype[0] -= 1;
                    for limit in &mut limits[..j] {
                        *limit -= 1;
                    }
                    break;
                }
                // this count is saturated; clear it back to the ref allele
                genotype[j + 1] = 0;
                genotype[0] += value;
                for limit in &mut limits[..j] {
                    *limit += value;
                }
                j += 1;
            }
            if j == k - 1 {
                break;
            }
        }

        if met_threshold {
            let mut parts = Vec::with_capacity(ploidy);
            for (allele, &count) in genotype.iter().enumerate() {
                for _ in 0..count {
                    parts.push(allele.to_string());
                }
            }
            parts.join("/")
        } else {
            vec!["."; ploidy].join("/")
        }
    }
}

impl<W: Write> ProbabilitySink for VcfProbWriter<'_, W> {
    fn initialise(&mut self, _number_of_samples: u32, number_of_alleles: u16) -> Result<()> {
        self.number_of_alleles = number_of_alleles as usize;
        Ok(())
    }

    fn set_sample(&mut self, _i: usize) -> bool {
        true
    }

    fn set_number_of_entries(
        &mut self,
        ploidy: u8,
        number_of_entries: u32,
        order: OrderType,
        _value_type: ValueType,
    ) {
        self.data.clear();
        self.data.resize(number_of_entries as usize, 0.0);
        self.ploidy = ploidy;
        self.order = order;
        self.missing = false;
        self.emit(b"\t");
    }

    fn set_value(&mut self, index: u32, value: f64) {
        self.data[index as usize] = value;
        if index as usize == self.data.len() - 1 {
            self.write_sample_entry();
        }
    }

    fn set_missing(&mut self, index: u32) {
        self.data[index as usize] = -1.0;
        self.missing = true;
        if index as usize == self.data.len() - 1 {
            self.write_sample_entry();
        }
    }

    fn finalise(&mut self) {
        self.emit(b"\n");
    }
}

/// Transcodes every variant the view serves into VCF text.
///
/// Returns the number of variants written.
pub fn transcode_vcf<W, F>(view: &mut View, out: &mut W, mut progress: F) -> Result<u64>
where
    W: Write,
    F: FnMut(u64, u64),
{
    out.write_all(
        b"##fileformat=VCFv4.2\n\
          ##FORMAT=<ID=GT,Type=String,Number=1,Description=\"Threshholded genotype call\">\n\
          ##FORMAT=<ID=GP,Type=Float,Number=G,Description=\"Genotype call probabilities\">\n\
          ##FORMAT=<ID=HP,Type=Float,Number=.,Description=\"Haplotype call probabilities\">\n\
          #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT",
    )?;
    {
        let mut failure = None;
        view.get_sample_ids(|name| {
            if failure.is_none() {
                failure = write!(out, "\t{name}").err();
            }
        })?;
        if let Some(e) = failure {
            return Err(e.into());
        }
    }
    out.write_all(b"\n")?;

    let layout = view.context().layout;
    let mut encoding_tables: HashMap<u8, VcfEncodingTable> = HashMap::new();
    let mut buffer: Vec<u8> = Vec::new();

    let total = u64::from(view.number_of_variants());
    let mut count = 0u64;
    while let Some(v) = view.read_variant()? {
        write!(out, "{}\t{}\t{}", v.chromosome, v.position, v.rsid)?;
        if v.snp_id != v.rsid {
            write!(out, ";{}", v.snp_id)?;
        }
        write!(out, "\t{}\t", v.alleles[0])?;
        for (j, allele) in v.alleles[1..].iter().enumerate() {
            if j > 0 {
                out.write_all(b",")?;
            }
            out.write_all(allele.as_bytes())?;
        }
        out.write_all(b"\t.\t.\t.\tGT:GP")?;

        match layout {
            Layout::V2 => {
                let block = view.read_and_unpack_v2_genotype_data_block()?;
                let fast = matches!(block.bits, 1 | 2 | 4 | 8)
                    && block.ploidy_extent == [2, 2]
                    && !block.phased
                    && block.number_of_alleles == 2;
                if fast {
                    let bits = block.bits;
                    let table = encoding_tables
                        .entry(bits)
                        .or_insert_with(|| compute_vcf_encoding_table(bits));

                    let needed_bits = 2 * bits as usize * block.number_of_samples as usize;
                    if needed_bits > block.buffer.len() * 8 {
                        return Err(ProbabilityError::BufferOverrun {
                            needed: needed_bits.div_ceil(8),
                            have: block.buffer.len(),
                        }
                        .into());
                    }

                    buffer.clear();
                    for (i, &ploidy_byte) in block.ploidy.iter().enumerate() {
                        if ploidy_byte & 0x80 != 0 {
                            buffer.extend_from_slice(b"\t./.");
                        } else {
                            let genotype = read_packed_value(
                                block.buffer,
                                2 * i * bits as usize,
                                2 * bits,
                            ) as usize;
                            buffer.push(b'\t');
                            buffer.extend_from_slice(table.entry(genotype));
                        }
                    }
                    buffer.push(b'\n');
                    out.write_all(&buffer)?;
                } else {
                    let mut writer = VcfProbWriter::new(out);
                    probability::parse_genotype_data_block(&block, &mut writer)?;
                    writer.finish()?;
                }
            }
            Layout::V1 => {
                let mut writer = VcfProbWriter::new(out);
                view.read_genotype_data_block(&mut writer)?;
                writer.finish()?;
            }
        }

        count += 1;
        progress(count, total);
    }
    Ok(count)
}
