//! Test support: synthesizes complete BGEN files through the crate's
//! own encoders so reader-side modules can exercise real byte streams.

use std::fs;
use std::path::Path;

use crate::compress;
use crate::context::{self, Compression, Context, Layout};
use crate::endian;
use crate::error::Result;
use crate::probability::{
    self, OrderType, ProbabilitySink, SampleProbabilities, ValueType,
};
use crate::variant::{self, Variant};

pub(crate) struct SyntheticVariant {
    pub variant: Variant,
    pub samples: Vec<SampleProbabilities>,
    pub bits: u8,
    pub phased: bool,
}

impl SyntheticVariant {
    pub fn with_samples(mut self, samples: Vec<SampleProbabilities>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_bits(mut self, bits: u8) -> Self {
        self.bits = bits;
        self
    }

    pub fn with_phased(mut self, phased: bool) -> Self {
        self.phased = phased;
        self
    }
}

pub(crate) fn variant(
    snp_id: &str,
    rsid: &str,
    chromosome: &str,
    position: u32,
    alleles: &[&str],
) -> SyntheticVariant {
    SyntheticVariant {
        variant: Variant {
            snp_id: snp_id.into(),
            rsid: rsid.into(),
            chromosome: chromosome.into(),
            position,
            alleles: alleles.iter().map(|a| (*a).to_string()).collect(),
        },
        samples: Vec::new(),
        bits: 8,
        phased: false,
    }
}

pub(crate) fn build_context(
    layout: Layout,
    compression: Compression,
    number_of_samples: u32,
    number_of_variants: u32,
    has_sample_identifiers: bool,
    free_data: &[u8],
) -> Context {
    Context {
        layout,
        compression,
        has_sample_identifiers,
        number_of_samples,
        number_of_variants,
        free_data: free_data.to_vec(),
    }
}

/// Appends one variant (identifying block + probability block) to `out`.
pub(crate) fn append_variant(out: &mut Vec<u8>, context: &Context, sv: &SyntheticVariant) {
    variant::write_variant(out, context, &sv.variant).unwrap();
    append_probability_block(out, context, sv).unwrap();
}

fn append_probability_block(
    out: &mut Vec<u8>,
    context: &Context,
    sv: &SyntheticVariant,
) -> Result<()> {
    match context.layout {
        Layout::V2 => {
            let payload = probability::encode_probability_data_v2(
                sv.variant.number_of_alleles(),
                sv.phased,
                sv.bits,
                &sv.samples,
            )?;
            match context.compression {
                Compression::None => {
                    endian::write_u32(out, payload.len() as u32)?;
                    endian::write_bytes(out, &payload)?;
                }
                kind => {
                    let packed = compress::compress(kind, &payload, 6)?;
                    endian::write_u32(out, packed.len() as u32 + 4)?;
                    endian::write_u32(out, payload.len() as u32)?;
                    endian::write_bytes(out, &packed)?;
                }
            }
        }
        Layout::V1 => {
            let payload = probability::encode_probability_data_v1(&sv.samples)?;
            match context.compression {
                Compression::None => endian::write_bytes(out, &payload)?,
                kind => {
                    let packed = compress::compress(kind, &payload, 6)?;
                    endian::write_u32(out, packed.len() as u32)?;
                    endian::write_bytes(out, &packed)?;
                }
            }
        }
    }
    Ok(())
}

/// Assembles a whole file image: offset, header, optional sample block,
/// then the variant stream.
pub(crate) fn encode_file(
    context: &Context,
    sample_ids: Option<&[&str]>,
    variants: &[SyntheticVariant],
) -> Vec<u8> {
    let sample_block = sample_ids.map(|ids| {
        let mut block = Vec::new();
        let body: usize = ids.iter().map(|id| 2 + id.len()).sum();
        endian::write_u32(&mut block, 8 + body as u32).unwrap();
        endian::write_u32(&mut block, ids.len() as u32).unwrap();
        for id in ids {
            endian::write_u16_prefixed_string(&mut block, id).unwrap();
        }
        block
    });

    let mut out = Vec::new();
    let offset =
        context.header_size() + sample_block.as_ref().map_or(0, |b| b.len() as u32);
    context::write_offset(&mut out, offset).unwrap();
    context::write_header_block(&mut out, context).unwrap();
    if let Some(block) = &sample_block {
        out.extend_from_slice(block);
    }
    for sv in variants {
        append_variant(&mut out, context, sv);
    }
    out
}

pub(crate) fn write_layout2_file(
    path: &Path,
    sample_ids: &[&str],
    variants: &[SyntheticVariant],
) {
    let context = build_context(
        Layout::V2,
        Compression::Zlib,
        sample_ids.len() as u32,
        variants.len() as u32,
        true,
        b"",
    );
    fs::write(path, encode_file(&context, Some(sample_ids), variants)).unwrap();
}

pub(crate) fn write_layout2_file_without_ids(
    path: &Path,
    number_of_samples: u32,
    variants: &[SyntheticVariant],
) {
    let context = build_context(
        Layout::V2,
        Compression::Zlib,
        number_of_samples,
        variants.len() as u32,
        false,
        b"",
    );
    fs::write(path, encode_file(&context, None, variants)).unwrap();
}

/// Sink collecting every delivered value, `None` for missing entries
#[derive(Default)]
pub(crate) struct CollectingSink {
    pub number_of_alleles: u16,
    pub per_sample: Vec<Vec<Option<f64>>>,
    pub orders: Vec<OrderType>,
}

impl ProbabilitySink for CollectingSink {
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
        self.per_sample.last_mut().unwrap()[index as usize] = Some(value);
    }
    fn set_missing(&mut self, _index: u32) {}
    fn finalise(&mut self) {}
}
