use crate::{
    core::{header::Header, svtype::SvType},
    error::Vcf2dfError,
    utils::util::Result,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Genotype {
    pub sample: String,
    pub num_alts: i32,
    pub is_phased: bool,
    pub phase_id: String,
    pub read_depth_ref: Option<i32>,
    pub read_depth_alt: Option<i32>,
}

/// Maps a copy number onto an allele count: 2→0, 1→1, 0→2, otherwise CN-2.
pub fn num_alts_from_copy_number(cn: i32) -> i32 {
    match cn {
        2 => 0,
        1 => 1,
        0 => 2,
        n => n - 2,
    }
}

fn decode_call(call: &str) -> (i32, bool) {
    let num_alts = match call {
        "0/0" | "0|0" | "./." | ".|." => 0,
        "0/1" | "0|1" | "1/0" | "1|0" => 1,
        "1/1" | "1|1" => 2,
        _ => 0,
    };
    (num_alts, call.contains('|'))
}

fn decode_allele_depth(ad: &str) -> Option<(i32, i32)> {
    let (ref_depth, alt_depth) = ad.split_once(',')?;
    if alt_depth.contains(',') {
        return None;
    }
    let parse = |s: &str| -> Option<i32> {
        if s == "." {
            return Some(0);
        }
        s.parse()
            .map_err(|e| log::warn!("Ignoring AD {ad:?}: {e}"))
            .ok()
    };
    Some((parse(ref_depth)?, parse(alt_depth)?))
}

fn decode_sample(name: &str, format_keys: &[&str], sample: &str) -> Genotype {
    let mut genotype = Genotype {
        sample: name.to_string(),
        ..Default::default()
    };
    let mut call = None;
    let mut phased_call = None;
    for (key, value) in format_keys.iter().zip(sample.split(':')) {
        match *key {
            "GT" => call = Some(value),
            "PGT" => phased_call = Some(value),
            "PID" => genotype.phase_id = value.to_string(),
            "AD" => {
                if let Some((ref_depth, alt_depth)) = decode_allele_depth(value) {
                    genotype.read_depth_ref = Some(ref_depth);
                    genotype.read_depth_alt = Some(alt_depth);
                }
            }
            _ => {}
        }
    }
    if let Some(call) = phased_call.or(call) {
        (genotype.num_alts, genotype.is_phased) = decode_call(call);
    }
    genotype
}

/// Decodes every sample column of a record split on tabs.
///
/// `copy_number` is the record's `CN` annotation; it overrides the allele
/// count on structural variants. LOH records always carry one alt allele.
pub fn decode_genotypes(
    fields: &[&str],
    header: &Header,
    svtype: Option<&SvType>,
    copy_number: Option<i32>,
) -> Result<Vec<Genotype>> {
    if fields.len() < 9 {
        return Ok(Vec::new());
    }
    let samples = &fields[9..];
    if samples.len() != header.sample_count() {
        return Err(Vcf2dfError::SampleCountMismatch {
            expected: header.sample_count(),
            found: samples.len(),
        });
    }

    let format_keys: Vec<&str> = fields[8].split(':').collect();
    let genotypes = header
        .samples
        .iter()
        .zip(samples)
        .map(|(name, sample)| {
            let mut genotype = decode_sample(name, &format_keys, sample);
            if let (Some(_), Some(cn)) = (svtype, copy_number) {
                genotype.num_alts = num_alts_from_copy_number(cn);
            }
            if svtype == Some(&SvType::LOH) {
                genotype.num_alts = 1;
            }
            genotype
        })
        .collect();
    Ok(genotypes)
}
