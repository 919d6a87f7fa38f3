pub mod bnd;

pub use bnd::Breakend;

use crate::{
    constants::SV_KEY_PREFIX_STRIP,
    core::{
        genotype::{decode_genotypes, Genotype},
        header::Header,
        info::{InfoBuffer, InfoError, InfoValue},
        svtype::SvType,
    },
    error::Vcf2dfError,
    utils::util::{round_to_i64, Result},
};

#[derive(Debug, Clone, PartialEq)]
pub struct VariantIdentity {
    pub chrom: String,
    /// 0-based
    pub start: i64,
    pub end: i64,
    pub reference: String,
    pub alt: String,
    pub key: String,
    pub is_sv: bool,
    pub svtype: Option<SvType>,
    pub breakend: Option<Breakend>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quality {
    /// `None` when QUAL is `.`
    pub qual: Option<f64>,
    pub filter: String,
    pub read_depth: Option<i32>,
    pub read_depth_ref: Option<i32>,
    pub read_depth_alt: Option<i32>,
    pub snp_count: Option<i32>,
}

/// One data line decoded against the header. `info` borrows the line.
#[derive(Debug, Clone)]
pub struct DecodedRecord<'a> {
    pub identity: VariantIdentity,
    pub quality: Quality,
    pub genotypes: Vec<Genotype>,
    pub info: InfoBuffer<'a>,
}

#[derive(Debug, Clone)]
pub enum ExtractedRecord<'a> {
    /// `*` ALT: placeholder for an overlapping deletion, produces no rows.
    Skip,
    Variant(DecodedRecord<'a>),
}

/// Reads an annotation, treating header drift and count mismatches as
/// values and everything else as absent.
pub(crate) fn lenient_get(info: &InfoBuffer, key: &str) -> Option<InfoValue> {
    match info.get(key) {
        Ok(InfoValue::Missing) => None,
        Ok(value) => Some(value),
        Err(InfoError::NotInHeader { value, .. }) | Err(InfoError::CountMismatch { value, .. }) => {
            (value != InfoValue::Missing).then_some(value)
        }
        Err(InfoError::NotInBuffer { .. }) => None,
        Err(err) => {
            log::warn!("{err}");
            None
        }
    }
}

fn key_chrom(chrom: &str) -> &str {
    chrom.strip_prefix(SV_KEY_PREFIX_STRIP).unwrap_or(chrom)
}

fn extract_identity(
    chrom: &str,
    start: i64,
    reference: &str,
    alt: &str,
    svtype: Option<SvType>,
    info: &InfoBuffer,
) -> Result<VariantIdentity> {
    let ref_end = start + reference.len() as i64;
    let key_chrom = key_chrom(chrom);
    let mut identity = VariantIdentity {
        chrom: chrom.to_string(),
        start,
        end: ref_end,
        reference: reference.to_string(),
        alt: String::new(),
        key: String::new(),
        is_sv: svtype.is_some(),
        svtype: None,
        breakend: None,
    };

    match &svtype {
        Some(sv) if sv.is_interval() => {
            let end = match lenient_get(info, "END").and_then(|v| v.as_i32()) {
                Some(end) => i64::from(end),
                None => match lenient_get(info, "SVLEN").and_then(|v| v.as_i32()) {
                    Some(svlen) => start + i64::from(svlen).abs(),
                    None => {
                        return Err(Vcf2dfError::MissingSvEnd {
                            chrom: chrom.to_string(),
                            pos: start + 1,
                            svtype: sv.to_string(),
                        })
                    }
                },
            };
            identity.end = end;
            identity.reference.clear();
        }
        Some(SvType::BND) => {
            identity.end = start + 1;
            identity.reference.clear();
            identity.breakend = Breakend::parse_alt(alt)
                .map_err(|e| log::warn!("{chrom}:{}: {e}", start + 1))
                .ok();
        }
        Some(SvType::INSERTION) => identity.end = start + 1,
        Some(_) => {}
        None => {
            identity.alt = alt.replace('.', "").to_uppercase();
            identity.key = format!("{key_chrom}-{}-{}-{}", start + 1, reference, identity.alt);
        }
    }

    if let Some(sv) = svtype {
        identity.key = format!("{key_chrom}-{}-{}-{sv}", start + 1, identity.end);
        identity.svtype = Some(sv);
    }
    Ok(identity)
}

/// Splits `dp` into (ref, alt) depths with `ab` as the alt percentage.
/// `None` when either depth does not fit in an `i32`.
fn split_depth(dp: i32, ab: f64) -> Option<(i32, i32)> {
    let alt = f64::from(dp) * ab / 100.0;
    if !alt.is_finite() || alt.abs() > f64::from(i32::MAX) {
        return None;
    }
    let alt_depth = i32::try_from(round_to_i64(alt)).ok()?;
    Some((dp.checked_sub(alt_depth)?, alt_depth))
}

fn extract_quality(fields: &[&str], info: &InfoBuffer) -> Result<Quality> {
    let qual = match fields[5] {
        "." => None,
        text => Some(text.parse::<f64>().map_err(|e| {
            Vcf2dfError::malformed(format!("invalid QUAL {text:?}: {e}"))
        })?),
    };

    let read_depth = lenient_get(info, "DP").and_then(|v| v.as_i32());
    let allele_balance = lenient_get(info, "AB")
        .or_else(|| lenient_get(info, "_AB"))
        .and_then(|v| v.as_f64());
    let (read_depth_ref, read_depth_alt) = match (read_depth, allele_balance) {
        (Some(dp), Some(ab)) => match split_depth(dp, ab) {
            Some((ref_depth, alt_depth)) => (Some(ref_depth), Some(alt_depth)),
            None => {
                log::warn!(
                    "{}:{}: DP={dp} with AB={ab} gives depths outside the integer range",
                    fields[0],
                    fields[1]
                );
                (None, None)
            }
        },
        _ => (None, None),
    };

    Ok(Quality {
        qual,
        filter: fields[6].to_string(),
        read_depth,
        read_depth_ref,
        read_depth_alt,
        snp_count: lenient_get(info, "NUMSNP").and_then(|v| v.as_i32()),
    })
}

/// Decodes one tab-separated data line.
pub fn extract_record<'a>(line: &'a str, header: &'a Header) -> Result<ExtractedRecord<'a>> {
    let fields: Vec<&'a str> = line.split('\t').collect();
    if fields.len() < 8 {
        return Err(Vcf2dfError::malformed(format!(
            "expected at least 8 columns, found {}",
            fields.len()
        )));
    }

    let alt = fields[4];
    if alt == "*" {
        return Ok(ExtractedRecord::Skip);
    }
    let alt_count = alt.split(',').count();
    if alt_count > 1 {
        log::warn!(
            "Record {}:{} has {alt_count} ALT alleles; input should be split to one ALT per line",
            fields[0],
            fields[1]
        );
    }

    let pos: i64 = fields[1]
        .parse()
        .map_err(|e| Vcf2dfError::malformed(format!("invalid POS {:?}: {e}", fields[1])))?;
    let chrom = fields[0];
    let start = pos - 1;
    let reference = fields[3].to_uppercase();

    let info = InfoBuffer::new(fields[7].as_bytes(), header, alt_count);
    let svtype = lenient_get(&info, "SVTYPE")
        .map(|v| v.to_string())
        .filter(|s| !s.is_empty())
        .map(|s| SvType::from_u8(s.as_bytes()));

    let identity = extract_identity(chrom, start, &reference, alt, svtype, &info)?;
    let quality = extract_quality(&fields, &info)?;
    let copy_number = lenient_get(&info, "CN").and_then(|v| v.as_i32());
    let genotypes = decode_genotypes(&fields, header, identity.svtype.as_ref(), copy_number)?;

    Ok(ExtractedRecord::Variant(DecodedRecord {
        identity,
        quality,
        genotypes,
        info,
    }))
}
