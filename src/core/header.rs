use crate::{core::info::InfoValue, error::Vcf2dfError, utils::util::Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::BTreeMap, fmt, str::FromStr};

static INFO_RE: Lazy<Regex> = Lazy::new(|| field_regex("INFO"));
static FORMAT_RE: Lazy<Regex> = Lazy::new(|| field_regex("FORMAT"));
static FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^##FILTER=<ID=(.+),Description="(.*)">$"#).expect("Invalid FILTER regex")
});
static SAMPLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SAMPLE=<ID=([^,>]+)").expect("Invalid SAMPLE regex"));
static FILE_FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^##fileformat=VCFv(.+)$").expect("Invalid fileformat regex"));

fn field_regex(kind: &str) -> Regex {
    Regex::new(&format!(
        r#"^##{kind}=<ID=(.+),Number=([\dAGR.]*),Type=(String|Integer|Float|Flag|Character|Unknown),Description="(.*)">$"#
    ))
    .expect("Invalid field definition regex")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Float,
    Flag,
    String,
    Character,
}

impl FromStr for ValueType {
    type Err = Vcf2dfError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Integer" => Ok(ValueType::Integer),
            "Float" => Ok(ValueType::Float),
            "Flag" => Ok(ValueType::Flag),
            "String" | "Unknown" => Ok(ValueType::String),
            "Character" => Ok(ValueType::Character),
            _ => Err(crate::vcf2df_error!("Invalid header Type: {s:?}")),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Integer => write!(f, "Integer"),
            ValueType::Float => write!(f, "Float"),
            ValueType::Flag => write!(f, "Flag"),
            ValueType::String => write!(f, "String"),
            ValueType::Character => write!(f, "Character"),
        }
    }
}

/// Declared multiplicity of an INFO or FORMAT field.
///
/// `Fixed(0)` is the flag multiplicity; an empty `Number=` is read as
/// `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Number {
    Fixed(u32),
    A,
    R,
    G,
    Unbounded,
}

impl Number {
    /// Expected element count for a record with `alt_count` alternate alleles.
    /// `None` means the count is not checked.
    pub fn expected_count(&self, alt_count: usize) -> Option<usize> {
        match self {
            Number::Fixed(n) => Some(*n as usize),
            Number::A => Some(alt_count),
            Number::R => Some(alt_count + 1),
            Number::G => {
                let alleles = alt_count + 1;
                Some(alleles * (alleles + 1) / 2)
            }
            Number::Unbounded => None,
        }
    }
}

impl FromStr for Number {
    type Err = Vcf2dfError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(Number::A),
            "R" => Ok(Number::R),
            "G" => Ok(Number::G),
            "." | "" => Ok(Number::Unbounded),
            n => n
                .parse::<u32>()
                .map(Number::Fixed)
                .map_err(|_| crate::vcf2df_error!("Invalid header Number: {n:?}")),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Fixed(n) => write!(f, "{n}"),
            Number::A => write!(f, "A"),
            Number::R => write!(f, "R"),
            Number::G => write!(f, "G"),
            Number::Unbounded => write!(f, "."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub id: String,
    pub number: Number,
    pub value_type: ValueType,
    pub description: String,
}

pub type AnnotationField = FieldDefinition;
pub type SampleFormatField = FieldDefinition;

impl FieldDefinition {
    pub fn is_flag(&self) -> bool {
        self.value_type == ValueType::Flag
    }

    fn from_captures(caps: &regex::Captures) -> Result<Self> {
        Ok(FieldDefinition {
            id: caps[1].to_string(),
            number: caps[2].parse()?,
            value_type: caps[3].parse()?,
            description: caps[4].to_string(),
        })
    }

    /// Renders the definition as a `##INFO`/`##FORMAT` metadata line.
    pub fn to_line(&self, kind: &str) -> String {
        format!(
            "##{kind}=<ID={},Number={},Type={},Description=\"{}\">",
            self.id, self.number, self.value_type, self.description
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Header {
    pub file_format: Option<String>,
    pub samples: Vec<String>,
    pub infos: BTreeMap<String, AnnotationField>,
    pub formats: BTreeMap<String, SampleFormatField>,
    pub filters: BTreeMap<String, String>,
    /// Attribute lists of `##contig` lines in file order; each carries `ID`.
    pub contigs: Vec<Vec<(String, String)>>,
    /// `##SAMPLE` lines keyed by sample id.
    pub sample_lines: BTreeMap<String, String>,
    pub pedigrees: Vec<String>,
    pub platform: Option<String>,
    pub extras: Vec<String>,
}

impl Header {
    pub fn info(&self, id: &str) -> Option<&AnnotationField> {
        self.infos.get(id)
    }

    pub fn format(&self, id: &str) -> Option<&SampleFormatField> {
        self.formats.get(id)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Parses a full header, stopping at the `#CHROM` line.
    pub fn from_lines<'a, I>(lines: I) -> Result<Header>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut builder = HeaderBuilder::new();
        for (idx, line) in lines.into_iter().enumerate() {
            if builder.push_line(line, idx + 1)? {
                return Ok(builder.finish());
            }
        }
        Err(Vcf2dfError::MissingColumnHeader)
    }

    /// Registers every field collected in `delta`, replacing existing definitions.
    pub fn apply(&mut self, delta: HeaderDelta) {
        for field in delta.infos {
            log::debug!("Registering synthesized INFO field {}", field.to_line("INFO"));
            self.infos.insert(field.id.clone(), field);
        }
    }
}

/// Incremental header parser fed one metadata line at a time.
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    header: Header,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one header line. Returns `true` once the `#CHROM` line is seen.
    pub fn push_line(&mut self, line: &str, line_number: usize) -> Result<bool> {
        let line = line.trim_end_matches(['\r', '\n']);
        let header = &mut self.header;

        if line.starts_with("##fileformat") {
            match FILE_FORMAT_RE.captures(line) {
                Some(caps) => header.file_format = Some(caps[1].to_string()),
                None => skip_line(line_number, "fileformat", line),
            }
        } else if line.starts_with("##INFO") {
            match parse_field(&INFO_RE, line) {
                Some(field) => {
                    header.infos.insert(field.id.clone(), field);
                }
                None => skip_line(line_number, "INFO", line),
            }
        } else if line.starts_with("##FORMAT") {
            match parse_field(&FORMAT_RE, line) {
                Some(field) => {
                    header.formats.insert(field.id.clone(), field);
                }
                None => skip_line(line_number, "FORMAT", line),
            }
        } else if line.starts_with("##FILTER") {
            match FILTER_RE.captures(line) {
                Some(caps) => {
                    header
                        .filters
                        .insert(caps[1].to_string(), caps[2].to_string());
                }
                None => skip_line(line_number, "FILTER", line),
            }
        } else if line.starts_with("##contig") {
            match parse_contig(line) {
                Some(attrs) => header.contigs.push(attrs),
                None => skip_line(line_number, "contig", line),
            }
        } else if line.starts_with("##SAMPLE") {
            match SAMPLE_RE.captures(line) {
                Some(caps) => {
                    header
                        .sample_lines
                        .insert(caps[1].to_string(), line.to_string());
                }
                None => skip_line(line_number, "SAMPLE", line),
            }
        } else if line.starts_with("##PEDIGREE") {
            header.pedigrees.push(line.to_string());
        } else if let Some(platform) = line.strip_prefix("##PLATFORM=") {
            header.platform = Some(platform.to_string());
        } else if let Some(rest) = line.strip_prefix("##") {
            if rest.trim_start().contains('=') {
                header.extras.push(line.to_string());
            } else {
                skip_line(line_number, "key=value", line);
            }
        } else if line.starts_with("#CHROM") {
            header.samples = line.split('\t').skip(9).map(str::to_string).collect();
            return Ok(true);
        } else {
            return Err(Vcf2dfError::UnexpectedHeaderLine {
                line_number,
                line: line.to_string(),
            });
        }
        Ok(false)
    }

    pub fn finish(self) -> Header {
        self.header
    }
}

fn skip_line(line_number: usize, kind: &str, line: &str) {
    log::warn!("Skipping malformed {kind} header line {line_number}: {line}");
}

fn parse_field(re: &Regex, line: &str) -> Option<FieldDefinition> {
    let caps = re.captures(line)?;
    FieldDefinition::from_captures(&caps)
        .map_err(|e| log::warn!("{e}"))
        .ok()
}

fn parse_contig(line: &str) -> Option<Vec<(String, String)>> {
    let body = line.strip_prefix("##contig=<")?;
    let body = body.strip_suffix('>').unwrap_or(body);
    let mut attrs = Vec::new();
    for pair in split_unquoted(body, ',') {
        let (key, value) = pair.trim_start().split_once('=')?;
        attrs.push((key.to_string(), value.trim_matches('"').to_string()));
    }
    let has_id = attrs.iter().any(|(key, _)| key == "ID");
    has_id.then_some(attrs)
}

fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Field definitions to be registered on a header after decoding.
#[derive(Debug, Clone, Default)]
pub struct HeaderDelta {
    infos: Vec<FieldDefinition>,
}

impl HeaderDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a definition for `key` synthesized from the shape of `value`.
    pub fn register(&mut self, key: &str, value: &InfoValue) {
        if let Some(field) = synthesize_field(key, value) {
            self.infos.retain(|f| f.id != key);
            self.infos.push(field);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.infos
    }
}

/// Builds a definition from a value's shape. Arrays take their element type.
pub fn synthesize_field(key: &str, value: &InfoValue) -> Option<FieldDefinition> {
    let (number, value_type) = match value {
        InfoValue::Bool(_) => (Number::Fixed(0), ValueType::Flag),
        InfoValue::String(_) | InfoValue::StringArray(_) => (Number::Fixed(1), ValueType::Character),
        InfoValue::Int(_) | InfoValue::IntArray(_) => (Number::Fixed(1), ValueType::Integer),
        InfoValue::Float(_) | InfoValue::FloatArray(_) => (Number::Fixed(1), ValueType::Float),
        InfoValue::Missing => return None,
    };
    Some(FieldDefinition {
        id: key.to_string(),
        number,
        value_type,
        description: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">
##INFO=<ID=NOTES,Number=,Type=String,Description=\"Free text\">
##INFO=<ID=BROKEN,Number=1,Type=Decimal,Description=\"Bad type\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FILTER=<ID=q10,Description=\"Quality below 10\">
##contig=<ID=20,length=62435964,assembly=B36,md5=f126cdf8a6e0c7f379d618ff66beb2da,species=\"Homo sapiens\",taxonomy=x>
##contig=<length=100>
##SAMPLE=<ID=NA00001,Genomes=Germline>
##PEDIGREE=<Child=CHILD,Mother=MOTHER>
##PLATFORM=Illumina
##reference=file:///seq/references/1000GenomesPilot-NCBI36.fasta
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA00001\tNA00002";

    #[test]
    fn test_header_parses_all_line_classes() {
        let header = Header::from_lines(HEADER.lines()).unwrap();
        assert_eq!(header.file_format.as_deref(), Some("4.2"));
        assert_eq!(header.samples, vec!["NA00001", "NA00002"]);
        assert_eq!(header.infos.len(), 4);
        assert_eq!(header.info("AF").unwrap().number, Number::A);
        assert_eq!(header.info("DB").unwrap().value_type, ValueType::Flag);
        assert_eq!(header.info("NOTES").unwrap().number, Number::Unbounded);
        assert!(header.info("BROKEN").is_none());
        assert_eq!(header.format("GT").unwrap().value_type, ValueType::String);
        assert_eq!(header.filters["q10"], "Quality below 10");
        assert_eq!(header.contigs.len(), 1);
        assert!(header.contigs[0]
            .iter()
            .any(|(k, v)| k == "species" && v == "Homo sapiens"));
        assert!(header.sample_lines.contains_key("NA00001"));
        assert_eq!(header.pedigrees.len(), 1);
        assert_eq!(header.platform.as_deref(), Some("Illumina"));
        assert_eq!(header.extras.len(), 1);
    }

    #[test]
    fn test_header_without_samples() {
        let header = Header::from_lines(
            ["##fileformat=VCFv4.1", "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO"],
        )
        .unwrap();
        assert_eq!(header.sample_count(), 0);
    }

    #[test]
    fn test_header_unexpected_line_is_fatal() {
        let err = Header::from_lines(["##fileformat=VCFv4.2", "chr1\t1", "#CHROM"]).unwrap_err();
        assert!(matches!(
            err,
            Vcf2dfError::UnexpectedHeaderLine { line_number: 2, .. }
        ));
    }

    #[test]
    fn test_header_missing_column_line() {
        let err = Header::from_lines(["##fileformat=VCFv4.2"]).unwrap_err();
        assert!(matches!(err, Vcf2dfError::MissingColumnHeader));
    }

    #[test]
    fn test_number_expected_count() {
        assert_eq!(Number::A.expected_count(1), Some(1));
        assert_eq!(Number::R.expected_count(1), Some(2));
        assert_eq!(Number::G.expected_count(1), Some(3));
        assert_eq!(Number::G.expected_count(2), Some(6));
        assert_eq!(Number::Fixed(3).expected_count(1), Some(3));
        assert_eq!(Number::Unbounded.expected_count(1), None);
    }

    #[test]
    fn test_field_definition_line_round_trip() {
        let header = Header::from_lines(HEADER.lines()).unwrap();
        let line = header.info("AF").unwrap().to_line("INFO");
        assert_eq!(
            line,
            "##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">"
        );
    }

    #[test]
    fn test_header_delta_applies_synthesized_fields() {
        let mut header = Header::from_lines(HEADER.lines()).unwrap();
        let mut delta = HeaderDelta::new();
        delta.register("SOMATIC", &InfoValue::Bool(true));
        delta.register("SCORE", &InfoValue::FloatArray(vec![0.5]));
        delta.register("LABEL", &InfoValue::String("x".to_string()));
        delta.register("EMPTY", &InfoValue::Missing);
        assert_eq!(delta.fields().len(), 3);

        header.apply(delta);
        let somatic = header.info("SOMATIC").unwrap();
        assert_eq!(somatic.number, Number::Fixed(0));
        assert!(somatic.is_flag());
        let score = header.info("SCORE").unwrap();
        assert_eq!((score.number, score.value_type), (Number::Fixed(1), ValueType::Float));
        assert_eq!(header.info("LABEL").unwrap().value_type, ValueType::Character);
        assert!(header.info("EMPTY").is_none());
    }
}
