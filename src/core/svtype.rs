use crate::error::Vcf2dfError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvType {
    DELETION,
    DUPLICATION,
    INVERSION,
    LOH,
    BND,
    INSERTION,
    /// Any other SVTYPE value (CNV, TRA, ...), kept verbatim.
    OTHER(String),
}

impl SvType {
    pub fn from_u8(bytes: &[u8]) -> Self {
        match bytes {
            b"DEL" => SvType::DELETION,
            b"DUP" => SvType::DUPLICATION,
            b"INV" => SvType::INVERSION,
            b"LOH" => SvType::LOH,
            b"BND" => SvType::BND,
            b"INS" => SvType::INSERTION,
            other => SvType::OTHER(String::from_utf8_lossy(other).into_owned()),
        }
    }

    /// Span types whose end comes from END or SVLEN.
    pub fn is_interval(&self) -> bool {
        matches!(
            self,
            SvType::DELETION | SvType::DUPLICATION | SvType::INVERSION | SvType::LOH
        )
    }
}

impl std::str::FromStr for SvType {
    type Err = Vcf2dfError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(crate::vcf2df_error!("Invalid SVTYPE: empty value"));
        }
        Ok(Self::from_u8(s.as_bytes()))
    }
}

impl std::fmt::Display for SvType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SvType::DELETION => write!(f, "DEL"),
            SvType::DUPLICATION => write!(f, "DUP"),
            SvType::INVERSION => write!(f, "INV"),
            SvType::LOH => write!(f, "LOH"),
            SvType::BND => write!(f, "BND"),
            SvType::INSERTION => write!(f, "INS"),
            SvType::OTHER(s) => write!(f, "{s}"),
        }
    }
}
