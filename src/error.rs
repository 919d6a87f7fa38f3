use std::{num::TryFromIntError, path::PathBuf};
use thiserror::Error;

pub type Vcf2dfResult<T> = std::result::Result<T, Vcf2dfError>;

#[derive(Debug, Error)]
pub enum Vcf2dfError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    TryFromInt(#[from] TryFromIntError),
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Unexpected header line {line_number}: {line:?}")]
    UnexpectedHeaderLine { line_number: usize, line: String },
    #[error("Input ended before the #CHROM column header line")]
    MissingColumnHeader,
    #[error("Record has {found} samples but the header declares {expected}")]
    SampleCountMismatch { expected: usize, found: usize },
    #[error("{svtype} at {chrom}:{pos} has neither END nor SVLEN")]
    MissingSvEnd {
        chrom: String,
        pos: i64,
        svtype: String,
    },
    #[error("Malformed VCF record: {message}")]
    MalformedRecord { message: String },
    #[error("Row does not match schema: {message}")]
    RowSchemaMismatch { message: String },
    #[error("Invalid gzip header: {}", path.display())]
    InvalidGzipHeader { path: PathBuf },
    #[error("Line {line_number}: {source}")]
    AtLine {
        line_number: usize,
        #[source]
        source: Box<Vcf2dfError>,
    },
}

impl Vcf2dfError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }

    pub fn at_line(self, line_number: usize) -> Self {
        match self {
            err @ Self::AtLine { .. } => err,
            err => Self::AtLine {
                line_number,
                source: Box::new(err),
            },
        }
    }
}

#[macro_export]
macro_rules! vcf2df_error {
    ($($arg:tt)*) => {
        $crate::error::Vcf2dfError::message(format!($($arg)*))
    };
}
