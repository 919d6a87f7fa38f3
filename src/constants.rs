pub const DEFAULT_BATCH_SIZE: usize = 8192;
pub const DEFAULT_OUTPUT_DIR: &str = ".";
pub const PROGRESS_INTERVAL: usize = 100_000;

/// Written to the QUAL column when the record carries `.`.
pub const MISSING_QUAL: f64 = -1.0;

pub const SCHEMA_MESSAGE_NAME: &str = "vcf2df";
pub const PARQUET_EXTENSION: &str = "parquet";

pub const SV_KEY_PREFIX_STRIP: &str = "chr";
