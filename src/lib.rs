pub mod cli;
pub mod error;

pub mod commands {
    pub mod convert;
}

pub mod core {
    pub mod genotype;
    pub mod header;
    pub mod info;
    pub mod row;
    pub mod schema;
    pub mod svtype;
    pub mod variant;
    #[cfg(test)]
    pub mod test_utils;
}

pub mod io {
    pub mod parquet_writer;
    pub mod vcf_reader;
}

pub mod utils {
    pub mod util;
}

pub mod constants;

pub use constants::*;
