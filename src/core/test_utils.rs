use crate::core::header::Header;
use std::{fs, path::PathBuf};

pub const COLUMN_HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO";

pub fn header_from_info_lines(lines: &[&str]) -> Header {
    header_with_samples(lines, &[])
}

pub fn header_with_samples(lines: &[&str], samples: &[&str]) -> Header {
    let mut column_line = COLUMN_HEADER.to_string();
    if !samples.is_empty() {
        column_line.push_str("\tFORMAT");
        for sample in samples {
            column_line.push('\t');
            column_line.push_str(sample);
        }
    }
    let all_lines = std::iter::once("##fileformat=VCFv4.2")
        .chain(lines.iter().copied())
        .chain(std::iter::once(column_line.as_str()));
    Header::from_lines(all_lines).expect("test header should parse")
}

pub fn make_temp_path(stem: &str, ext: &str) -> PathBuf {
    let prefix = format!("vcf2df_test_{stem}_");
    let suffix = format!(".{ext}");
    let (_, path) = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(&suffix)
        .tempfile_in(std::env::temp_dir())
        .expect("temp file should be creatable")
        .keep()
        .expect("temp file should be persistable");
    path
}

pub fn make_temp_vcf(contents: &str) -> PathBuf {
    let path = make_temp_path("input", "vcf");
    fs::write(&path, contents).expect("test VCF should be writable");
    path
}
