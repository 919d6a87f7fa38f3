use crate::{
    core::header::{Header, HeaderBuilder, HeaderDelta},
    error::Vcf2dfError,
    utils::util::Result,
};
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{BufRead, BufReader, Read as ioRead},
    path::Path,
};

pub fn open_vcf_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead>>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }
    let file = File::open(path)
        .map_err(|error| crate::vcf2df_error!("Failed to open file {}: {error}", path.display()))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(Vcf2dfError::InvalidGzipHeader {
                path: path.to_path_buf(),
            })
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

/// Line reader over a VCF stream. The header is parsed on construction and
/// data lines are handed out one at a time with their 1-based line number.
pub struct VcfReader<R: BufRead> {
    reader: R,
    header: Header,
    line_number: usize,
}

impl VcfReader<BufReader<Box<dyn ioRead>>> {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_vcf_reader(path)?;
        Self::new(reader)
    }
}

impl<R: BufRead> VcfReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut builder = HeaderBuilder::new();
        let mut line = String::new();
        let mut line_number = 0;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(Vcf2dfError::MissingColumnHeader);
            }
            line_number += 1;
            if builder.push_line(&line, line_number)? {
                break;
            }
        }
        let header = builder.finish();
        log::debug!(
            "Parsed header: {} INFO fields, {} samples",
            header.infos.len(),
            header.sample_count()
        );
        Ok(VcfReader {
            reader,
            header,
            line_number,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn apply_delta(&mut self, delta: HeaderDelta) {
        self.header.apply(delta);
    }

    /// Reads the next data line into `buf` without its line terminator.
    /// Blank lines are skipped. Returns the line number, or `None` at the end.
    pub fn next_line(&mut self, buf: &mut String) -> Result<Option<usize>> {
        loop {
            buf.clear();
            if self.reader.read_line(buf)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed_len = buf.trim_end_matches(['\r', '\n']).len();
            buf.truncate(trimmed_len);
            if !buf.is_empty() {
                return Ok(Some(self.line_number));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::{make_temp_path, make_temp_vcf};
    use flate2::{write::GzEncoder, Compression};
    use std::{fs, io::Write};

    const VCF: &str = "##fileformat=VCFv4.2\r
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">\r
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\r
1\t100\t.\tA\tG\t50\tPASS\tDP=3\tGT\t0/1\r
\r
1\t200\t.\tC\tT\t50\tPASS\t.\tGT\t1/1\r
";

    fn collect_lines<R: BufRead>(reader: &mut VcfReader<R>) -> Vec<(usize, String)> {
        let mut lines = Vec::new();
        let mut buf = String::new();
        while let Some(n) = reader.next_line(&mut buf).unwrap() {
            lines.push((n, buf.clone()));
        }
        lines
    }

    #[test]
    fn test_reader_plain_text() {
        let path = make_temp_vcf(VCF);
        let mut reader = VcfReader::from_path(&path).unwrap();
        assert_eq!(reader.header().samples, vec!["S1"]);
        assert!(reader.header().info("DP").is_some());
        let lines = collect_lines(&mut reader);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, 4);
        assert_eq!(lines[0].1, "1\t100\t.\tA\tG\t50\tPASS\tDP=3\tGT\t0/1");
        assert_eq!(lines[1].0, 6);
    }

    #[test]
    fn test_reader_gzip() {
        let path = make_temp_path("reader", "vcf.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(VCF.as_bytes()).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let mut reader = VcfReader::from_path(&path).unwrap();
        assert_eq!(collect_lines(&mut reader).len(), 2);
    }

    #[test]
    fn test_reader_rejects_plain_file_with_gz_suffix() {
        let path = make_temp_path("not_gzip", "vcf.gz");
        fs::write(&path, VCF).unwrap();
        assert!(matches!(
            open_vcf_reader(&path),
            Err(Vcf2dfError::InvalidGzipHeader { .. })
        ));
    }

    #[test]
    fn test_reader_missing_column_header() {
        let reader = "##fileformat=VCFv4.2\n##INFO=<ID=DP,Number=1,Type=Integer,Description=\"x\">\n";
        assert!(matches!(
            VcfReader::new(reader.as_bytes()),
            Err(Vcf2dfError::MissingColumnHeader)
        ));
    }

    #[test]
    fn test_reader_unexpected_header_line_reports_line_number() {
        let reader = "##fileformat=VCFv4.2\nnot a header\n";
        assert!(matches!(
            VcfReader::new(reader.as_bytes()),
            Err(Vcf2dfError::UnexpectedHeaderLine { line_number: 2, .. })
        ));
    }
}
