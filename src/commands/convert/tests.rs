use super::{collect_undeclared, convert, convert_file, output_path, ConversionStats, ConvertOptions};
use crate::cli::{Cli, Command, ConvertArgs};
use crate::core::{
    header::ValueType,
    row::RowMode,
    test_utils::{make_temp_path, make_temp_vcf},
};
use crate::error::Vcf2dfError;
use crate::utils::util::init_logger;
use arrow::{
    array::{Array, BooleanArray, Float64Array, Int32Array, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use clap::Parser;
use flate2::{write::GzEncoder, Compression};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::{tempdir, TempDir};

const VCF: &str = "##fileformat=VCFv4.2
##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type of structural variant\">
##INFO=<ID=END,Number=1,Type=Integer,Description=\"End position\">
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2
1\t100\t.\tA\tG\t50\tPASS\tDP=10;AF=0.5\tGT\t0/1\t0/0
1\t150\t.\tC\t*\t50\tPASS\tDP=3\tGT\t0/1\t0/1
chr2\t200\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=500\tGT\t1/1\t0|1
";

fn parse_convert_args(args: &[&str]) -> ConvertArgs {
    let parsed = Cli::try_parse_from(args).expect("CLI parse should succeed");
    let Command::Convert(args) = parsed.command;
    args
}

fn options(out_dir: &Path, mode: RowMode) -> ConvertOptions {
    ConvertOptions {
        out_dir: out_dir.to_path_buf(),
        mode,
        batch_size: 2,
        declare_undeclared: false,
    }
}

fn read_parquet(path: &Path) -> Vec<RecordBatch> {
    let file = File::open(path).expect("parquet output should exist");
    ParquetRecordBatchReaderBuilder::try_new(file)
        .expect("parquet metadata should be readable")
        .build()
        .expect("parquet reader should build")
        .map(|batch| batch.expect("batch should decode"))
        .collect()
}

fn strings(batches: &[RecordBatch], name: &str) -> Vec<String> {
    batches
        .iter()
        .flat_map(|batch| {
            let idx = batch.schema().index_of(name).expect("column should exist");
            let column = batch.column(idx).as_any().downcast_ref::<StringArray>().unwrap();
            (0..column.len())
                .map(|i| column.value(i).to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn ints(batches: &[RecordBatch], name: &str) -> Vec<i32> {
    batches
        .iter()
        .flat_map(|batch| {
            let idx = batch.schema().index_of(name).expect("column should exist");
            let column = batch.column(idx).as_any().downcast_ref::<Int32Array>().unwrap();
            column.values().to_vec()
        })
        .collect()
}

fn doubles(batches: &[RecordBatch], name: &str) -> Vec<f64> {
    batches
        .iter()
        .flat_map(|batch| {
            let idx = batch.schema().index_of(name).expect("column should exist");
            let column = batch.column(idx).as_any().downcast_ref::<Float64Array>().unwrap();
            column.values().to_vec()
        })
        .collect()
}

fn bools(batches: &[RecordBatch], name: &str) -> Vec<bool> {
    batches
        .iter()
        .flat_map(|batch| {
            let idx = batch.schema().index_of(name).expect("column should exist");
            let column = batch.column(idx).as_any().downcast_ref::<BooleanArray>().unwrap();
            (0..column.len()).map(|i| column.value(i)).collect::<Vec<_>>()
        })
        .collect()
}

fn convert_fixture(contents: &str, mode: RowMode) -> (TempDir, ConversionStats, Vec<RecordBatch>) {
    init_logger();
    let input = make_temp_vcf(contents);
    let out_dir = tempdir().expect("temp dir should be created");
    let stats = convert_file(&input, &options(out_dir.path(), mode)).expect("conversion should succeed");
    let batches = read_parquet(&output_path(&input, out_dir.path()));
    (out_dir, stats, batches)
}

#[test]
fn test_convert_per_sample_rows() {
    let (_out_dir, stats, batches) = convert_fixture(VCF, RowMode::PerSample);
    assert_eq!(
        stats,
        ConversionStats {
            lines: 3,
            variants: 2,
            skipped: 1,
            rows: 3
        }
    );

    let schema = batches[0].schema();
    assert_eq!(schema.fields().len(), 16);
    assert_eq!(schema.field(14).name(), "AF");
    assert_eq!(schema.field(15).name(), "DP");
    assert!(schema.fields().iter().all(|f| !f.is_nullable()));

    assert_eq!(
        strings(&batches, "VARIANTKEY"),
        vec!["1-100-A-G", "2-200-500-DEL", "2-200-500-DEL"]
    );
    assert_eq!(strings(&batches, "SAMPLE"), vec!["S1", "S1", "S2"]);
    assert_eq!(strings(&batches, "SVTYPE"), vec!["", "DEL", "DEL"]);
    assert_eq!(ints(&batches, "POS"), vec![100, 200, 200]);
    assert_eq!(ints(&batches, "END"), vec![100, 500, 500]);
    assert_eq!(ints(&batches, "NUMALTS"), vec![1, 2, 1]);
    assert_eq!(ints(&batches, "DP"), vec![10, 0, 0]);
    assert_eq!(doubles(&batches, "QUAL"), vec![50.0, -1.0, -1.0]);
    assert_eq!(doubles(&batches, "AF"), vec![0.5, 0.0, 0.0]);
    assert_eq!(bools(&batches, "IS_SV"), vec![false, true, true]);
    assert_eq!(bools(&batches, "IS_PHASED"), vec![false, false, true]);
}

#[test]
fn test_convert_per_record_rows() {
    let (_out_dir, stats, batches) = convert_fixture(VCF, RowMode::PerRecord);
    assert_eq!(stats.rows, 2);
    assert_eq!(strings(&batches, "SAMPLE"), vec!["S1", "S1"]);
    assert_eq!(ints(&batches, "NUMALTS"), vec![1, 2]);
}

#[test]
fn test_convert_gzip_input() {
    init_logger();
    let input = make_temp_path("convert_gz", "vcf.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(VCF.as_bytes()).unwrap();
    fs::write(&input, encoder.finish().unwrap()).unwrap();

    let out_dir = tempdir().unwrap();
    let stats = convert_file(&input, &options(out_dir.path(), RowMode::PerSample)).unwrap();
    assert_eq!(stats.rows, 3);

    let out_path = output_path(&input, out_dir.path());
    assert_eq!(out_path.extension().and_then(|e| e.to_str()), Some("parquet"));
    let name = out_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(!name.ends_with("_vcf_gz.parquet"), "unexpected output name {name}");
    let batches = read_parquet(&out_path);
    assert_eq!(strings(&batches, "CHROM"), vec!["1", "chr2", "chr2"]);
}

#[test]
fn test_convert_reports_line_of_fatal_record() {
    init_logger();
    let contents = format!("{VCF}1\t300\t.\tA\tT\t50\tPASS\t.\tGT\t0/1\n");
    let input = make_temp_vcf(&contents);
    let out_dir = tempdir().unwrap();
    let err = convert_file(&input, &options(out_dir.path(), RowMode::PerSample)).unwrap_err();
    match err {
        Vcf2dfError::AtLine {
            line_number,
            source,
        } => {
            assert_eq!(line_number, 10);
            assert!(matches!(
                *source,
                Vcf2dfError::SampleCountMismatch {
                    expected: 2,
                    found: 1
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_convert_header_only_input() {
    let header_only: String = VCF
        .lines()
        .take_while(|line| line.starts_with('#'))
        .map(|line| format!("{line}\n"))
        .collect();
    let (_out_dir, stats, batches) = convert_fixture(&header_only, RowMode::PerSample);
    assert_eq!(stats, ConversionStats::default());
    assert!(batches.iter().all(|b| b.num_rows() == 0));
}

#[test]
fn test_declare_undeclared_adds_columns() {
    init_logger();
    let contents = "##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
1\t100\t.\tA\tG\t50\tPASS\tDP=10;XTAG=.
1\t200\t.\tC\tT\t50\tPASS\tXTAG=7;SOMATIC;NOTE=abc
";
    let input = make_temp_vcf(contents);
    let delta = collect_undeclared(&input).unwrap();
    let declared: Vec<(&str, ValueType)> = delta
        .fields()
        .iter()
        .map(|f| (f.id.as_str(), f.value_type))
        .collect();
    assert_eq!(
        declared,
        vec![
            ("XTAG", ValueType::Integer),
            ("SOMATIC", ValueType::Flag),
            ("NOTE", ValueType::Character)
        ]
    );

    let out_dir = tempdir().unwrap();
    let mut opts = options(out_dir.path(), RowMode::PerSample);
    opts.declare_undeclared = true;
    convert_file(&input, &opts).unwrap();
    let batches = read_parquet(&output_path(&input, out_dir.path()));
    let schema = batches[0].schema();
    let xtag = schema.field_with_name("XTAG").unwrap();
    assert_eq!(xtag.data_type(), &DataType::Int32);
    assert_eq!(ints(&batches, "XTAG"), vec![0, 7]);
    assert_eq!(bools(&batches, "SOMATIC"), vec![false, true]);
    assert_eq!(strings(&batches, "NOTE"), vec!["", "abc"]);
}

#[test]
fn test_output_path_naming() {
    let out = Path::new("/out");
    assert_eq!(
        output_path(Path::new("/data/HG002.vcf.gz"), out),
        PathBuf::from("/out/HG002.parquet")
    );
    assert_eq!(
        output_path(Path::new("calls.v2.vcf"), out),
        PathBuf::from("/out/calls_v2.parquet")
    );
    assert_eq!(
        output_path(Path::new("table.txt"), out),
        PathBuf::from("/out/table_txt.parquet")
    );
}

#[test]
fn test_cli_defaults_and_flags() {
    let input = make_temp_vcf(VCF);
    let input = input.to_str().unwrap();
    let args = parse_convert_args(&["vcf2df", "convert", "--vcf", input]);
    assert_eq!(args.out_dir, PathBuf::from("."));
    assert_eq!(args.num_threads, 1);
    assert_eq!(args.batch_size, 8192);
    assert_eq!(args.row_mode(), RowMode::PerSample);
    assert!(!args.print_schema);

    let out_dir = tempdir().unwrap();
    let out = out_dir.path().to_str().unwrap();
    let args = parse_convert_args(&[
        "vcf2df",
        "convert",
        "--vcf",
        input,
        "-o",
        out,
        "-@",
        "4",
        "--per-record",
        "--batch-size",
        "16",
    ]);
    assert_eq!(args.out_dir, PathBuf::from(out));
    assert_eq!(args.num_threads, 4);
    assert_eq!(args.batch_size, 16);
    assert_eq!(args.row_mode(), RowMode::PerRecord);
}

#[test]
fn test_cli_rejects_invalid_values() {
    let input = make_temp_vcf(VCF);
    let input = input.to_str().unwrap();
    for args in [
        vec!["vcf2df", "convert", "--vcf", input, "-@", "0"],
        vec!["vcf2df", "convert", "--vcf", input, "--batch-size", "0"],
        vec!["vcf2df", "convert", "--vcf", input, "-o", "/nonexistent/vcf2df/out"],
        vec!["vcf2df", "convert", "--vcf", "/nonexistent/input.vcf"],
        vec!["vcf2df", "convert", "--vcf", input, "--vcf-list", input],
        vec!["vcf2df", "convert"],
    ] {
        assert!(Cli::try_parse_from(&args).is_err(), "{args:?} should be rejected");
    }
}

#[test]
fn test_vcf_list_skips_comments() {
    let first = make_temp_vcf(VCF);
    let second = make_temp_vcf(VCF);
    let list = make_temp_path("vcf_list", "txt");
    fs::write(
        &list,
        format!("# inputs\n{}\n\n{}\n", first.display(), second.display()),
    )
    .unwrap();
    let args = parse_convert_args(&["vcf2df", "convert", "--vcf-list", list.to_str().unwrap()]);
    assert_eq!(args.process_vcf_paths().unwrap(), vec![first, second]);
}

#[test]
fn test_convert_multiple_files_in_parallel() {
    init_logger();
    let first = make_temp_vcf(VCF);
    let second = make_temp_vcf(VCF);
    let out_dir = tempdir().unwrap();
    let args = parse_convert_args(&[
        "vcf2df",
        "convert",
        "--vcf",
        first.to_str().unwrap(),
        second.to_str().unwrap(),
        "-o",
        out_dir.path().to_str().unwrap(),
        "-@",
        "2",
    ]);
    convert(args).unwrap();
    for input in [&first, &second] {
        let batches = read_parquet(&output_path(input, out_dir.path()));
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 3);
    }
}

#[test]
fn test_convert_rejects_colliding_outputs() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();
    let first = dir_a.path().join("same.vcf");
    let second = dir_b.path().join("same.vcf");
    fs::write(&first, VCF).unwrap();
    fs::write(&second, VCF).unwrap();
    let out_dir = tempdir().unwrap();
    let args = parse_convert_args(&[
        "vcf2df",
        "convert",
        "--vcf",
        first.to_str().unwrap(),
        second.to_str().unwrap(),
        "-o",
        out_dir.path().to_str().unwrap(),
    ]);
    assert!(convert(args).is_err());
    assert!(!out_dir.path().join("same.parquet").exists());
}
