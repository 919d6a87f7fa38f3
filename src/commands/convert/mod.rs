use crate::{
    cli::ConvertArgs,
    constants::{PARQUET_EXTENSION, PROGRESS_INTERVAL},
    core::{
        header::HeaderDelta,
        info::{InfoBuffer, InfoError, InfoValue},
        row::{RowMaterializer, RowMode},
        schema::Schema,
        variant::{extract_record, ExtractedRecord},
    },
    io::{
        parquet_writer::{ParquetRowWriter, RowSink},
        vcf_reader::VcfReader,
    },
    utils::util::{format_number_with_commas, Result},
};
use rayon::{prelude::*, ThreadPoolBuilder};
use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Read as ioRead},
    path::{Path, PathBuf},
    time::Instant,
};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub out_dir: PathBuf,
    pub mode: RowMode,
    pub batch_size: usize,
    pub declare_undeclared: bool,
}

impl From<&ConvertArgs> for ConvertOptions {
    fn from(args: &ConvertArgs) -> Self {
        ConvertOptions {
            out_dir: args.out_dir.clone(),
            mode: args.row_mode(),
            batch_size: args.batch_size,
            declare_undeclared: args.declare_undeclared,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub lines: usize,
    pub variants: usize,
    pub skipped: usize,
    pub rows: usize,
}

/// `<out_dir>/<input name without .vcf[.gz], dots replaced by underscores>.parquet`
pub fn output_path(input: &Path, out_dir: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name
        .strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".gzip"))
        .unwrap_or(&name);
    let name = name.strip_suffix(".vcf").unwrap_or(name);
    out_dir.join(format!("{}.{PARQUET_EXTENSION}", name.replace('.', "_")))
}

/// Scans every record of `path` for INFO keys the header does not declare
/// and synthesizes a definition from the first non-missing value of each.
pub fn collect_undeclared(path: &Path) -> Result<HeaderDelta> {
    let mut reader = VcfReader::from_path(path)?;
    let mut delta = HeaderDelta::new();
    let mut line = String::new();
    while reader.next_line(&mut line)?.is_some() {
        let Some(raw_info) = line.split('\t').nth(7) else {
            continue;
        };
        let info = InfoBuffer::new(raw_info.as_bytes(), reader.header(), 1);
        for key in info.keys() {
            if delta.fields().iter().any(|field| field.id == key) {
                continue;
            }
            if let Err(InfoError::NotInHeader { value, .. }) = info.get(&key) {
                let value = match value {
                    InfoValue::String(raw) => InfoValue::infer(&raw),
                    other => other,
                };
                delta.register(&key, &value);
            }
        }
    }
    Ok(delta)
}

fn open_input(path: &Path, options: &ConvertOptions) -> Result<VcfReader<BufReader<Box<dyn ioRead>>>> {
    let mut reader = VcfReader::from_path(path)?;
    if options.declare_undeclared {
        let delta = collect_undeclared(path)?;
        if !delta.is_empty() {
            log::info!(
                "{}: declaring {} undeclared INFO field(s)",
                path.display(),
                delta.fields().len()
            );
            reader.apply_delta(delta);
        }
    }
    Ok(reader)
}

/// Streams every data line of `reader` through the extractor and materializer
/// into `sink`. Fatal errors carry the line number they occurred on.
pub fn convert_records<R: BufRead>(
    reader: &mut VcfReader<R>,
    materializer: &RowMaterializer,
    sink: &mut dyn RowSink,
) -> Result<ConversionStats> {
    let mut stats = ConversionStats::default();
    let mut line = String::new();
    while let Some(line_number) = reader.next_line(&mut line)? {
        stats.lines += 1;
        let record = match extract_record(&line, reader.header()) {
            Ok(ExtractedRecord::Variant(record)) => record,
            Ok(ExtractedRecord::Skip) => {
                stats.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.at_line(line_number)),
        };
        let rows = materializer
            .rows(&record)
            .map_err(|e| e.at_line(line_number))?;
        for row in &rows {
            sink.write_row(row).map_err(|e| e.at_line(line_number))?;
        }
        stats.variants += 1;
        stats.rows += rows.len();

        if stats.variants % PROGRESS_INTERVAL == 0 {
            log::info!(
                "Processed {} variants ({} rows)",
                format_number_with_commas(stats.variants),
                format_number_with_commas(stats.rows)
            );
        }
    }
    Ok(stats)
}

pub fn convert_file(path: &Path, options: &ConvertOptions) -> Result<ConversionStats> {
    let start_timer = Instant::now();
    let mut reader = open_input(path, options)?;
    let schema = Schema::from_header(reader.header());
    log::debug!("{}: {}", path.display(), schema.message());

    let out_path = output_path(path, &options.out_dir);
    log::info!(
        "Converting {} ({} columns) to {}",
        path.display(),
        schema.len(),
        out_path.display()
    );
    let mut writer = ParquetRowWriter::new(&out_path, &schema, options.batch_size)?;
    let materializer = RowMaterializer::new(&schema, options.mode);
    let stats = convert_records(&mut reader, &materializer, &mut writer)?;
    writer.finish()?;

    let elapsed = start_timer.elapsed();
    let rate = stats.variants as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    log::info!(
        "{}: {} variants, {} skipped, {} rows written in {:.2?} ({:.0} variants/s)",
        path.display(),
        format_number_with_commas(stats.variants),
        format_number_with_commas(stats.skipped),
        format_number_with_commas(writer.rows_written()),
        elapsed,
        rate
    );
    Ok(stats)
}

fn check_output_collisions(vcf_paths: &[PathBuf], out_dir: &Path) -> Result<()> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
    for path in vcf_paths {
        let out_path = output_path(path, out_dir);
        if let Some(previous) = seen.insert(out_path.clone(), path) {
            return Err(crate::vcf2df_error!(
                "Inputs {} and {} would both be written to {}",
                previous.display(),
                path.display(),
                out_path.display()
            ));
        }
    }
    Ok(())
}

pub fn convert(args: ConvertArgs) -> Result<()> {
    let vcf_paths = args
        .process_vcf_paths()
        .map_err(|error| crate::vcf2df_error!("{error}"))?;
    let options = ConvertOptions::from(&args);

    if args.print_schema {
        for path in &vcf_paths {
            let reader = open_input(path, &options)?;
            println!("{}", Schema::from_header(reader.header()).message());
        }
        return Ok(());
    }

    check_output_collisions(&vcf_paths, &options.out_dir)?;
    let convert_one = |path: &PathBuf| -> Result<ConversionStats> {
        convert_file(path, &options)
            .map_err(|e| crate::vcf2df_error!("Failed to convert {}: {e}", path.display()))
    };

    let num_threads = args.num_threads.min(vcf_paths.len());
    let all_stats: Vec<ConversionStats> = if num_threads > 1 {
        log::debug!("Converting {} files on {} threads", vcf_paths.len(), num_threads);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("vcf2df-convert-{i}"))
            .build()
            .map_err(|e| crate::vcf2df_error!("Failed to initialize convert thread pool: {e}"))?;
        pool.install(|| vcf_paths.par_iter().map(convert_one).collect::<Result<_>>())?
    } else {
        vcf_paths.iter().map(convert_one).collect::<Result<_>>()?
    };

    if all_stats.len() > 1 {
        let variants: usize = all_stats.iter().map(|s| s.variants).sum();
        let rows: usize = all_stats.iter().map(|s| s.rows).sum();
        log::info!(
            "Converted {} files: {} variants, {} rows",
            all_stats.len(),
            format_number_with_commas(variants),
            format_number_with_commas(rows)
        );
    }
    Ok(())
}
