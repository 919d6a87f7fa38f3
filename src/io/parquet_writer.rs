use crate::{
    core::{
        row::{ColumnValue, Row},
        schema::{ScalarType, Schema},
    },
    error::Vcf2dfError,
    utils::util::Result,
};
use arrow::{
    array::{ArrayRef, BooleanBuilder, Float64Builder, Int32Builder, StringBuilder},
    datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{collections::HashMap, fs::File, path::Path, sync::Arc};

/// Destination for materialized rows.
pub trait RowSink {
    fn write_row(&mut self, row: &Row) -> Result<()>;

    /// Flushes buffered rows and closes the output.
    fn finish(&mut self) -> Result<()>;
}

fn data_type(scalar: ScalarType) -> DataType {
    match scalar {
        ScalarType::Int32 => DataType::Int32,
        ScalarType::Double => DataType::Float64,
        ScalarType::Boolean => DataType::Boolean,
        ScalarType::Utf8 => DataType::Utf8,
    }
}

/// Arrow schema for `schema`: every field non-nullable, annotation
/// descriptions stored as schema metadata keyed by column name.
pub fn arrow_schema(schema: &Schema) -> ArrowSchema {
    let fields: Vec<Field> = schema
        .columns()
        .iter()
        .map(|column| Field::new(column.name.as_str(), data_type(column.scalar), false))
        .collect();
    let metadata: HashMap<String, String> = schema
        .columns()
        .iter()
        .filter_map(|column| {
            column
                .description()
                .map(|description| (column.name.clone(), description.to_string()))
        })
        .collect();
    ArrowSchema::new_with_metadata(fields, metadata)
}

enum ColumnBuilder {
    Int32(Int32Builder),
    Double(Float64Builder),
    Boolean(BooleanBuilder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    fn new(scalar: ScalarType, capacity: usize) -> Self {
        match scalar {
            ScalarType::Int32 => ColumnBuilder::Int32(Int32Builder::with_capacity(capacity)),
            ScalarType::Double => ColumnBuilder::Double(Float64Builder::with_capacity(capacity)),
            ScalarType::Boolean => ColumnBuilder::Boolean(BooleanBuilder::with_capacity(capacity)),
            ScalarType::Utf8 => {
                ColumnBuilder::Utf8(StringBuilder::with_capacity(capacity, capacity * 16))
            }
        }
    }

    fn append(&mut self, value: &ColumnValue) {
        match (self, value) {
            (ColumnBuilder::Int32(b), ColumnValue::Int32(v)) => b.append_value(*v),
            (ColumnBuilder::Double(b), ColumnValue::Double(v)) => b.append_value(*v),
            (ColumnBuilder::Boolean(b), ColumnValue::Boolean(v)) => b.append_value(*v),
            (ColumnBuilder::Utf8(b), ColumnValue::Utf8(v)) => b.append_value(v),
            (_, value) => unreachable!("{} value in a column of another type", value.scalar_type()),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Int32(b) => Arc::new(b.finish()),
            ColumnBuilder::Double(b) => Arc::new(b.finish()),
            ColumnBuilder::Boolean(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
        }
    }
}

/// Buffers rows into Arrow record batches of `batch_size` rows and writes
/// them to a SNAPPY-compressed Parquet file.
pub struct ParquetRowWriter {
    writer: Option<ArrowWriter<File>>,
    arrow_schema: SchemaRef,
    scalars: Vec<ScalarType>,
    builders: Vec<ColumnBuilder>,
    buffered: usize,
    batch_size: usize,
    rows_written: usize,
}

impl ParquetRowWriter {
    pub fn new(path: &Path, schema: &Schema, batch_size: usize) -> Result<Self> {
        let file = File::create(path).map_err(|error| {
            crate::vcf2df_error!("Failed to create output file {}: {error}", path.display())
        })?;
        let arrow_schema: SchemaRef = Arc::new(arrow_schema(schema));
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, arrow_schema.clone(), Some(props))?;

        let batch_size = batch_size.max(1);
        let scalars: Vec<ScalarType> = schema.columns().iter().map(|c| c.scalar).collect();
        let builders = scalars
            .iter()
            .map(|scalar| ColumnBuilder::new(*scalar, batch_size))
            .collect();
        Ok(ParquetRowWriter {
            writer: Some(writer),
            arrow_schema,
            scalars,
            builders,
            buffered: 0,
            batch_size,
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn check_row(&self, row: &Row) -> Result<()> {
        if row.0.len() != self.scalars.len() {
            return Err(Vcf2dfError::RowSchemaMismatch {
                message: format!(
                    "row has {} values, schema has {} columns",
                    row.0.len(),
                    self.scalars.len()
                ),
            });
        }
        for (idx, (value, scalar)) in row.0.iter().zip(&self.scalars).enumerate() {
            if value.scalar_type() != *scalar {
                return Err(Vcf2dfError::RowSchemaMismatch {
                    message: format!(
                        "column {} ({}) expects {scalar}, got {}",
                        idx,
                        self.arrow_schema.field(idx).name(),
                        value.scalar_type()
                    ),
                });
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffered == 0 {
            return Ok(());
        }
        let columns: Vec<ArrayRef> = self.builders.iter_mut().map(ColumnBuilder::finish).collect();
        let batch = RecordBatch::try_new(self.arrow_schema.clone(), columns)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| crate::vcf2df_error!("Parquet writer is already closed"))?;
        writer.write(&batch)?;
        log::trace!("Wrote batch of {} rows", self.buffered);
        self.buffered = 0;
        Ok(())
    }
}

impl RowSink for ParquetRowWriter {
    fn write_row(&mut self, row: &Row) -> Result<()> {
        self.check_row(row)?;
        for (builder, value) in self.builders.iter_mut().zip(&row.0) {
            builder.append(value);
        }
        self.buffered += 1;
        self.rows_written += 1;
        if self.buffered >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::{header_from_info_lines, make_temp_path};
    use arrow::array::{Array, BooleanArray, Float64Array, Int32Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn schema() -> Schema {
        Schema::from_header(&header_from_info_lines(&[
            "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">",
        ]))
    }

    fn row(key: &str, dp: i32) -> Row {
        let schema = schema();
        let mut values: Vec<ColumnValue> = schema
            .columns()
            .iter()
            .map(|c| ColumnValue::default_for(c.scalar))
            .collect();
        values[0] = ColumnValue::Utf8(key.to_string());
        values[5] = ColumnValue::Double(12.5);
        values[7] = ColumnValue::Boolean(true);
        values[14] = ColumnValue::Int32(dp);
        Row(values)
    }

    #[test]
    fn test_arrow_schema_fields_and_metadata() {
        let arrow = arrow_schema(&schema());
        assert_eq!(arrow.fields().len(), 15);
        assert!(arrow.fields().iter().all(|f| !f.is_nullable()));
        assert_eq!(arrow.field(2).data_type(), &DataType::Int32);
        assert_eq!(arrow.field(5).data_type(), &DataType::Float64);
        assert_eq!(arrow.field(7).data_type(), &DataType::Boolean);
        assert_eq!(arrow.field(14).name(), "DP");
        assert_eq!(arrow.metadata().get("DP").map(String::as_str), Some("Total depth"));
        assert!(!arrow.metadata().contains_key("CHROM"));
    }

    #[test]
    fn test_writer_round_trips_across_batches() {
        let path = make_temp_path("writer", "parquet");
        let mut writer = ParquetRowWriter::new(&path, &schema(), 2).unwrap();
        for i in 0..5 {
            writer.write_row(&row(&format!("v{i}"), i)).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(writer.rows_written(), 5);

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 5);

        let first = &batches[0];
        let keys = first.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(keys.value(0), "v0");
        let qual = first.column(5).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(qual.value(1), 12.5);
        let is_sv = first.column(7).as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(is_sv.value(0));
        let dp = first.column(14).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(dp.value(1), 1);
        assert_eq!(dp.null_count(), 0);
    }

    #[test]
    fn test_writer_rejects_mismatched_rows() {
        let path = make_temp_path("writer_mismatch", "parquet");
        let mut writer = ParquetRowWriter::new(&path, &schema(), 8).unwrap();

        let short = Row(vec![ColumnValue::Utf8("x".to_string())]);
        assert!(matches!(
            writer.write_row(&short),
            Err(Vcf2dfError::RowSchemaMismatch { .. })
        ));

        let mut wrong_type = row("x", 1);
        wrong_type.0[2] = ColumnValue::Utf8("100".to_string());
        assert!(matches!(
            writer.write_row(&wrong_type),
            Err(Vcf2dfError::RowSchemaMismatch { .. })
        ));
        assert_eq!(writer.rows_written(), 0);
        writer.finish().unwrap();
    }
}
