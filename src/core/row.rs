use crate::{
    constants::MISSING_QUAL,
    core::{
        genotype::Genotype,
        info::{InfoError, InfoValue},
        schema::{AnnotationLayout, Column, ColumnSource, FixedColumn, ScalarType, Schema},
        variant::DecodedRecord,
    },
    utils::util::{is_missing_float, Result, MISSING_INTEGER},
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int32(i32),
    Double(f64),
    Boolean(bool),
    Utf8(String),
}

impl ColumnValue {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ColumnValue::Int32(_) => ScalarType::Int32,
            ColumnValue::Double(_) => ScalarType::Double,
            ColumnValue::Boolean(_) => ScalarType::Boolean,
            ColumnValue::Utf8(_) => ScalarType::Utf8,
        }
    }

    /// Zero value written for absent or undecodable annotations.
    pub fn default_for(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::Int32 => ColumnValue::Int32(0),
            ScalarType::Double => ColumnValue::Double(0.0),
            ScalarType::Boolean => ColumnValue::Boolean(false),
            ScalarType::Utf8 => ColumnValue::Utf8(String::new()),
        }
    }
}

/// One output row, values in schema column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<ColumnValue>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowMode {
    /// One row per sample carrying at least one alt allele.
    #[default]
    PerSample,
    /// One row per record, genotype columns from the first sample.
    PerRecord,
}

pub struct RowMaterializer<'s> {
    schema: &'s Schema,
    mode: RowMode,
}

fn decode_annotation(record: &DecodedRecord, id: &str) -> Option<InfoValue> {
    match record.info.get(id) {
        Ok(InfoValue::Missing) => None,
        Ok(value) => Some(value),
        Err(InfoError::CountMismatch { value, .. }) => {
            log::trace!("{}: INFO {id} has {} values", record.identity.key, value.len());
            Some(value)
        }
        Err(InfoError::FlagNotDeclared { value, .. }) => Some(value),
        Err(InfoError::NotInBuffer { .. }) => None,
        Err(err) => {
            log::debug!("{}: {err}", record.identity.key);
            None
        }
    }
}

fn element(value: &InfoValue, index: usize) -> Option<InfoValue> {
    match value {
        InfoValue::IntArray(v) => v.get(index).map(|x| InfoValue::Int(*x)),
        InfoValue::FloatArray(v) => v.get(index).map(|x| InfoValue::Float(*x)),
        InfoValue::StringArray(v) => v.get(index).map(|x| InfoValue::String(x.clone())),
        InfoValue::Missing => None,
        scalar => (index == 0).then(|| scalar.clone()),
    }
}

fn convert(value: Option<&InfoValue>, scalar: ScalarType) -> ColumnValue {
    let Some(value) = value else {
        return ColumnValue::default_for(scalar);
    };
    match scalar {
        ScalarType::Int32 => ColumnValue::Int32(match value {
            InfoValue::Int(v) if *v != MISSING_INTEGER => *v,
            _ => 0,
        }),
        ScalarType::Double => ColumnValue::Double(match value {
            InfoValue::Float(v) if !is_missing_float(*v) => *v,
            InfoValue::Int(v) if *v != MISSING_INTEGER => f64::from(*v),
            _ => 0.0,
        }),
        ScalarType::Boolean => ColumnValue::Boolean(matches!(value, InfoValue::Bool(true))),
        ScalarType::Utf8 => ColumnValue::Utf8(match value {
            InfoValue::Bool(_) | InfoValue::Missing => String::new(),
            InfoValue::String(s) if s == "." => String::new(),
            other => other.to_string(),
        }),
    }
}

impl<'s> RowMaterializer<'s> {
    pub fn new(schema: &'s Schema, mode: RowMode) -> Self {
        RowMaterializer { schema, mode }
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Builds the rows for one record in the configured mode.
    pub fn rows(&self, record: &DecodedRecord) -> Result<Vec<Row>> {
        let mut cache: HashMap<&str, Option<InfoValue>> = HashMap::new();
        let annotations: Vec<Option<ColumnValue>> = self
            .schema
            .columns()
            .iter()
            .map(|column| self.annotation_value(record, column, &mut cache))
            .collect();

        let empty = Genotype::default();
        let genotypes: Vec<&Genotype> = match self.mode {
            RowMode::PerSample if record.genotypes.is_empty() => vec![&empty],
            RowMode::PerSample => record.genotypes.iter().filter(|g| g.num_alts != 0).collect(),
            RowMode::PerRecord => vec![record.genotypes.first().unwrap_or(&empty)],
        };

        genotypes
            .into_iter()
            .map(|genotype| self.build_row(record, genotype, &annotations))
            .collect()
    }

    fn annotation_value<'c>(
        &self,
        record: &DecodedRecord,
        column: &'c Column,
        cache: &mut HashMap<&'c str, Option<InfoValue>>,
    ) -> Option<ColumnValue> {
        let ColumnSource::Annotation { id, layout, .. } = &column.source else {
            return None;
        };
        let decoded = cache
            .entry(id.as_str())
            .or_insert_with(|| decode_annotation(record, id));
        let value = match layout {
            AnnotationLayout::Scalar | AnnotationLayout::Joined => decoded.clone(),
            AnnotationLayout::Element(index) => decoded.as_ref().and_then(|v| element(v, *index)),
        };
        Some(convert(value.as_ref(), column.scalar))
    }

    fn build_row(
        &self,
        record: &DecodedRecord,
        genotype: &Genotype,
        annotations: &[Option<ColumnValue>],
    ) -> Result<Row> {
        let identity = &record.identity;
        let mut values = Vec::with_capacity(self.schema.len());
        for (column, annotation) in self.schema.columns().iter().zip(annotations) {
            let value = match (&column.source, annotation) {
                (_, Some(value)) => value.clone(),
                (ColumnSource::Fixed(fixed), None) => match fixed {
                    FixedColumn::VariantKey => ColumnValue::Utf8(identity.key.clone()),
                    FixedColumn::Chrom => ColumnValue::Utf8(identity.chrom.clone()),
                    FixedColumn::Pos => ColumnValue::Int32(i32::try_from(identity.start + 1)?),
                    FixedColumn::Ref => ColumnValue::Utf8(identity.reference.clone()),
                    FixedColumn::Alt => ColumnValue::Utf8(identity.alt.clone()),
                    FixedColumn::Qual => {
                        ColumnValue::Double(record.quality.qual.unwrap_or(MISSING_QUAL))
                    }
                    FixedColumn::Filter => ColumnValue::Utf8(record.quality.filter.clone()),
                    FixedColumn::IsSv => ColumnValue::Boolean(identity.is_sv),
                    FixedColumn::SvType => ColumnValue::Utf8(
                        identity
                            .svtype
                            .as_ref()
                            .map(|sv| sv.to_string())
                            .unwrap_or_default(),
                    ),
                    FixedColumn::End => ColumnValue::Int32(i32::try_from(identity.end)?),
                    FixedColumn::NumAlts => ColumnValue::Int32(genotype.num_alts),
                    FixedColumn::Sample => ColumnValue::Utf8(genotype.sample.clone()),
                    FixedColumn::IsPhased => ColumnValue::Boolean(genotype.is_phased),
                    FixedColumn::PhaseId => ColumnValue::Utf8(genotype.phase_id.clone()),
                },
                (ColumnSource::Annotation { .. }, None) => ColumnValue::default_for(column.scalar),
            };
            values.push(value);
        }
        Ok(Row(values))
    }
}
