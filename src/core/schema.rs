use crate::{
    constants::SCHEMA_MESSAGE_NAME,
    core::header::{FieldDefinition, Header, Number, ValueType},
};
use std::{collections::HashSet, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int32,
    Double,
    Boolean,
    Utf8,
}

impl ScalarType {
    fn from_value_type(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Integer => ScalarType::Int32,
            ValueType::Float => ScalarType::Double,
            ValueType::Flag => ScalarType::Boolean,
            ValueType::String | ValueType::Character => ScalarType::Utf8,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Int32 => write!(f, "int32"),
            ScalarType::Double => write!(f, "double"),
            ScalarType::Boolean => write!(f, "boolean"),
            ScalarType::Utf8 => write!(f, "binary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedColumn {
    VariantKey,
    Chrom,
    Pos,
    Ref,
    Alt,
    Qual,
    Filter,
    IsSv,
    SvType,
    End,
    NumAlts,
    Sample,
    IsPhased,
    PhaseId,
}

impl FixedColumn {
    pub const ALL: [FixedColumn; 14] = [
        FixedColumn::VariantKey,
        FixedColumn::Chrom,
        FixedColumn::Pos,
        FixedColumn::Ref,
        FixedColumn::Alt,
        FixedColumn::Qual,
        FixedColumn::Filter,
        FixedColumn::IsSv,
        FixedColumn::SvType,
        FixedColumn::End,
        FixedColumn::NumAlts,
        FixedColumn::Sample,
        FixedColumn::IsPhased,
        FixedColumn::PhaseId,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FixedColumn::VariantKey => "VARIANTKEY",
            FixedColumn::Chrom => "CHROM",
            FixedColumn::Pos => "POS",
            FixedColumn::Ref => "REF",
            FixedColumn::Alt => "ALT",
            FixedColumn::Qual => "QUAL",
            FixedColumn::Filter => "FILTER",
            FixedColumn::IsSv => "IS_SV",
            FixedColumn::SvType => "SVTYPE",
            FixedColumn::End => "END",
            FixedColumn::NumAlts => "NUMALTS",
            FixedColumn::Sample => "SAMPLE",
            FixedColumn::IsPhased => "IS_PHASED",
            FixedColumn::PhaseId => "PHASE_ID",
        }
    }

    pub fn scalar(&self) -> ScalarType {
        match self {
            FixedColumn::Pos | FixedColumn::End | FixedColumn::NumAlts => ScalarType::Int32,
            FixedColumn::Qual => ScalarType::Double,
            FixedColumn::IsSv | FixedColumn::IsPhased => ScalarType::Boolean,
            _ => ScalarType::Utf8,
        }
    }

    pub fn is_reserved(name: &str) -> bool {
        Self::ALL.iter().any(|c| c.name() == name)
    }
}

/// How an annotation column reads its field's decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationLayout {
    Scalar,
    /// One element of a fixed-count array.
    Element(usize),
    /// Variable-count values joined with commas.
    Joined,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    Fixed(FixedColumn),
    Annotation {
        id: String,
        layout: AnnotationLayout,
        description: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub scalar: ScalarType,
    pub source: ColumnSource,
}

impl Column {
    fn fixed(column: FixedColumn) -> Self {
        Column {
            name: column.name().to_string(),
            scalar: column.scalar(),
            source: ColumnSource::Fixed(column),
        }
    }

    /// Schema text for this column, e.g. `required binary CHROM (STRING)`.
    pub fn line(&self) -> String {
        match self.scalar {
            ScalarType::Utf8 => format!("required binary {} (STRING)", self.name),
            scalar => format!("required {scalar} {}", self.name),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match &self.source {
            ColumnSource::Annotation { description, .. } => Some(description),
            ColumnSource::Fixed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
}

fn sub_column_name(id: &str, index: usize) -> String {
    if index == 0 {
        id.to_string()
    } else {
        format!("{id}_{index}")
    }
}

fn annotation_columns(field: &FieldDefinition, sample_count: usize) -> Vec<Column> {
    let column = |name: String, scalar, layout| Column {
        name,
        scalar,
        source: ColumnSource::Annotation {
            id: field.id.clone(),
            layout,
            description: field.description.clone(),
        },
    };

    if field.is_flag() || field.number == Number::Fixed(0) {
        return vec![column(
            field.id.clone(),
            ScalarType::Boolean,
            AnnotationLayout::Scalar,
        )];
    }

    let scalar = ScalarType::from_value_type(field.value_type);
    let count = match field.number {
        Number::Fixed(1) => {
            return vec![column(field.id.clone(), scalar, AnnotationLayout::Scalar)];
        }
        Number::Unbounded => {
            return vec![column(
                field.id.clone(),
                ScalarType::Utf8,
                AnnotationLayout::Joined,
            )];
        }
        Number::A => 1,
        Number::R => 2,
        Number::G => sample_count,
        Number::Fixed(n) => n as usize,
    };
    if count == 0 {
        log::debug!("INFO field {} has no columns (Number={})", field.id, field.number);
    }
    (0..count)
        .map(|i| column(sub_column_name(&field.id, i), scalar, AnnotationLayout::Element(i)))
        .collect()
}

impl Schema {
    /// Fixed columns followed by the annotation columns, sorted by schema line.
    pub fn from_header(header: &Header) -> Schema {
        let mut columns: Vec<Column> = FixedColumn::ALL.iter().map(|c| Column::fixed(*c)).collect();

        let mut annotations: Vec<(String, Column)> = header
            .infos
            .values()
            .filter(|field| {
                let reserved = FixedColumn::is_reserved(&field.id);
                if reserved {
                    log::debug!("Skipping INFO field {} with reserved column name", field.id);
                }
                !reserved
            })
            .flat_map(|field| annotation_columns(field, header.sample_count()))
            .map(|column| (column.line(), column))
            .collect();
        annotations.sort_by(|a, b| a.0.cmp(&b.0));

        let mut names: HashSet<String> = columns.iter().map(|c| c.name.clone()).collect();
        for (_, column) in annotations {
            if !names.insert(column.name.clone()) {
                log::warn!("Skipping duplicate column name {}", column.name);
                continue;
            }
            columns.push(column);
        }

        Schema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Textual schema; identical headers give byte-identical messages.
    pub fn message(&self) -> String {
        let lines: Vec<String> = self.columns.iter().map(Column::line).collect();
        format!("message {SCHEMA_MESSAGE_NAME} {{{};}}", lines.join("; "))
    }
}
