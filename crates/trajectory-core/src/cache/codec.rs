//! Snapshot wire format.
//!
//! A snapshot is a versioned envelope around a columnar table: every column
//! carries its name, type tag and values, so a reader in any language can
//! rebuild the typed relation without knowing the producer. The envelope is
//! serialized as JSON and compressed with zstd.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Relation;
use crate::error::CodecError;

/// Bumped whenever a relation schema or the envelope changes.
pub const FORMAT_VERSION: u32 = 1;

/// zstd level; snapshots are written rarely and read on every request.
const COMPRESSION_LEVEL: i32 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    NullableText(Vec<Option<String>>),
    Date(Vec<NaiveDate>),
    NullableDate(Vec<Option<NaiveDate>>),
    DateTime(Vec<NaiveDateTime>),
}

impl Column {
    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Int(_) => "int",
            Column::Float(_) => "float",
            Column::Text(_) => "text",
            Column::NullableText(_) => "nullable_text",
            Column::Date(_) => "date",
            Column::NullableDate(_) => "nullable_date",
            Column::DateTime(_) => "date_time",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(values) => values.len(),
            Column::Float(values) => values.len(),
            Column::Text(values) => values.len(),
            Column::NullableText(values) => values.len(),
            Column::Date(values) => values.len(),
            Column::NullableDate(values) => values.len(),
            Column::DateTime(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedColumn {
    pub name: String,
    pub data: Column,
}

/// Named, typed columns of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    rows: usize,
    columns: Vec<NamedColumn>,
}

impl Table {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, data: Column) -> Self {
        self.columns.push(NamedColumn {
            name: name.to_string(),
            data,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[NamedColumn] {
        &self.columns
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &'static str,
        pick: impl Fn(&'a Column) -> Option<&'a [T]>,
    ) -> Result<&'a [T], CodecError> {
        let column = self
            .columns
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| CodecError::MissingColumn(name.to_string()))?;

        let values = pick(&column.data).ok_or_else(|| CodecError::ColumnType {
            column: name.to_string(),
            found: column.data.type_name(),
            expected,
        })?;

        if values.len() != self.rows {
            return Err(CodecError::ColumnLength {
                column: name.to_string(),
                found: values.len(),
                expected: self.rows,
            });
        }
        Ok(values)
    }

    pub fn ints(&self, name: &str) -> Result<&[i64], CodecError> {
        self.typed(name, "int", |column| match column {
            Column::Int(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn floats(&self, name: &str) -> Result<&[f64], CodecError> {
        self.typed(name, "float", |column| match column {
            Column::Float(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn texts(&self, name: &str) -> Result<&[String], CodecError> {
        self.typed(name, "text", |column| match column {
            Column::Text(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn nullable_texts(&self, name: &str) -> Result<&[Option<String>], CodecError> {
        self.typed(name, "nullable_text", |column| match column {
            Column::NullableText(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn dates(&self, name: &str) -> Result<&[NaiveDate], CodecError> {
        self.typed(name, "date", |column| match column {
            Column::Date(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn nullable_dates(&self, name: &str) -> Result<&[Option<NaiveDate>], CodecError> {
        self.typed(name, "nullable_date", |column| match column {
            Column::NullableDate(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn datetimes(&self, name: &str) -> Result<&[NaiveDateTime], CodecError> {
        self.typed(name, "date_time", |column| match column {
            Column::DateTime(values) => Some(values.as_slice()),
            _ => None,
        })
    }
}

/// A row type with a fixed columnar schema.
pub trait Record: Sized {
    const RELATION: Relation;

    fn to_table(rows: &[Self]) -> Table;

    fn from_table(table: &Table) -> Result<Vec<Self>, CodecError>;
}

/// A decoded snapshot of one relation.
#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    pub rows: Vec<R>,
    /// Start of the cache window the rows were selected for.
    pub window_start: NaiveDate,
    pub cached_at: DateTime<Utc>,
}

impl<R> Snapshot<R> {
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    relation: String,
    window_start: NaiveDate,
    cached_at: DateTime<Utc>,
    table: Table,
}

pub fn encode<R: Record>(rows: &[R], window_start: NaiveDate) -> Result<Vec<u8>, CodecError> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        relation: R::RELATION.key().to_string(),
        window_start,
        cached_at: Utc::now(),
        table: R::to_table(rows),
    };
    let json = serde_json::to_vec(&envelope)?;
    Ok(zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)?)
}

pub fn decode<R: Record>(bytes: &[u8]) -> Result<Snapshot<R>, CodecError> {
    let json = zstd::decode_all(bytes)?;
    let envelope: Envelope = serde_json::from_slice(&json)?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(CodecError::Version {
            found: envelope.format_version,
            expected: FORMAT_VERSION,
        });
    }
    if envelope.relation != R::RELATION.key() {
        return Err(CodecError::Relation {
            found: envelope.relation,
            expected: R::RELATION.key().to_string(),
        });
    }

    Ok(Snapshot {
        rows: R::from_table(&envelope.table)?,
        window_start: envelope.window_start,
        cached_at: envelope.cached_at,
    })
}
