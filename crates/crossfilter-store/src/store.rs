#![forbid(unsafe_code)]

use crate::error::{LoadError, LoadResult};
use crate::schema::{FieldSchema, Schema};
use crate::source::DataSource;
use crate::types::{FieldType, Value, MAX_EXACT_INTEGER};
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Position of a record in its store. Stable for the lifetime of the store.
pub type RecordId = u32;

/// A source row: field name to raw text, as produced by a CSV reader.
pub type RawRow = HashMap<String, String>;

type RetainFn = Box<dyn Fn(&RawRow) -> bool>;

pub struct LoadOptions {
    /// Trim surrounding whitespace from every raw value before parsing.
    pub trim_whitespace: bool,
    /// Rows rejected by this predicate are skipped before parsing.
    pub retain: Option<RetainFn>,
}

impl LoadOptions {
    pub fn retain(mut self, predicate: impl Fn(&RawRow) -> bool + 'static) -> Self {
        self.retain = Some(Box::new(predicate));
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            retain: None,
        }
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("trim_whitespace", &self.trim_whitespace)
            .field("retain", &self.retain.is_some())
            .finish()
    }
}

/// An immutable row of typed values.
#[derive(Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value_at(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        let idx = self.schema.field_index(field)?;
        self.values.get(idx)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field)?.as_f64()
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field)?.as_str()
    }

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.get(field)?.as_date()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.schema.field_names().zip(self.values.iter()) {
            map.entry(&name, value);
        }
        map.finish()
    }
}

/// The in-memory dataset. Read-only once built.
#[derive(Clone, Debug)]
pub struct RecordStore {
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl RecordStore {
    pub fn load(schema: Schema, rows: impl IntoIterator<Item = RawRow>) -> LoadResult<Self> {
        Self::load_with(schema, rows, &LoadOptions::default())
    }

    pub fn load_with(
        schema: Schema,
        rows: impl IntoIterator<Item = RawRow>,
        options: &LoadOptions,
    ) -> LoadResult<Self> {
        let mut builder = RecordStoreBuilder::new(schema);
        let mut skipped = 0usize;
        let mut nulls = 0usize;

        for (row_idx, raw) in rows.into_iter().enumerate() {
            if let Some(retain) = &options.retain {
                if !retain(&raw) {
                    skipped += 1;
                    continue;
                }
            }

            let mut values = Vec::with_capacity(builder.schema.base_width());
            for field in builder.schema.fields() {
                let value = parse_field(row_idx, field, raw.get(&field.name), options)?;
                if value.is_null() {
                    nulls += 1;
                }
                values.push(value);
            }
            builder.push_row(row_idx, values)?;
        }

        if skipped > 0 {
            log::debug!("skipped {skipped} rows rejected by the retain predicate");
        }
        if nulls > 0 {
            log::warn!("loaded {nulls} empty optional fields as null");
        }

        let store = builder.finish();
        log::debug!("loaded {} records", store.size());
        Ok(store)
    }

    /// Fetches rows from `source` and loads them. A failed fetch never produces a store.
    pub fn fetch<S: DataSource>(
        source: &mut S,
        schema: Schema,
        options: &LoadOptions,
    ) -> LoadResult<Self> {
        let rows = source
            .fetch()
            .map_err(|err| LoadError::Source(Box::new(err)))?;
        Self::load_with(schema, rows, options)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, record)| (idx as RecordId, record))
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Builds a store from already-typed rows.
#[derive(Debug)]
pub struct RecordStoreBuilder {
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl RecordStoreBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            records: Vec::new(),
        }
    }

    /// Appends one row of base-field values; derived fields are computed here.
    pub fn push_values(&mut self, values: Vec<Value>) -> LoadResult<()> {
        let row = self.records.len();
        self.push_row(row, values)
    }

    fn push_row(&mut self, row: usize, values: Vec<Value>) -> LoadResult<()> {
        let expected = self.schema.base_width();
        if values.len() != expected {
            return Err(LoadError::SchemaMismatch {
                row,
                expected,
                actual: values.len(),
            });
        }

        for (field, value) in self.schema.fields().iter().zip(values.iter()) {
            if value.is_null() && field.required {
                return Err(LoadError::MissingField {
                    row,
                    field: field.name.clone(),
                });
            }
            if !field.field_type.accepts(value) {
                return Err(LoadError::TypeMismatch {
                    row,
                    field: field.name.clone(),
                    expected: field.field_type.name(),
                    actual: value.kind(),
                });
            }
        }

        let mut record = Record {
            schema: Arc::clone(&self.schema),
            values,
        };
        record.values.reserve(self.schema.derived().len());
        for derived in self.schema.derived() {
            let value = (derived.compute)(&record);
            record.values.push(value);
        }

        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finish(self) -> RecordStore {
        RecordStore {
            schema: self.schema,
            records: self.records,
        }
    }
}

fn parse_field(
    row: usize,
    field: &FieldSchema,
    raw: Option<&String>,
    options: &LoadOptions,
) -> LoadResult<Value> {
    let Some(raw) = raw else {
        return missing(row, field);
    };
    let text = if options.trim_whitespace {
        raw.trim()
    } else {
        raw.as_str()
    };

    match &field.field_type {
        _ if text.is_empty() => missing(row, field),
        FieldType::Text => Ok(Value::from(text)),
        FieldType::Number => match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Value::Number(OrderedFloat(n))),
            _ => Err(LoadError::InvalidNumber {
                row,
                field: field.name.clone(),
                value: raw.clone(),
            }),
        },
        FieldType::Integer => text
            .parse::<i64>()
            .ok()
            .filter(|n| n.unsigned_abs() <= MAX_EXACT_INTEGER)
            .map(Value::from)
            .ok_or_else(|| LoadError::InvalidInteger {
                row,
                field: field.name.clone(),
                value: raw.clone(),
            }),
        FieldType::Date { format } => NaiveDate::parse_from_str(text, format)
            .map(Value::Date)
            .map_err(|_| LoadError::InvalidDate {
                row,
                field: field.name.clone(),
                value: raw.clone(),
                format: format.to_string(),
            }),
    }
}

fn missing(row: usize, field: &FieldSchema) -> LoadResult<Value> {
    if field.required {
        Err(LoadError::MissingField {
            row,
            field: field.name.clone(),
        })
    } else {
        Ok(Value::Null)
    }
}
