#![forbid(unsafe_code)]

use crate::error::{LoadError, LoadResult};
use crate::store::Record;
use crate::types::{FieldType, Value};
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldSchema {
    /// A required field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Empty or absent source values load as [`Value::Null`] instead of failing.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

type DeriveFn = Box<dyn Fn(&Record) -> Value + Send + Sync>;

pub(crate) struct DerivedField {
    pub(crate) name: String,
    pub(crate) compute: DeriveFn,
}

/// Column layout shared by every record of a store.
///
/// Base fields are parsed from source rows; derived fields are computed once per record, in
/// declaration order, after the base fields are in place. A derived field can read any base field
/// and any derived field declared before it.
pub struct Schema {
    fields: Vec<FieldSchema>,
    derived: Vec<DerivedField>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSchema>) -> LoadResult<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), idx).is_some() {
                return Err(LoadError::DuplicateField {
                    field: field.name.clone(),
                });
            }
        }

        Ok(Self {
            fields,
            derived: Vec::new(),
            index,
        })
    }

    /// Declares a field computed from the rest of the record.
    pub fn with_derived(
        mut self,
        name: impl Into<String>,
        compute: impl Fn(&Record) -> Value + Send + Sync + 'static,
    ) -> LoadResult<Self> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(LoadError::DuplicateField { field: name });
        }
        self.index.insert(name.clone(), self.width());
        self.derived.push(DerivedField {
            name,
            compute: Box::new(compute),
        });
        Ok(self)
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Number of parsed (non-derived) fields.
    pub fn base_width(&self) -> usize {
        self.fields.len()
    }

    /// Number of values in every record, derived fields included.
    pub fn width(&self) -> usize {
        self.fields.len() + self.derived.len()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.derived.iter().map(|d| d.name.as_str()))
    }

    pub(crate) fn derived(&self) -> &[DerivedField] {
        &self.derived
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field(
                "derived",
                &self.derived.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
