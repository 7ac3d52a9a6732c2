//! Read-only record storage for the crossfilter engine.
//!
//! This crate focuses on:
//! - Schema-driven loading of raw text rows into typed, immutable records.
//! - Derived fields computed once at load time.
//! - Compact bit vectors used by the engine for per-dimension pass masks.

#![forbid(unsafe_code)]

mod bitmap;
mod error;
mod schema;
mod source;
mod store;
mod types;

pub use crate::bitmap::BitVec;
pub use crate::error::{LoadError, LoadResult};
pub use crate::schema::{FieldSchema, Schema};
pub use crate::source::{from_fn, DataSource, FnSource};
pub use crate::store::{LoadOptions, RawRow, Record, RecordId, RecordStore, RecordStoreBuilder};
pub use crate::types::{FieldType, Value, ISO_DATE_FORMAT, MAX_EXACT_INTEGER};
