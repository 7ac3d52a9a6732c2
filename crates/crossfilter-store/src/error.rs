pub type LoadResult<T> = Result<T, LoadError>;

/// Failure while building a [`crate::RecordStore`].
///
/// Loading is all-or-nothing: when any row fails, no store is produced.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("row {row}: missing required field {field}")]
    MissingField { row: usize, field: String },

    #[error("row {row}: field {field} is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        field: String,
        value: String,
    },

    #[error("row {row}: field {field} is not an integer: {value:?}")]
    InvalidInteger {
        row: usize,
        field: String,
        value: String,
    },

    #[error("row {row}: field {field} does not match date format {format}: {value:?}")]
    InvalidDate {
        row: usize,
        field: String,
        value: String,
        format: String,
    },

    #[error("row {row}: field {field} expects a {expected} value, got {actual}")]
    TypeMismatch {
        row: usize,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("row {row}: schema mismatch: expected {expected} values, got {actual}")]
    SchemaMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate field: {field}")]
    DuplicateField { field: String },

    #[error("data source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl LoadError {
    /// Source row the error refers to, if any.
    pub fn row(&self) -> Option<usize> {
        match self {
            LoadError::MissingField { row, .. }
            | LoadError::InvalidNumber { row, .. }
            | LoadError::InvalidInteger { row, .. }
            | LoadError::InvalidDate { row, .. }
            | LoadError::TypeMismatch { row, .. }
            | LoadError::SchemaMismatch { row, .. } => Some(*row),
            LoadError::DuplicateField { .. } | LoadError::Source(_) => None,
        }
    }
}
