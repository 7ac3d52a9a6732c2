use crossfilter_store::LoadError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid top-k request: n = {requested}")]
    EmptyResult { requested: isize },

    #[error("group #{group} diverged from a full recomputation: {detail}")]
    InvariantViolation { group: usize, detail: String },

    #[error("unknown dimension #{0}")]
    UnknownDimension(usize),

    #[error("unknown group #{0}")]
    UnknownGroup(usize),

    #[error("duplicate widget: {0}")]
    DuplicateWidget(String),
}
