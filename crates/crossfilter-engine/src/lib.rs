mod crossfilter;
mod dashboard;
mod dimension;
mod error;
mod filter;
mod filter_set;
mod group;
mod reduce;

pub use crate::crossfilter::{Crossfilter, CrossfilterOptions, EngineStats, VERIFY_INTERVAL_ENV};
pub use crate::dimension::Dimension;
pub use crate::filter::Filter;
pub use crate::group::{Group, GroupAll};

pub use crate::reduce::{
    reduce, reduce_extremum, reduce_mean, reduce_sum, Accumulator, Count, Extremum, FnReducer,
    Mean, MeanAccumulator, Reducer, Sum, SumAccumulator, ValueBag,
};

pub use crate::dashboard::{Chart, Dashboard, SeriesPoint, WidgetData, WidgetSnapshot};

pub use crate::error::{EngineError, EngineResult};

pub use crossfilter_store::{Record, RecordId, RecordStore, Schema, Value};
