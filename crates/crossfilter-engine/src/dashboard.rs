//! Pull-based display registry.
//!
//! A [`Dashboard`] maps widget ids to the group they render. Widgets never hold data: every
//! [`Dashboard::snapshot`] reads the engine's current accumulators, which is all a redraw after
//! an interaction needs.

use crate::crossfilter::Crossfilter;
use crate::error::{EngineError, EngineResult};
use crate::group::{Group, GroupAll};
use crate::reduce::Accumulator;
use std::collections::HashSet;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
    /// `value` relative to the sum over every key of the group; 0 when that sum is 0.
    pub share: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WidgetData {
    Number(f64),
    /// A value with its ratio to a reference total (e.g. "accepted (42 %)").
    Share { value: f64, share: f64 },
    Series(Vec<SeriesPoint>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WidgetSnapshot {
    pub id: String,
    pub data: WidgetData,
}

/// A keyed group rendered as a series (bar, row or pie chart).
pub struct Chart<G, A> {
    group: Group<G, A>,
    value: Box<dyn Fn(&A) -> f64>,
    limit: Option<usize>,
}

impl<G, A> Chart<G, A> {
    pub fn new(group: Group<G, A>, value: impl Fn(&A) -> f64 + 'static) -> Self {
        Self {
            group,
            value: Box::new(value),
            limit: None,
        }
    }

    /// Only render the `n` entries with the largest values.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

type Render<R> = Box<dyn Fn(&Crossfilter<R>) -> EngineResult<WidgetData>>;

pub struct Dashboard<R> {
    ids: HashSet<String>,
    widgets: Vec<(String, Render<R>)>,
}

impl<R: 'static> Default for Dashboard<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: 'static> Dashboard<R> {
    pub fn new() -> Self {
        Self {
            ids: HashSet::new(),
            widgets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn widget_ids(&self) -> impl Iterator<Item = &str> {
        self.widgets.iter().map(|(id, _)| id.as_str())
    }

    fn register(&mut self, id: &str, render: Render<R>) -> EngineResult<()> {
        if !self.ids.insert(id.to_string()) {
            return Err(EngineError::DuplicateWidget(id.to_string()));
        }
        log::trace!("registered widget {id:?}");
        self.widgets.push((id.to_string(), render));
        Ok(())
    }

    pub fn number_display<A: Accumulator>(
        &mut self,
        id: &str,
        group: &GroupAll<A>,
        value: impl Fn(&A) -> f64 + 'static,
    ) -> EngineResult<()> {
        let group = *group;
        self.register(
            id,
            Box::new(move |cf: &Crossfilter<R>| {
                Ok(WidgetData::Number(value(cf.value(&group)?)))
            }),
        )
    }

    /// Renders `part` together with its ratio to `total`.
    pub fn share_display<A: Accumulator>(
        &mut self,
        id: &str,
        part: &GroupAll<A>,
        total: &GroupAll<A>,
        value: impl Fn(&A) -> f64 + 'static,
    ) -> EngineResult<()> {
        let (part, total) = (*part, *total);
        self.register(
            id,
            Box::new(move |cf: &Crossfilter<R>| {
                let v = value(cf.value(&part)?);
                let t = value(cf.value(&total)?);
                Ok(WidgetData::Share {
                    value: v,
                    share: ratio(v, t),
                })
            }),
        )
    }

    pub fn chart<G, A>(&mut self, id: &str, chart: Chart<G, A>) -> EngineResult<()>
    where
        G: Ord + Clone + fmt::Debug + fmt::Display + 'static,
        A: Accumulator,
    {
        self.register(
            id,
            Box::new(move |cf: &Crossfilter<R>| {
                let value = chart.value.as_ref();
                let total: f64 = cf.all(&chart.group)?.into_iter().map(|(_, a)| value(a)).sum();
                let entries = match chart.limit {
                    Some(n) => {
                        let n = isize::try_from(n).unwrap_or(isize::MAX);
                        cf.group_top_by(&chart.group, n, value)?
                    }
                    None => cf.all(&chart.group)?,
                };
                let points = entries
                    .into_iter()
                    .map(|(key, acc)| {
                        let v = value(acc);
                        SeriesPoint {
                            label: key.to_string(),
                            value: v,
                            share: ratio(v, total),
                        }
                    })
                    .collect();
                Ok(WidgetData::Series(points))
            }),
        )
    }

    /// Pulls the current data of every widget, in registration order.
    pub fn snapshot(&self, cf: &Crossfilter<R>) -> EngineResult<Vec<WidgetSnapshot>> {
        self.widgets
            .iter()
            .map(|(id, render)| {
                Ok(WidgetSnapshot {
                    id: id.clone(),
                    data: render(cf)?,
                })
            })
            .collect()
    }

    /// Clears every filter of `cf` ("reset all").
    pub fn reset(&self, cf: &mut Crossfilter<R>) {
        log::debug!("resetting all filters");
        cf.filter_all();
    }
}

impl<R> fmt::Debug for Dashboard<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.widgets.iter().map(|(id, _)| id))
            .finish()
    }
}

fn ratio(value: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        value / total
    }
}
