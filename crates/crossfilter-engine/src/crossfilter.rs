//! The aggregation engine.
//!
//! A [`Crossfilter`] owns the records, every dimension index and every group. Filtering one
//! dimension flips the visibility of some records; each flip is pushed into every group whose
//! scope is affected, exactly once, as an `add` or a `remove`. Groups keyed by a dimension ignore
//! that dimension's own filter (crossfilter semantics), so a chart keeps showing its unfiltered
//! totals while the other charts narrow down.
//!
//! Reads are pulled: nothing is recomputed until a caller asks for `all`/`value`, and even then
//! the accumulators are already current.

use crate::dimension::{Dimension, DimensionIndex, DimensionSlot, SelectionDelta};
use crate::error::{EngineError, EngineResult};
use crate::filter::Filter;
use crate::filter_set::{FilterSet, Scope};
use crate::group::{AllGroup, Group, GroupAll, GroupState, KeyedGroup};
use crate::reduce::{Accumulator, Reducer};
use crossfilter_store::{DataSource, LoadOptions, RawRow, Record, RecordId, RecordStore, Schema};
use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroU32;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

pub const VERIFY_INTERVAL_ENV: &str = "CROSSFILTER_VERIFY_INTERVAL";

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrossfilterOptions {
    /// In debug builds, re-fold every group from scratch after this many filter calls and panic
    /// if any accumulator drifted. Ignored in release builds.
    pub verify_interval: Option<NonZeroU32>,
}

impl CrossfilterOptions {
    /// Defaults, with `verify_interval` taken from `CROSSFILTER_VERIFY_INTERVAL` when set.
    pub fn from_env() -> Self {
        let verify_interval = std::env::var(VERIFY_INTERVAL_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .and_then(NonZeroU32::new);
        Self { verify_interval }
    }
}

/// Counters describing the work done by filter changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub filter_calls: u64,
    /// Records whose pass state changed on the filtered dimension.
    pub flips: u64,
    pub adds: u64,
    pub removes: u64,
}

struct GroupEntry<R> {
    scope: Scope,
    state: Box<dyn GroupState<R>>,
}

pub struct Crossfilter<R> {
    id: u64,
    records: Vec<R>,
    options: CrossfilterOptions,
    filters: FilterSet,
    dimensions: Vec<Box<dyn DimensionSlot>>,
    groups: Vec<GroupEntry<R>>,
    stats: EngineStats,
    calls_since_verify: u32,
}

impl Crossfilter<Record> {
    pub fn from_store(store: RecordStore) -> Self {
        Self::new(store.into_records())
    }

    /// Loads `rows` and builds the engine; nothing is built if any row fails.
    pub fn load(schema: Schema, rows: impl IntoIterator<Item = RawRow>) -> EngineResult<Self> {
        Ok(Self::from_store(RecordStore::load(schema, rows)?))
    }

    /// Fetches from `source` and builds the engine; a failed fetch is returned as is.
    pub fn fetch<S: DataSource>(
        source: &mut S,
        schema: Schema,
        options: &LoadOptions,
    ) -> EngineResult<Self> {
        Ok(Self::from_store(RecordStore::fetch(source, schema, options)?))
    }
}

impl<R: 'static> Crossfilter<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self::with_options(records, CrossfilterOptions::default())
    }

    pub fn with_options(records: Vec<R>, options: CrossfilterOptions) -> Self {
        debug_assert!(records.len() <= RecordId::MAX as usize);
        Self {
            id: NEXT_ENGINE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            filters: FilterSet::new(records.len()),
            records,
            options,
            dimensions: Vec::new(),
            groups: Vec::new(),
            stats: EngineStats::default(),
            calls_since_verify: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&R> {
        self.records.get(id as usize)
    }

    pub fn options(&self) -> &CrossfilterOptions {
        &self.options
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Registers a dimension keyed by `key_fn`.
    ///
    /// `key_fn` is evaluated once per record and must be pure: the sorted index is built from
    /// its results and never refreshed.
    pub fn dimension<K, F>(&mut self, key_fn: F) -> Dimension<K>
    where
        K: Ord + Clone + 'static,
        F: Fn(&R) -> K,
    {
        let keys: Vec<K> = self.records.iter().map(key_fn).collect();
        self.dimensions.push(Box::new(DimensionIndex::new(keys)));
        let idx = self.filters.add_dimension();
        debug_assert_eq!(idx + 1, self.dimensions.len());
        log::trace!("registered dimension #{idx}");
        Dimension::new(self.id, idx)
    }

    fn dimension_index<K: 'static>(&self, dim: &Dimension<K>) -> EngineResult<&DimensionIndex<K>>
    where
        K: Ord + Clone,
    {
        if dim.owner != self.id {
            return Err(EngineError::UnknownDimension(dim.idx));
        }
        self.dimensions
            .get(dim.idx)
            .and_then(|slot| slot.as_any().downcast_ref::<DimensionIndex<K>>())
            .ok_or(EngineError::UnknownDimension(dim.idx))
    }

    /// Sets (`Some`) or clears (`None`) the dimension's filter, replacing any previous one.
    pub fn filter<K>(&mut self, dim: &Dimension<K>, filter: Option<Filter<K>>) -> EngineResult<()>
    where
        K: Ord + Clone + 'static,
    {
        if dim.owner != self.id {
            return Err(EngineError::UnknownDimension(dim.idx));
        }
        let delta = {
            let Self {
                dimensions,
                filters,
                ..
            } = self;
            let index = dimensions
                .get_mut(dim.idx)
                .and_then(|slot| slot.as_any_mut().downcast_mut::<DimensionIndex<K>>())
                .ok_or(EngineError::UnknownDimension(dim.idx))?;
            index.set_filter(filter, filters.passes(dim.idx))
        };
        self.apply_delta(dim.idx, delta);
        Ok(())
    }

    pub fn filter_exact<K>(&mut self, dim: &Dimension<K>, key: K) -> EngineResult<()>
    where
        K: Ord + Clone + 'static,
    {
        self.filter(dim, Some(Filter::Exact(key)))
    }

    /// Keeps keys in `[range.start, range.end)`.
    pub fn filter_range<K>(&mut self, dim: &Dimension<K>, range: Range<K>) -> EngineResult<()>
    where
        K: Ord + Clone + 'static,
    {
        self.filter(dim, Some(Filter::range(range)))
    }

    pub fn filter_in<K>(
        &mut self,
        dim: &Dimension<K>,
        keys: impl IntoIterator<Item = K>,
    ) -> EngineResult<()>
    where
        K: Ord + Clone + 'static,
    {
        self.filter(dim, Some(Filter::one_of(keys)))
    }

    pub fn filter_fn<K>(
        &mut self,
        dim: &Dimension<K>,
        predicate: impl Fn(&K) -> bool + 'static,
    ) -> EngineResult<()>
    where
        K: Ord + Clone + 'static,
    {
        self.filter(dim, Some(Filter::predicate(predicate)))
    }

    pub fn clear_filter<K>(&mut self, dim: &Dimension<K>) -> EngineResult<()>
    where
        K: Ord + Clone + 'static,
    {
        self.filter(dim, None)
    }

    /// Click semantics: selects `key` if it is not selected, deselects it otherwise.
    ///
    /// Selected keys accumulate into a set filter; deselecting the last one clears the filter.
    /// A range or predicate filter is replaced by the clicked key.
    pub fn toggle_key<K>(&mut self, dim: &Dimension<K>, key: K) -> EngineResult<()>
    where
        K: Ord + Clone + 'static,
    {
        let mut selected: Vec<K> = match self.current_filter(dim)? {
            Some(Filter::Exact(k)) => vec![k.clone()],
            Some(Filter::In(keys)) => keys.clone(),
            Some(Filter::Range(..)) | Some(Filter::Predicate(_)) | None => Vec::new(),
        };

        match selected.iter().position(|k| *k == key) {
            Some(pos) => {
                selected.remove(pos);
            }
            None => selected.push(key),
        }

        let next = match selected.len() {
            0 => None,
            1 => selected.pop().map(Filter::Exact),
            _ => Some(Filter::In(selected)),
        };
        self.filter(dim, next)
    }

    /// Clears the filter of every dimension.
    pub fn filter_all(&mut self) {
        for dim in 0..self.dimensions.len() {
            if !self.dimensions[dim].is_filtered() {
                continue;
            }
            let delta = self.dimensions[dim].clear_filter(self.filters.passes(dim));
            self.apply_delta(dim, delta);
        }
    }

    pub fn current_filter<K>(&self, dim: &Dimension<K>) -> EngineResult<Option<&Filter<K>>>
    where
        K: Ord + Clone + 'static,
    {
        Ok(self.dimension_index(dim)?.filter())
    }

    pub fn is_filtered<K>(&self, dim: &Dimension<K>) -> EngineResult<bool>
    where
        K: Ord + Clone + 'static,
    {
        Ok(self.dimension_index(dim)?.filter().is_some())
    }

    fn apply_delta(&mut self, dim: usize, delta: SelectionDelta) {
        self.stats.filter_calls += 1;
        if delta.is_empty() {
            log::trace!("dimension #{dim}: filter unchanged");
        } else {
            log::debug!(
                "dimension #{dim}: {} records entered, {} exited",
                delta.entered.len(),
                delta.exited.len()
            );
        }

        let Self {
            records,
            filters,
            groups,
            stats,
            ..
        } = self;

        for &id in &delta.exited {
            let before = filters.rejections(id);
            filters.reject(dim, id);
            notify(groups, filters, stats, dim, id, before, before + 1, &records[id as usize]);
        }
        for &id in &delta.entered {
            let before = filters.rejections(id);
            filters.accept(dim, id);
            notify(groups, filters, stats, dim, id, before, before - 1, &records[id as usize]);
        }

        self.verify_periodically();
    }

    fn verify_periodically(&mut self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let Some(interval) = self.options.verify_interval else {
            return;
        };
        self.calls_since_verify += 1;
        if self.calls_since_verify < interval.get() {
            return;
        }
        self.calls_since_verify = 0;
        if let Err(err) = self.check_invariants() {
            log::error!("{err}");
            panic!("{err}");
        }
    }

    /// Re-folds every group from scratch and compares it with the maintained accumulators.
    pub fn check_invariants(&self) -> EngineResult<()> {
        for (idx, group) in self.groups.iter().enumerate() {
            let scope = group.scope;
            group
                .state
                .verify(&self.records, &|id: RecordId| self.filters.is_visible(id, scope))
                .map_err(|detail| EngineError::InvariantViolation { group: idx, detail })?;
        }
        Ok(())
    }

    /// Up to `n` visible records with the largest keys; equal keys in insertion order.
    pub fn top<K>(&self, dim: &Dimension<K>, n: isize) -> EngineResult<Vec<&R>>
    where
        K: Ord + Clone + 'static,
    {
        let n = requested(n)?;
        let ids = self
            .dimension_index(dim)?
            .top(n, |id| self.filters.is_visible(id, Scope::All));
        Ok(self.resolve_ids(ids))
    }

    /// Up to `n` visible records with the smallest keys; equal keys in insertion order.
    pub fn bottom<K>(&self, dim: &Dimension<K>, n: isize) -> EngineResult<Vec<&R>>
    where
        K: Ord + Clone + 'static,
    {
        let n = requested(n)?;
        let ids = self
            .dimension_index(dim)?
            .bottom(n, |id| self.filters.is_visible(id, Scope::All));
        Ok(self.resolve_ids(ids))
    }

    fn resolve_ids(&self, ids: Vec<RecordId>) -> Vec<&R> {
        ids.into_iter()
            .map(|id| &self.records[id as usize])
            .collect()
    }

    /// Records passing every active filter, in insertion order.
    pub fn all_filtered(&self) -> Vec<&R> {
        self.records
            .iter()
            .enumerate()
            .filter(|(id, _)| self.filters.is_visible(*id as RecordId, Scope::All))
            .map(|(_, record)| record)
            .collect()
    }

    pub fn filtered_count(&self) -> usize {
        self.filters.visible_count()
    }

    /// Groups records by the dimension's key.
    pub fn group<K, Red>(
        &mut self,
        dim: &Dimension<K>,
        reducer: Red,
    ) -> EngineResult<Group<K, Red::Acc>>
    where
        K: Ord + Clone + fmt::Debug + 'static,
        Red: Reducer<R> + 'static,
    {
        self.group_by(dim, K::clone, reducer)
    }

    /// Groups records by `key_map` applied to the dimension's key (e.g. bucketing).
    pub fn group_by<K, G, Red>(
        &mut self,
        dim: &Dimension<K>,
        key_map: impl Fn(&K) -> G,
        reducer: Red,
    ) -> EngineResult<Group<G, Red::Acc>>
    where
        K: Ord + Clone + 'static,
        G: Ord + Clone + fmt::Debug + 'static,
        Red: Reducer<R> + 'static,
    {
        let index = self.dimension_index(dim)?;
        let state = KeyedGroup::<R, G, Red::Acc>::new(index.keys(), key_map, Box::new(reducer));
        let idx = self.register_group(Scope::Except(dim.idx), state);
        Ok(Group::new(self.id, idx))
    }

    /// A single accumulator over every record passing all filters.
    pub fn group_all<Red>(&mut self, reducer: Red) -> GroupAll<Red::Acc>
    where
        Red: Reducer<R> + 'static,
    {
        let idx = self.register_group(Scope::All, AllGroup::new(Box::new(reducer)));
        GroupAll::new(self.id, idx)
    }

    /// A single accumulator over every record passing all filters except `dim`'s own.
    pub fn dimension_group_all<K, Red>(
        &mut self,
        dim: &Dimension<K>,
        reducer: Red,
    ) -> EngineResult<GroupAll<Red::Acc>>
    where
        K: Ord + Clone + 'static,
        Red: Reducer<R> + 'static,
    {
        self.dimension_index(dim)?;
        let idx = self.register_group(Scope::Except(dim.idx), AllGroup::new(Box::new(reducer)));
        Ok(GroupAll::new(self.id, idx))
    }

    fn register_group<S: GroupState<R>>(&mut self, scope: Scope, mut state: S) -> usize {
        for (id, record) in self.records.iter().enumerate() {
            let id = id as RecordId;
            if self.filters.is_visible(id, scope) {
                state.add(id, record);
            }
        }
        self.groups.push(GroupEntry {
            scope,
            state: Box::new(state),
        });
        let idx = self.groups.len() - 1;
        log::trace!("registered group #{idx} with scope {scope:?}");
        idx
    }

    fn group_state(&self, owner: u64, idx: usize) -> EngineResult<&dyn GroupState<R>> {
        if owner != self.id {
            return Err(EngineError::UnknownGroup(idx));
        }
        self.groups
            .get(idx)
            .map(|entry| entry.state.as_ref())
            .ok_or(EngineError::UnknownGroup(idx))
    }

    fn keyed_group<G: 'static, A: 'static>(
        &self,
        group: &Group<G, A>,
    ) -> EngineResult<&KeyedGroup<R, G, A>> {
        self.group_state(group.owner, group.idx)?
            .as_any()
            .downcast_ref::<KeyedGroup<R, G, A>>()
            .ok_or(EngineError::UnknownGroup(group.idx))
    }

    /// Every key of the group in ascending order, with its current accumulator.
    ///
    /// Keys whose records are all filtered out stay listed with an accumulator equal to the
    /// reducer's initial state.
    pub fn all<G, A>(&self, group: &Group<G, A>) -> EngineResult<Vec<(&G, &A)>>
    where
        G: Ord + Clone + fmt::Debug + 'static,
        A: Accumulator,
    {
        Ok(self.keyed_group(group)?.entries().collect())
    }

    /// Number of distinct keys in the group.
    pub fn group_size<G, A>(&self, group: &Group<G, A>) -> EngineResult<usize>
    where
        G: Ord + Clone + fmt::Debug + 'static,
        A: Accumulator,
    {
        Ok(self.keyed_group(group)?.len())
    }

    pub fn value<A>(&self, group: &GroupAll<A>) -> EngineResult<&A>
    where
        A: Accumulator,
    {
        self.group_state(group.owner, group.idx)?
            .as_any()
            .downcast_ref::<AllGroup<R, A>>()
            .map(AllGroup::value)
            .ok_or(EngineError::UnknownGroup(group.idx))
    }

    /// Up to `n` entries with the largest accumulators; equal values in key order.
    pub fn group_top<G, A>(&self, group: &Group<G, A>, n: isize) -> EngineResult<Vec<(&G, &A)>>
    where
        G: Ord + Clone + fmt::Debug + 'static,
        A: Accumulator + PartialOrd,
    {
        self.group_top_by(group, n, |acc: &A| acc.clone())
    }

    /// Like [`Crossfilter::group_top`], ordering entries by `order(accumulator)`.
    pub fn group_top_by<G, A, T>(
        &self,
        group: &Group<G, A>,
        n: isize,
        order: impl Fn(&A) -> T,
    ) -> EngineResult<Vec<(&G, &A)>>
    where
        G: Ord + Clone + fmt::Debug + 'static,
        A: Accumulator,
        T: PartialOrd,
    {
        let n = requested(n)?;
        let mut entries: Vec<(&G, &A, T)> = self
            .keyed_group(group)?
            .entries()
            .map(|(key, acc)| (key, acc, order(acc)))
            .collect();
        entries.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));
        Ok(entries
            .into_iter()
            .take(n)
            .map(|(key, acc, _)| (key, acc))
            .collect())
    }
}

#[allow(clippy::too_many_arguments)]
fn notify<R: 'static>(
    groups: &mut [GroupEntry<R>],
    filters: &FilterSet,
    stats: &mut EngineStats,
    dim: usize,
    id: RecordId,
    before: u32,
    after: u32,
    record: &R,
) {
    stats.flips += 1;
    for group in groups.iter_mut() {
        match filters.visibility_change(group.scope, dim, id, before, after) {
            Some(true) => {
                group.state.add(id, record);
                stats.adds += 1;
            }
            Some(false) => {
                group.state.remove(id, record);
                stats.removes += 1;
            }
            None => {}
        }
    }
}

fn requested(n: isize) -> EngineResult<usize> {
    usize::try_from(n).map_err(|_| EngineError::EmptyResult { requested: n })
}

impl<R> fmt::Debug for Crossfilter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crossfilter")
            .field("records", &self.records.len())
            .field("dimensions", &self.dimensions.len())
            .field("groups", &self.groups.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_interval_is_read_from_the_environment() {
        std::env::set_var(VERIFY_INTERVAL_ENV, " 25 ");
        assert_eq!(CrossfilterOptions::from_env().verify_interval, NonZeroU32::new(25));

        std::env::set_var(VERIFY_INTERVAL_ENV, "0");
        assert_eq!(CrossfilterOptions::from_env().verify_interval, None);

        std::env::set_var(VERIFY_INTERVAL_ENV, "often");
        assert_eq!(CrossfilterOptions::from_env().verify_interval, None);

        std::env::remove_var(VERIFY_INTERVAL_ENV);
        assert_eq!(CrossfilterOptions::from_env(), CrossfilterOptions::default());
    }

    #[test]
    fn stats_count_flips_and_notifications() {
        let mut cf = Crossfilter::new(vec![1u32, 2, 3, 4]);
        let dim = cf.dimension(|v: &u32| *v);
        let _keyed = cf.group(&dim, crate::reduce::Count).unwrap();
        let _all = cf.group_all(crate::reduce::Count);

        cf.filter_range(&dim, 2..4).unwrap();
        // The keyed group ignores its own dimension, so only the unkeyed one is notified.
        assert_eq!(
            cf.stats(),
            EngineStats {
                filter_calls: 1,
                flips: 2,
                adds: 0,
                removes: 2,
            }
        );
    }
}
