use crate::filter::Filter;
use crossfilter_store::{BitVec, RecordId};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

/// Handle to a dimension registered with a `Crossfilter`.
pub struct Dimension<K> {
    pub(crate) owner: u64,
    pub(crate) idx: usize,
    marker: PhantomData<fn() -> K>,
}

impl<K> Dimension<K> {
    pub(crate) fn new(owner: u64, idx: usize) -> Self {
        Self {
            owner,
            idx,
            marker: PhantomData,
        }
    }

    pub fn id(&self) -> usize {
        self.idx
    }
}

impl<K> Clone for Dimension<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Dimension<K> {}

impl<K> fmt::Debug for Dimension<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dimension#{}", self.idx)
    }
}

/// Which part of the sorted index currently passes the dimension's filter.
#[derive(Clone, Debug)]
enum Selection {
    /// Index positions `[start, end)`.
    Interval(Range<usize>),
    /// Pass flags by record id.
    Mask(BitVec),
}

/// Records whose pass state changed after a filter update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SelectionDelta {
    pub(crate) entered: Vec<RecordId>,
    pub(crate) exited: Vec<RecordId>,
}

impl SelectionDelta {
    pub(crate) fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Sorted key index of one dimension.
///
/// `keys` is indexed by record id; `order` lists record ids sorted by key, ties kept in insertion
/// order.
pub(crate) struct DimensionIndex<K> {
    keys: Vec<K>,
    order: Vec<RecordId>,
    filter: Option<Filter<K>>,
    selection: Selection,
}

impl<K: Ord + Clone + 'static> DimensionIndex<K> {
    pub(crate) fn new(keys: Vec<K>) -> Self {
        let mut order: Vec<RecordId> = (0..keys.len() as RecordId).collect();
        order.sort_by(|&a, &b| keys[a as usize].cmp(&keys[b as usize]));
        let len = order.len();
        Self {
            keys,
            order,
            filter: None,
            selection: Selection::Interval(0..len),
        }
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn filter(&self) -> Option<&Filter<K>> {
        self.filter.as_ref()
    }

    fn key_of(&self, id: RecordId) -> &K {
        &self.keys[id as usize]
    }

    fn lower_bound(&self, key: &K) -> usize {
        self.order.partition_point(|&id| self.key_of(id) < key)
    }

    fn upper_bound(&self, key: &K) -> usize {
        self.order.partition_point(|&id| self.key_of(id) <= key)
    }

    /// End of the run of keys equal to the key at `start`.
    fn run_end(&self, start: usize) -> usize {
        let key = self.key_of(self.order[start]);
        start + self.order[start..].partition_point(|&id| self.key_of(id) <= key)
    }

    fn resolve(&self, filter: Option<&Filter<K>>) -> Selection {
        match filter {
            None => Selection::Interval(0..self.order.len()),
            Some(Filter::Exact(key)) => {
                Selection::Interval(self.lower_bound(key)..self.upper_bound(key))
            }
            Some(Filter::Range(lower, upper)) => {
                let start = self.lower_bound(lower);
                let end = self.lower_bound(upper).max(start);
                Selection::Interval(start..end)
            }
            Some(Filter::In(keys)) => {
                let mut mask = BitVec::with_len_all_false(self.keys.len());
                for key in keys {
                    for &id in &self.order[self.lower_bound(key)..self.upper_bound(key)] {
                        mask.set(id as usize, true);
                    }
                }
                Selection::Mask(mask)
            }
            Some(Filter::Predicate(predicate)) => {
                let mut mask = BitVec::with_len_all_false(self.keys.len());
                let mut start = 0;
                while start < self.order.len() {
                    let end = self.run_end(start);
                    if predicate(self.key_of(self.order[start])) {
                        for &id in &self.order[start..end] {
                            mask.set(id as usize, true);
                        }
                    }
                    start = end;
                }
                Selection::Mask(mask)
            }
        }
    }

    /// Replaces the active filter and returns the records whose pass state changed.
    ///
    /// `current` must be the pass mask the engine holds for this dimension.
    pub(crate) fn set_filter(
        &mut self,
        filter: Option<Filter<K>>,
        current: &BitVec,
    ) -> SelectionDelta {
        let next = self.resolve(filter.as_ref());
        let delta = match (&self.selection, &next) {
            (Selection::Interval(old), Selection::Interval(new)) => {
                self.interval_delta(old.clone(), new.clone())
            }
            (_, Selection::Interval(new)) => {
                mask_delta(current, &self.interval_mask(new.clone()))
            }
            (_, Selection::Mask(mask)) => mask_delta(current, mask),
        };
        self.filter = filter;
        self.selection = next;
        delta
    }

    fn interval_mask(&self, range: Range<usize>) -> BitVec {
        let mut mask = BitVec::with_len_all_false(self.keys.len());
        for &id in &self.order[range] {
            mask.set(id as usize, true);
        }
        mask
    }

    fn interval_delta(&self, old: Range<usize>, new: Range<usize>) -> SelectionDelta {
        let mut delta = SelectionDelta::default();
        for range in subtract(&old, &new) {
            delta.exited.extend(range.map(|pos| self.order[pos]));
        }
        for range in subtract(&new, &old) {
            delta.entered.extend(range.map(|pos| self.order[pos]));
        }
        delta
    }

    /// Up to `n` ids passing `visible`, largest keys first; equal keys in insertion order.
    pub(crate) fn top(&self, n: usize, visible: impl Fn(RecordId) -> bool) -> Vec<RecordId> {
        let mut out = Vec::with_capacity(n.min(self.order.len()));
        let mut end = self.order.len();
        while end > 0 && out.len() < n {
            let key = self.key_of(self.order[end - 1]);
            let start = self.lower_bound(key);
            for &id in &self.order[start..end] {
                if out.len() == n {
                    break;
                }
                if visible(id) {
                    out.push(id);
                }
            }
            end = start;
        }
        out
    }

    /// Up to `n` ids passing `visible`, smallest keys first; equal keys in insertion order.
    pub(crate) fn bottom(&self, n: usize, visible: impl Fn(RecordId) -> bool) -> Vec<RecordId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| visible(id))
            .take(n)
            .collect()
    }
}

/// Positions of `a` that are not in `b`, as at most two ranges.
fn subtract(a: &Range<usize>, b: &Range<usize>) -> [Range<usize>; 2] {
    if b.start >= b.end {
        return [a.clone(), 0..0];
    }
    [a.start..a.end.min(b.start), a.start.max(b.end)..a.end]
}

fn mask_delta(current: &BitVec, next: &BitVec) -> SelectionDelta {
    debug_assert_eq!(current.len(), next.len());
    let mut delta = SelectionDelta::default();
    for idx in current.iter_differences(next) {
        if next.get(idx) {
            delta.entered.push(idx as RecordId);
        } else {
            delta.exited.push(idx as RecordId);
        }
    }
    delta
}

/// Type-erased view of a [`DimensionIndex`], used where the key type is not known.
pub(crate) trait DimensionSlot: Any {
    fn is_filtered(&self) -> bool;

    fn clear_filter(&mut self, current: &BitVec) -> SelectionDelta;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<K: Ord + Clone + 'static> DimensionSlot for DimensionIndex<K> {
    fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    fn clear_filter(&mut self, current: &BitVec) -> SelectionDelta {
        self.set_filter(None, current)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
