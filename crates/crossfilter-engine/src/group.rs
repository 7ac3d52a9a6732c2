use crate::reduce::{Accumulator, Reducer};
use crossfilter_store::RecordId;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Handle to a keyed group: one accumulator of type `A` per key `G`.
pub struct Group<G, A> {
    pub(crate) owner: u64,
    pub(crate) idx: usize,
    marker: PhantomData<fn() -> (G, A)>,
}

/// Handle to an unkeyed group: a single accumulator of type `A`.
pub struct GroupAll<A> {
    pub(crate) owner: u64,
    pub(crate) idx: usize,
    marker: PhantomData<fn() -> A>,
}

impl<G, A> Group<G, A> {
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

impl<A> GroupAll<A> {
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

impl<G, A> Clone for Group<G, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G, A> Copy for Group<G, A> {}

impl<A> Clone for GroupAll<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for GroupAll<A> {}

impl<G, A> fmt::Debug for Group<G, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Group#{}", self.idx)
    }
}

impl<A> fmt::Debug for GroupAll<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupAll#{}", self.idx)
    }
}

/// Type-erased group storage driven by the engine on every visibility flip.
pub(crate) trait GroupState<R>: Any {
    fn add(&mut self, id: RecordId, record: &R);

    fn remove(&mut self, id: RecordId, record: &R);

    /// Re-folds the visible records from scratch and compares with the maintained state.
    fn verify(&self, records: &[R], visible: &dyn Fn(RecordId) -> bool) -> Result<(), String>;

    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct KeyedGroup<R, G, A> {
    keys: Vec<G>,
    values: Vec<A>,
    /// Key slot of every record.
    slots: Vec<u32>,
    reducer: Box<dyn Reducer<R, Acc = A>>,
}

impl<R, G, A> KeyedGroup<R, G, A>
where
    R: 'static,
    G: Ord + Clone + fmt::Debug + 'static,
    A: Accumulator,
{
    pub(crate) fn new<K>(
        dimension_keys: &[K],
        key_map: impl Fn(&K) -> G,
        reducer: Box<dyn Reducer<R, Acc = A>>,
    ) -> Self {
        let mapped: Vec<G> = dimension_keys.iter().map(key_map).collect();
        let mut keys = mapped.clone();
        keys.sort();
        keys.dedup();

        let slots = mapped
            .iter()
            .map(|key| match keys.binary_search(key) {
                Ok(slot) | Err(slot) => slot as u32,
            })
            .collect();
        let values = keys.iter().map(|_| reducer.initial()).collect();

        Self {
            keys,
            values,
            slots,
            reducer,
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&G, &A)> {
        self.keys.iter().zip(self.values.iter())
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

impl<R, G, A> GroupState<R> for KeyedGroup<R, G, A>
where
    R: 'static,
    G: Ord + Clone + fmt::Debug + 'static,
    A: Accumulator,
{
    fn add(&mut self, id: RecordId, record: &R) {
        let slot = self.slots[id as usize] as usize;
        self.reducer.add(&mut self.values[slot], record);
    }

    fn remove(&mut self, id: RecordId, record: &R) {
        let slot = self.slots[id as usize] as usize;
        self.reducer.remove(&mut self.values[slot], record);
    }

    fn verify(&self, records: &[R], visible: &dyn Fn(RecordId) -> bool) -> Result<(), String> {
        let mut fresh: Vec<A> = self.keys.iter().map(|_| self.reducer.initial()).collect();
        for (id, record) in records.iter().enumerate() {
            if visible(id as RecordId) {
                self.reducer.add(&mut fresh[self.slots[id] as usize], record);
            }
        }

        for ((key, kept), fresh) in self.keys.iter().zip(&self.values).zip(&fresh) {
            if !kept.approx_eq(fresh) {
                return Err(format!(
                    "key {key:?}: maintained {kept:?}, recomputed {fresh:?}"
                ));
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct AllGroup<R, A> {
    value: A,
    reducer: Box<dyn Reducer<R, Acc = A>>,
}

impl<R: 'static, A: Accumulator> AllGroup<R, A> {
    pub(crate) fn new(reducer: Box<dyn Reducer<R, Acc = A>>) -> Self {
        Self {
            value: reducer.initial(),
            reducer,
        }
    }

    pub(crate) fn value(&self) -> &A {
        &self.value
    }
}

impl<R: 'static, A: Accumulator> GroupState<R> for AllGroup<R, A> {
    fn add(&mut self, _id: RecordId, record: &R) {
        self.reducer.add(&mut self.value, record);
    }

    fn remove(&mut self, _id: RecordId, record: &R) {
        self.reducer.remove(&mut self.value, record);
    }

    fn verify(&self, records: &[R], visible: &dyn Fn(RecordId) -> bool) -> Result<(), String> {
        let mut fresh = self.reducer.initial();
        for (id, record) in records.iter().enumerate() {
            if visible(id as RecordId) {
                self.reducer.add(&mut fresh, record);
            }
        }
        if self.value.approx_eq(&fresh) {
            Ok(())
        } else {
            Err(format!("maintained {:?}, recomputed {fresh:?}", self.value))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
