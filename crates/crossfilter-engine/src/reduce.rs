//! Reducers fold records into per-key accumulators.
//!
//! Groups are maintained incrementally: when a record becomes visible the group calls
//! [`Reducer::add`], when it stops being visible it calls [`Reducer::remove`]. Records flip in no
//! particular order, so `add` must be commutative and `remove` must undo `add` exactly. A
//! reducer that breaks this contract silently corrupts its group; `Crossfilter::check_invariants`
//! detects the drift by re-folding from scratch.
//!
//! Non-invertible folds (max/min) keep a counted multiset instead of a single value, see
//! [`ValueBag`].

use ordered_float::OrderedFloat;
use std::collections::BTreeMap;
use std::fmt;

const REL_TOLERANCE: f64 = 1e-9;

/// Fold state held by a group for one key.
pub trait Accumulator: Clone + fmt::Debug + 'static {
    /// Whether two states are equal up to floating-point rounding.
    fn approx_eq(&self, other: &Self) -> bool;
}

pub(crate) fn approx_eq_f64(a: f64, b: f64) -> bool {
    approx_eq_scaled(a, b, a.abs().max(b.abs()))
}

/// Equality within a relative tolerance of `scale` (at least 1).
fn approx_eq_scaled(a: f64, b: f64, scale: f64) -> bool {
    if a == b || (a.is_nan() && b.is_nan()) {
        return true;
    }
    (a - b).abs() <= REL_TOLERANCE * scale.max(1.0)
}

impl Accumulator for f64 {
    fn approx_eq(&self, other: &Self) -> bool {
        approx_eq_f64(*self, *other)
    }
}

macro_rules! exact_accumulator {
    ($($ty:ty),*) => {
        $(
            impl Accumulator for $ty {
                fn approx_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

exact_accumulator!(u32, u64, usize, i32, i64);

impl<A: Accumulator, B: Accumulator> Accumulator for (A, B) {
    fn approx_eq(&self, other: &Self) -> bool {
        self.0.approx_eq(&other.0) && self.1.approx_eq(&other.1)
    }
}

pub trait Reducer<R> {
    type Acc: Accumulator;

    fn initial(&self) -> Self::Acc;

    fn add(&self, acc: &mut Self::Acc, record: &R);

    /// Must be the exact inverse of [`Reducer::add`].
    fn remove(&self, acc: &mut Self::Acc, record: &R);
}

/// Number of visible records.
#[derive(Clone, Copy, Debug, Default)]
pub struct Count;

impl<R> Reducer<R> for Count {
    type Acc = u64;

    fn initial(&self) -> u64 {
        0
    }

    fn add(&self, acc: &mut u64, _record: &R) {
        *acc += 1;
    }

    fn remove(&self, acc: &mut u64, _record: &R) {
        *acc -= 1;
    }
}

/// Compensated running sum of the visible values.
///
/// Uses Neumaier summation, so adding and then removing values of very different magnitudes does
/// not leave the small ones behind. An emptied sum resets to exactly zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumAccumulator {
    count: u64,
    sum: f64,
    compensation: f64,
    /// Sum of absolute values; the scale of the rounding error.
    magnitude: f64,
}

impl SumAccumulator {
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }

    /// Number of values currently summed.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn insert(&mut self, value: f64) {
        self.count += 1;
        self.magnitude += value.abs();
        self.accumulate(value);
    }

    pub fn remove(&mut self, value: f64) {
        self.count -= 1;
        if self.count == 0 {
            *self = Self::default();
            return;
        }
        self.magnitude -= value.abs();
        self.accumulate(-value);
    }

    fn accumulate(&mut self, value: f64) {
        let total = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - total) + value;
        } else {
            self.compensation += (value - total) + self.sum;
        }
        self.sum = total;
    }
}

/// Compares the summed values only.
impl PartialEq for SumAccumulator {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl PartialOrd for SumAccumulator {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value().partial_cmp(&other.value())
    }
}

impl Accumulator for SumAccumulator {
    fn approx_eq(&self, other: &Self) -> bool {
        let scale = self.magnitude.abs().max(other.magnitude.abs());
        self.count == other.count && approx_eq_scaled(self.value(), other.value(), scale)
    }
}

/// Sum of a numeric projection.
#[derive(Clone, Copy, Debug)]
pub struct Sum<F>(F);

pub fn reduce_sum<R, F>(value: F) -> Sum<F>
where
    F: Fn(&R) -> f64,
{
    Sum(value)
}

impl<R, F> Reducer<R> for Sum<F>
where
    F: Fn(&R) -> f64,
{
    type Acc = SumAccumulator;

    fn initial(&self) -> SumAccumulator {
        SumAccumulator::default()
    }

    fn add(&self, acc: &mut SumAccumulator, record: &R) {
        acc.insert((self.0)(record));
    }

    fn remove(&self, acc: &mut SumAccumulator, record: &R) {
        acc.remove((self.0)(record));
    }
}

/// Running count and sum, from which the mean is derived on read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: SumAccumulator,
}

impl MeanAccumulator {
    pub fn count(&self) -> u64 {
        self.sum.count()
    }

    pub fn sum(&self) -> f64 {
        self.sum.value()
    }

    /// `None` when no record is visible.
    pub fn mean(&self) -> Option<f64> {
        (self.count() > 0).then(|| self.sum() / self.count() as f64)
    }

    pub fn mean_or_zero(&self) -> f64 {
        self.mean().unwrap_or(0.0)
    }
}

impl Accumulator for MeanAccumulator {
    fn approx_eq(&self, other: &Self) -> bool {
        self.sum.approx_eq(&other.sum)
    }
}

/// Mean of a numeric projection.
#[derive(Clone, Copy, Debug)]
pub struct Mean<F>(F);

pub fn reduce_mean<R, F>(value: F) -> Mean<F>
where
    F: Fn(&R) -> f64,
{
    Mean(value)
}

impl<R, F> Reducer<R> for Mean<F>
where
    F: Fn(&R) -> f64,
{
    type Acc = MeanAccumulator;

    fn initial(&self) -> MeanAccumulator {
        MeanAccumulator::default()
    }

    fn add(&self, acc: &mut MeanAccumulator, record: &R) {
        acc.sum.insert((self.0)(record));
    }

    fn remove(&self, acc: &mut MeanAccumulator, record: &R) {
        acc.sum.remove((self.0)(record));
    }
}

/// Multiset of values with their multiplicities.
///
/// `max`/`min` read the ends of an ordered map, so removing the current extreme falls back to the
/// next one without rescanning the records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueBag {
    counts: BTreeMap<OrderedFloat<f64>, u32>,
    len: usize,
}

impl ValueBag {
    pub fn insert(&mut self, value: f64) {
        *self.counts.entry(OrderedFloat(value)).or_insert(0) += 1;
        self.len += 1;
    }

    /// Removes one occurrence of `value`. Returns `false` if it was not present.
    pub fn remove(&mut self, value: f64) -> bool {
        let key = OrderedFloat(value);
        let Some(count) = self.counts.get_mut(&key) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&key);
        }
        self.len -= 1;
        true
    }

    pub fn max(&self) -> Option<f64> {
        self.counts.last_key_value().map(|(k, _)| k.0)
    }

    pub fn min(&self) -> Option<f64> {
        self.counts.first_key_value().map(|(k, _)| k.0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Accumulator for ValueBag {
    fn approx_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Tracks every value of a numeric projection so `max`/`min` stay exact under removal.
#[derive(Clone, Copy, Debug)]
pub struct Extremum<F>(F);

pub fn reduce_extremum<R, F>(value: F) -> Extremum<F>
where
    F: Fn(&R) -> f64,
{
    Extremum(value)
}

impl<R, F> Reducer<R> for Extremum<F>
where
    F: Fn(&R) -> f64,
{
    type Acc = ValueBag;

    fn initial(&self) -> ValueBag {
        ValueBag::default()
    }

    fn add(&self, acc: &mut ValueBag, record: &R) {
        acc.insert((self.0)(record));
    }

    fn remove(&self, acc: &mut ValueBag, record: &R) {
        let removed = acc.remove((self.0)(record));
        assert!(removed, "Extremum::remove called for a value that was never added");
    }
}

/// A reducer assembled from three closures.
#[derive(Clone, Copy)]
pub struct FnReducer<I, Add, Rem> {
    initial: I,
    add: Add,
    remove: Rem,
}

/// Builds a reducer from `add`, `remove` and `initial` closures.
///
/// `remove` must exactly undo `add`; see the module documentation.
pub fn reduce<R, A, Add, Rem, I>(add: Add, remove: Rem, initial: I) -> FnReducer<I, Add, Rem>
where
    A: Accumulator,
    Add: Fn(&mut A, &R),
    Rem: Fn(&mut A, &R),
    I: Fn() -> A,
{
    FnReducer {
        initial,
        add,
        remove,
    }
}

impl<R, A, Add, Rem, I> Reducer<R> for FnReducer<I, Add, Rem>
where
    A: Accumulator,
    Add: Fn(&mut A, &R),
    Rem: Fn(&mut A, &R),
    I: Fn() -> A,
{
    type Acc = A;

    fn initial(&self) -> A {
        (self.initial)()
    }

    fn add(&self, acc: &mut A, record: &R) {
        (self.add)(acc, record)
    }

    fn remove(&self, acc: &mut A, record: &R) {
        (self.remove)(acc, record)
    }
}

impl<I, Add, Rem> fmt::Debug for FnReducer<I, Add, Rem> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnReducer").finish_non_exhaustive()
    }
}
