use std::fmt;
use std::ops::Range;
use std::rc::Rc;

/// A predicate over a dimension's key.
///
/// Exact and range filters resolve to a contiguous slice of the dimension's sorted index, which
/// lets the engine diff two of them without touching unaffected records.
pub enum Filter<K> {
    Exact(K),
    /// Half-open `[lower, upper)`. An empty or inverted range selects nothing.
    Range(K, K),
    /// Membership in a set of keys.
    In(Vec<K>),
    /// Arbitrary predicate; evaluated once per distinct key.
    Predicate(Rc<dyn Fn(&K) -> bool>),
}

impl<K> Filter<K> {
    pub fn range(range: Range<K>) -> Self {
        Filter::Range(range.start, range.end)
    }

    pub fn one_of(keys: impl IntoIterator<Item = K>) -> Self {
        Filter::In(keys.into_iter().collect())
    }

    pub fn predicate(predicate: impl Fn(&K) -> bool + 'static) -> Self {
        Filter::Predicate(Rc::new(predicate))
    }
}

impl<K: Clone> Clone for Filter<K> {
    fn clone(&self) -> Self {
        match self {
            Filter::Exact(k) => Filter::Exact(k.clone()),
            Filter::Range(lo, hi) => Filter::Range(lo.clone(), hi.clone()),
            Filter::In(keys) => Filter::In(keys.clone()),
            Filter::Predicate(p) => Filter::Predicate(Rc::clone(p)),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for Filter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Exact(k) => f.debug_tuple("Exact").field(k).finish(),
            Filter::Range(lo, hi) => f.debug_tuple("Range").field(lo).field(hi).finish(),
            Filter::In(keys) => f.debug_tuple("In").field(keys).finish(),
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
