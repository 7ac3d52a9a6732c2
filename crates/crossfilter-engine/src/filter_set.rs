use crossfilter_store::{BitVec, RecordId};

/// Which filters a group observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Every dimension's filter.
    All,
    /// Every filter except the given dimension's own.
    Except(usize),
}

/// Per-record bookkeeping of which dimensions currently reject which records.
///
/// `rejected_by[r]` counts the dimensions whose filter rejects record `r`, so visibility under any
/// scope is an O(1) check and a filter change only touches the records it flips.
#[derive(Clone, Debug)]
pub(crate) struct FilterSet {
    len: usize,
    passes: Vec<BitVec>,
    rejected_by: Vec<u32>,
}

impl FilterSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            len,
            passes: Vec::new(),
            rejected_by: vec![0; len],
        }
    }

    pub(crate) fn add_dimension(&mut self) -> usize {
        self.passes.push(BitVec::with_len_all_true(self.len));
        self.passes.len() - 1
    }

    pub(crate) fn passes(&self, dim: usize) -> &BitVec {
        &self.passes[dim]
    }

    pub(crate) fn rejections(&self, record: RecordId) -> u32 {
        self.rejected_by[record as usize]
    }

    pub(crate) fn reject(&mut self, dim: usize, record: RecordId) {
        debug_assert!(self.passes[dim].get(record as usize));
        self.passes[dim].set(record as usize, false);
        self.rejected_by[record as usize] += 1;
    }

    pub(crate) fn accept(&mut self, dim: usize, record: RecordId) {
        debug_assert!(!self.passes[dim].get(record as usize));
        self.passes[dim].set(record as usize, true);
        self.rejected_by[record as usize] -= 1;
    }

    /// Rejections that do not count against `record` under `scope`.
    fn ignored(&self, scope: Scope, record: RecordId) -> u32 {
        match scope {
            Scope::All => 0,
            Scope::Except(dim) => u32::from(!self.passes[dim].get(record as usize)),
        }
    }

    pub(crate) fn is_visible(&self, record: RecordId, scope: Scope) -> bool {
        self.rejections(record) == self.ignored(scope, record)
    }

    /// How a change of `record`'s rejection count on `changed` affects a group with `scope`.
    ///
    /// Returns `Some(true)` if the record became visible, `Some(false)` if it stopped being
    /// visible, `None` if nothing changed for that group.
    pub(crate) fn visibility_change(
        &self,
        scope: Scope,
        changed: usize,
        record: RecordId,
        before: u32,
        after: u32,
    ) -> Option<bool> {
        if scope == Scope::Except(changed) {
            return None;
        }
        let ignored = self.ignored(scope, record);
        let was = before == ignored;
        let is = after == ignored;
        (was != is).then_some(is)
    }

    pub(crate) fn visible_count(&self) -> usize {
        self.rejected_by.iter().filter(|&&n| n == 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_ignore_their_own_dimension() {
        let mut set = FilterSet::new(3);
        let age = set.add_dimension();
        let sex = set.add_dimension();

        set.reject(age, 1);
        assert!(!set.is_visible(1, Scope::All));
        assert!(set.is_visible(1, Scope::Except(age)));
        assert!(!set.is_visible(1, Scope::Except(sex)));

        let before = set.rejections(1);
        set.reject(sex, 1);
        let after = set.rejections(1);
        assert_eq!(set.visibility_change(Scope::All, sex, 1, before, after), None);
        assert_eq!(
            set.visibility_change(Scope::Except(age), sex, 1, before, after),
            Some(false)
        );
        assert_eq!(set.visibility_change(Scope::Except(sex), sex, 1, before, after), None);
        assert_eq!(set.visible_count(), 2);
    }
}
