#![forbid(unsafe_code)]

/// A fixed-length bit vector used for per-dimension pass masks.
///
/// Bits are stored little-endian within each `u64` word:
/// - bit 0 is the LSB of word 0
/// - bit 63 is the MSB of word 0
///
/// Bits past `len` in the last word are always zero, so two vectors of the same length can be
/// compared word by word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
}

impl BitVec {
    pub fn with_len_all_true(bits: usize) -> Self {
        let mut words = vec![u64::MAX; bits.div_ceil(64)];
        let rem = bits % 64;
        if rem != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u64 << rem) - 1;
            }
        }
        Self { words, len: bits }
    }

    pub fn with_len_all_false(bits: usize) -> Self {
        Self {
            words: vec![0u64; bits.div_ceil(64)],
            len: bits,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "BitVec index out of bounds");
        let word = self.words[index / 64];
        ((word >> (index % 64)) & 1) == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.len, "BitVec index out of bounds");
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    /// Indices where `self` and `other` disagree, in increasing order.
    ///
    /// Both vectors must have the same length.
    pub fn iter_differences<'a>(&'a self, other: &'a BitVec) -> impl Iterator<Item = usize> + 'a {
        debug_assert_eq!(self.len, other.len, "BitVec length mismatch");
        self.words
            .iter()
            .zip(other.words.iter())
            .enumerate()
            .flat_map(|(word_idx, (&a, &b))| SetBits { word: a ^ b }.map(move |bit| word_idx * 64 + bit))
    }
}

struct SetBits {
    word: u64,
}

impl Iterator for SetBits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.word == 0 {
            return None;
        }
        let bit = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(bit)
    }
}

#[cfg(test)]
mod tests {
    use super::BitVec;

    #[test]
    fn all_true_masks_tail_bits() {
        let bits = BitVec::with_len_all_true(70);
        assert_eq!(bits.len(), 70);
        assert!(bits.get(69));
        // Tail bits stay clear, so an all-true mask differs from all-false exactly on 0..70.
        let none = BitVec::with_len_all_false(70);
        assert_eq!(bits.iter_differences(&none).count(), 70);
    }

    #[test]
    fn set_is_idempotent() {
        let mut bits = BitVec::with_len_all_false(130);
        bits.set(0, true);
        bits.set(64, true);
        bits.set(129, true);
        bits.set(129, true);
        bits.set(64, false);
        bits.set(63, false);
        assert!(bits.get(0));
        assert!(!bits.get(64));
        assert!(bits.get(129));
        let none = BitVec::with_len_all_false(130);
        assert_eq!(bits.iter_differences(&none).collect::<Vec<_>>(), vec![0, 129]);
    }

    #[test]
    fn differences_cover_both_directions() {
        let mut a = BitVec::with_len_all_false(100);
        let mut b = BitVec::with_len_all_false(100);
        a.set(3, true);
        a.set(70, true);
        b.set(70, true);
        b.set(99, true);
        assert_eq!(a.iter_differences(&b).collect::<Vec<_>>(), vec![3, 99]);
    }
}
