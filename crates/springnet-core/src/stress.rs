//! Per-tag virial stress bookkeeping with a commutative merge, suitable as
//! a parallel reduction identity.

use crate::tags::{TagSet, NUM_TAGS};
use crate::vec2::Tensor2;

/// One `Tensor2` per initialised tag, plus a running total, plus a bitset
/// of which tags have been initialised.
#[derive(Clone, Debug, Default)]
pub struct StressAccumulator {
    values: [Tensor2; NUM_TAGS],
    initialised: TagSet,
    total: Tensor2,
}

impl StressAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialise every tag set in `tags` (that isn't already initialised)
    /// to zero.
    pub fn init(&mut self, tags: TagSet) {
        for slot in 0..NUM_TAGS {
            let bit = TagSet::from_mask(1 << slot);
            if tags.has(bit) && !self.initialised.has(bit) {
                self.initialised.set(bit);
                self.values[slot] = Tensor2::ZERO;
            }
        }
    }

    #[must_use]
    pub fn is_initialised(&self, tag: TagSet) -> bool {
        self.initialised.has(tag)
    }

    #[must_use]
    pub fn total(&self) -> Tensor2 {
        self.total
    }

    /// The accumulated value for a single-bit tag, if initialised.
    #[must_use]
    pub fn get(&self, tag: TagSet) -> Option<Tensor2> {
        for slot in 0..NUM_TAGS {
            let bit = TagSet::from_mask(1 << slot);
            if tag.has(bit) {
                return if self.initialised.has(bit) {
                    Some(self.values[slot])
                } else {
                    None
                };
            }
        }
        None
    }

    pub fn zero(&mut self) {
        self.values = [Tensor2::ZERO; NUM_TAGS];
        self.total = Tensor2::ZERO;
    }

    /// Add `stress` to the running total and to every initialised tag
    /// present in `tags`.
    pub fn distribute(&mut self, stress: Tensor2, tags: TagSet) {
        self.total += stress;
        let overlap = self.initialised.intersection(tags);
        for slot in 0..NUM_TAGS {
            if overlap.test(slot) {
                self.values[slot] += stress;
            }
        }
    }

    /// Commutative, associative merge: `other`'s total folds into `self`'s;
    /// a tag initialised only in `other` becomes initialised in `self`.
    pub fn merge(&mut self, other: &Self) {
        self.total += other.total;
        for slot in 0..NUM_TAGS {
            let bit = TagSet::from_mask(1 << slot);
            if other.initialised.has(bit) {
                if self.initialised.has(bit) {
                    self.values[slot] += other.values[slot];
                } else {
                    self.initialised.set(bit);
                    self.values[slot] = other.values[slot];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribute_adds_to_total_and_matching_tags() {
        let mut acc = StressAccumulator::new();
        let matrix = TagSet::from_mask(1 << 1);
        let sac = TagSet::from_mask(1 << 2);
        acc.init(matrix.union(sac));

        let s = Tensor2::new(1.0, 0.0, 0.0, 1.0);
        acc.distribute(s, matrix);

        assert_eq!(acc.total(), s);
        assert_eq!(acc.get(matrix), Some(s));
        assert_eq!(acc.get(sac), Some(Tensor2::ZERO));
    }

    #[test]
    fn merge_is_commutative_and_lossless_for_disjoint_tags() {
        let mut a = StressAccumulator::new();
        let mut b = StressAccumulator::new();
        let t1 = TagSet::from_mask(1 << 1);
        let t2 = TagSet::from_mask(1 << 2);
        a.init(t1);
        b.init(t2);
        a.distribute(Tensor2::new(1.0, 0.0, 0.0, 0.0), t1);
        b.distribute(Tensor2::new(0.0, 0.0, 0.0, 2.0), t2);

        let mut merged_ab = a.clone();
        merged_ab.merge(&b);
        let mut merged_ba = b.clone();
        merged_ba.merge(&a);

        assert_eq!(merged_ab.total(), merged_ba.total());
        assert_eq!(merged_ab.get(t1), merged_ba.get(t1));
        assert_eq!(merged_ab.get(t2), merged_ba.get(t2));
    }
}
