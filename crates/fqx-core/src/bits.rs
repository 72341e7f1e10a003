//! # Positional Bitsets
//!
//! Every set the planner manipulates (matched triples, variables, fragment
//! combinations) is a set of small integers indexing into one universe. `Bits`
//! wraps a Roaring bitmap and adds the `Eq`/`Hash`/`Ord` implementations the
//! planner needs to keep components in sets and to iterate them in a
//! deterministic order.
//!
//! A `Bits` value carries no reference to its universe. Mixing values from
//! different universes is a caller bug; the planner guards the entry points
//! (see `planner::Planner::plan`).

use roaring::RoaringBitmap;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A set of universe indices.
#[derive(Clone, Default, PartialEq)]
pub struct Bits(RoaringBitmap);

impl Bits {
    pub fn new() -> Self {
        Self(RoaringBitmap::new())
    }

    /// A set holding exactly one index.
    pub fn single(index: u32) -> Self {
        let mut bits = Self::new();
        bits.insert(index);
        bits
    }

    /// The set `{0, 1, .., len - 1}`.
    pub fn full(len: u32) -> Self {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_range(0..len);
        Self(bitmap)
    }

    pub fn insert(&mut self, index: u32) -> bool {
        self.0.insert(index)
    }

    pub fn remove(&mut self, index: u32) -> bool {
        self.0.remove(index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.0.contains(index)
    }

    pub fn len(&self) -> usize {
        self.0.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<u32> {
        self.0.min()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &Bits) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_superset(&self, other: &Bits) -> bool {
        other.0.is_subset(&self.0)
    }

    pub fn intersects(&self, other: &Bits) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn union(&self, other: &Bits) -> Bits {
        Bits(&self.0 | &other.0)
    }

    pub fn intersection(&self, other: &Bits) -> Bits {
        Bits(&self.0 & &other.0)
    }

    pub fn difference(&self, other: &Bits) -> Bits {
        Bits(&self.0 - &other.0)
    }

    pub fn union_with(&mut self, other: &Bits) {
        self.0 |= &other.0;
    }

    pub fn difference_with(&mut self, other: &Bits) {
        self.0 -= &other.0;
    }
}

impl Eq for Bits {}

impl Hash for Bits {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for index in self.0.iter() {
            index.hash(state);
        }
    }
}

/// Lexicographic order over the ascending index sequence.
impl Ord for Bits {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().cmp(other.0.iter())
    }
}

impl PartialOrd for Bits {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromIterator<u32> for Bits {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Bits(iter.into_iter().collect())
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{index}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_set_algebra() {
        let a: Bits = [0, 1, 2].into_iter().collect();
        let b: Bits = [2, 3].into_iter().collect();

        assert_eq!(a.union(&b), [0, 1, 2, 3].into_iter().collect());
        assert_eq!(a.intersection(&b), Bits::single(2));
        assert_eq!(a.difference(&b), [0, 1].into_iter().collect());
        assert!(a.intersects(&b));
        assert!(Bits::single(1).is_subset(&a));
        assert!(a.is_superset(&Bits::single(0)));
        assert_eq!(Bits::full(3), a);
    }

    #[test]
    fn test_equal_sets_hash_alike() {
        let mut set = HashSet::new();
        set.insert([4u32, 1].into_iter().collect::<Bits>());
        set.insert([1u32, 4].into_iter().collect::<Bits>());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_display() {
        let bits: Bits = [3, 0, 7].into_iter().collect();
        assert_eq!(bits.to_string(), "{0, 3, 7}");
        assert_eq!(Bits::new().to_string(), "{}");
    }
}
