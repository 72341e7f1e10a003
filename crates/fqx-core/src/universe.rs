//! # Indexed Universes
//!
//! An `IndexedSet` assigns each distinct item a stable `u32` position. The
//! query's triples and variable names each live in one, and every `Bits` in the
//! planner is positional against one of them.
//!
//! Universes are tagged with a `UniverseId` taken from a process-wide counter so
//! that fragments built against one query can be told apart from fragments built
//! against another.

use crate::bits::Bits;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UNIVERSE: AtomicU64 = AtomicU64::new(1);

/// Identity of one universe instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniverseId(u64);

impl UniverseId {
    pub fn fresh() -> Self {
        UniverseId(NEXT_UNIVERSE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for UniverseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Ordered, duplicate-free, integer-indexed set.
#[derive(Debug, Clone)]
pub struct IndexedSet<T: Hash + Eq> {
    id: UniverseId,
    items: IndexSet<T>,
}

impl<T: Hash + Eq> IndexedSet<T> {
    pub fn new(id: UniverseId) -> Self {
        Self {
            id,
            items: IndexSet::new(),
        }
    }

    /// Build a universe from `items`, keeping the first occurrence of duplicates.
    pub fn from_items(id: UniverseId, items: impl IntoIterator<Item = T>) -> Self {
        Self {
            id,
            items: items.into_iter().collect(),
        }
    }

    pub fn id(&self) -> UniverseId {
        self.id
    }

    /// Insert `item` (if new) and return its position.
    pub fn intern(&mut self, item: T) -> u32 {
        self.items.insert_full(item).0 as u32
    }

    pub fn index_of(&self, item: &T) -> Option<u32> {
        self.items.get_index_of(item).map(|i| i as u32)
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.items.get_index(index as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// The bitset holding every position of this universe.
    pub fn full(&self) -> Bits {
        Bits::full(self.items.len() as u32)
    }

    /// Positions of the given items; unknown items are skipped.
    pub fn subset<'a>(&self, items: impl IntoIterator<Item = &'a T>) -> Bits
    where
        T: 'a,
    {
        items
            .into_iter()
            .filter_map(|item| self.index_of(item))
            .collect()
    }

    /// Items at the positions of `bits`, in position order.
    pub fn items_of<'a>(&'a self, bits: &'a Bits) -> impl Iterator<Item = &'a T> + 'a {
        bits.iter().filter_map(move |i| self.get(i))
    }
}
