//! Fixed-capacity named-tag registry and per-entity tag bitsets.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Compile-time tag-table capacity.
pub const NUM_TAGS: usize = 16;

/// The reserved slot for the `"broken"` tag, always registered at
/// construction.
pub const BROKEN_TAG_INDEX: usize = 0;

/// A `NUM_TAGS`-bit set, one bit per registered tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet(u16);

impl TagSet {
    pub const EMPTY: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn from_mask(mask: u16) -> Self {
        Self(mask)
    }

    #[inline]
    #[must_use]
    pub const fn mask(self) -> u16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn has(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn unset(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    #[inline]
    #[must_use]
    pub fn test(self, slot: usize) -> bool {
        slot < NUM_TAGS && (self.0 >> slot) & 1 != 0
    }

    #[inline]
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

/// Registry mapping tag names to fixed bit slots. Slot 0 ("broken") is
/// reserved and registered at construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TagRegistry {
    names: [Option<String>; NUM_TAGS],
    used: u16,
}

impl Default for TagRegistry {
    fn default() -> Self {
        let mut reg = Self {
            names: std::array::from_fn(|_| None),
            used: 0,
        };
        reg.names[BROKEN_TAG_INDEX] = Some("broken".to_string());
        reg.used |= 1 << BROKEN_TAG_INDEX;
        reg
    }
}

impl TagRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tag name, returning its single-bit mask. Fails if the
    /// table is full or the name is already registered.
    pub fn add(&mut self, name: &str) -> Result<TagSet> {
        if self.has_name(name) {
            return Err(Error::InvalidInput(format!(
                "tag '{name}' already registered"
            )));
        }
        let slot = self.first_empty()?;
        self.names[slot] = Some(name.to_string());
        self.used |= 1 << slot;
        Ok(TagSet::from_mask(1 << slot))
    }

    fn first_empty(&self) -> Result<usize> {
        (0..NUM_TAGS)
            .find(|&i| self.used & (1 << i) == 0)
            .ok_or_else(|| Error::InvalidInput("tag table is full".to_string()))
    }

    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().flatten().any(|n| n == name)
    }

    #[must_use]
    pub fn has_slot(&self, slot: usize) -> bool {
        slot < NUM_TAGS && self.used & (1 << slot) != 0
    }

    /// Look up a tag's mask by name.
    pub fn get_mask(&self, name: &str) -> Result<TagSet> {
        for i in 0..NUM_TAGS {
            if self.names[i].as_deref() == Some(name) {
                return Ok(TagSet::from_mask(1 << i));
            }
        }
        Err(Error::InvalidInput(format!("unknown tag '{name}'")))
    }

    /// Look up a tag's name by slot index.
    pub fn get_name(&self, slot: usize) -> Result<&str> {
        self.names
            .get(slot)
            .and_then(Option::as_deref)
            .ok_or_else(|| Error::InvalidInput(format!("unknown tag slot {slot}")))
    }

    /// All registered names, in slot order, skipping unused slots.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().filter_map(Option::as_deref)
    }

    /// All registered slots, in order.
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..NUM_TAGS).filter(move |&i| self.has_slot(i))
    }

    #[must_use]
    pub fn broken_mask() -> TagSet {
        TagSet::from_mask(1 << BROKEN_TAG_INDEX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_tag_is_preregistered_at_slot_zero() {
        let reg = TagRegistry::new();
        assert!(reg.has_name("broken"));
        assert_eq!(reg.get_mask("broken").unwrap(), TagRegistry::broken_mask());
    }

    #[test]
    fn add_returns_single_bit_mask_and_rejects_duplicates() {
        let mut reg = TagRegistry::new();
        let m = reg.add("matrix").unwrap();
        assert_eq!(m.mask().count_ones(), 1);
        assert!(reg.add("matrix").is_err());
    }

    #[test]
    fn table_full_fails() {
        let mut reg = TagRegistry::new();
        for i in 1..NUM_TAGS {
            reg.add(&format!("tag{i}")).unwrap();
        }
        assert!(reg.add("overflow").is_err());
    }

    #[test]
    fn unknown_lookup_fails() {
        let reg = TagRegistry::new();
        assert!(reg.get_mask("nope").is_err());
    }
}
