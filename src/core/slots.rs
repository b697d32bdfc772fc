//! Id-keyed slot map
//!
//! Ids are chosen by the controller and may be any `u32`, so storage is keyed
//! rather than indexed. Removing drops the entry; nothing ever shifts, so ids
//! stay stable.

use std::collections::BTreeMap;

pub struct Slots<T> {
    slots: BTreeMap<u32, T>,
}

impl<T> Slots<T> {
    pub fn new() -> Self {
        Self { slots: BTreeMap::new() }
    }

    /// Store `value` under `id`. Returns the value back if the slot is taken.
    pub fn insert(&mut self, id: u32, value: T) -> Result<(), T> {
        if self.slots.contains_key(&id) {
            return Err(value);
        }
        self.slots.insert(id, value);
        Ok(())
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        self.slots.remove(&id)
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(&id)
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of occupied slots
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Occupied slots in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.slots.iter().map(|(id, v)| (*id, v))
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.keys().copied()
    }
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_occupied_ids() {
        let mut slots = Slots::new();
        assert!(slots.insert(3, "a").is_ok());
        assert_eq!(slots.insert(3, "b"), Err("b"));
        assert_eq!(slots.get(3), Some(&"a"));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn remove_clears_without_shifting() {
        let mut slots = Slots::new();
        for id in [0u32, 1, 2] {
            slots.insert(id, id * 10).unwrap();
        }
        assert_eq!(slots.remove(1), Some(10));
        assert_eq!(slots.remove(1), None);
        assert_eq!(slots.get(2), Some(&20));
        assert_eq!(slots.ids().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(slots.len(), 2);

        // A freed id can be taken again.
        assert!(slots.insert(1, 11).is_ok());
    }

    #[test]
    fn absent_ids_are_none() {
        let mut slots: Slots<u8> = Slots::new();
        assert!(slots.get(99).is_none());
        assert!(slots.remove(99).is_none());
        assert!(slots.is_empty());
    }

    #[test]
    fn far_apart_ids_stay_sparse_and_ordered() {
        let mut slots = Slots::new();
        slots.insert(u32::MAX, 'z').unwrap();
        slots.insert(4_000_000_000, 'y').unwrap();
        slots.insert(0, 'a').unwrap();

        assert_eq!(slots.len(), 3);
        assert_eq!(slots.get(u32::MAX), Some(&'z'));
        assert_eq!(slots.ids().collect::<Vec<_>>(), vec![0, 4_000_000_000, u32::MAX]);
    }
}
