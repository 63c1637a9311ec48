//! [`KeyTable`] assigns dense ordinals to distinct keys

use std::fmt::{self, Debug};
use std::hash::{BuildHasher, Hash};

use crate::big_array::{BigArray, BigArrayValue, BigArrays, Result};
use crate::hash::{BUILD_HASHER_DEFAULT, BuildHasherDefault};

/// Trait for the fixed width key bit patterns a table can store
pub trait FixedKey: BigArrayValue + Eq + Hash {}

impl<K: BigArrayValue + Eq + Hash> FixedKey for K {}

/// Open addressing, linear probing table mapping each distinct key to a
/// dense ordinal. Ordinals are assigned in first seen order starting at
/// zero, never reused and never reassigned, independent of how the keys are
/// spread across batches
///
/// Slots store `ordinal + 1` so zero marks an empty slot. The slots array
/// has power of two capacity and is grown at 3/4 load, the keys array maps
/// ordinals back to the keys that own them. Both arrays come from the
/// injected [`BigArrays`] and are released only by [`close`](KeyTable::close)
pub struct KeyTable<K: FixedKey, B: BigArrays> {
    big_arrays: B,
    slots: B::Array<i64>,
    keys: B::Array<K>,
    size: i64,
    mask: u64,
    grow_at: i64,
    build_hasher: BuildHasherDefault,
}

impl<K: FixedKey, B: BigArrays> KeyTable<K, B> {
    /// Create a table sized for `capacity` distinct keys
    pub fn try_new(big_arrays: &B, capacity: usize) -> Result<Self> {
        let slots_len = (capacity.max(1) * 4).div_ceil(3).next_power_of_two();
        let slots = big_arrays.new_array::<i64>(slots_len)?;
        let keys = big_arrays.new_array::<K>(capacity.max(1))?;
        Ok(Self {
            big_arrays: big_arrays.clone(),
            slots,
            keys,
            size: 0,
            mask: (slots_len - 1) as u64,
            grow_at: (slots_len * 3 / 4) as i64,
            build_hasher: BUILD_HASHER_DEFAULT,
        })
    }

    /// Number of distinct keys added so far
    #[inline]
    pub fn size(&self) -> i64 {
        self.size
    }

    #[inline]
    fn home_slot(&self, key: &K, mask: u64) -> usize {
        (self.build_hasher.hash_one(key) & mask) as usize
    }

    /// Add `key` to the table
    ///
    /// Returns the newly assigned ordinal for a first seen key and
    /// `-1 - ordinal` for a key that is already present, so adding the same
    /// key any number of times always resolves to the same ordinal
    pub fn add(&mut self, key: K) -> Result<i64> {
        if self.size >= self.grow_at {
            self.grow()?;
        }
        let mut slot = self.home_slot(&key, self.mask);
        loop {
            let stored = self.slots.get(slot);
            if stored == 0 {
                return self.insert(slot, key);
            }
            let ordinal = stored - 1;
            if self.keys.get(ordinal as usize) == key {
                return Ok(-1 - ordinal);
            }
            slot = (slot + 1) & self.mask as usize;
        }
    }

    fn insert(&mut self, slot: usize, key: K) -> Result<i64> {
        let ordinal = self.size;
        if ordinal as usize >= self.keys.len() {
            self.keys.grow(ordinal as usize + 1)?;
        }
        self.slots.set(slot, ordinal + 1);
        self.keys.set(ordinal as usize, key);
        self.size += 1;
        Ok(ordinal)
    }

    /// The key that was assigned `ordinal`
    ///
    /// `ordinal` must be in `[0, self.size())`
    #[inline]
    pub fn get(&self, ordinal: i64) -> K {
        self.keys.get(ordinal as usize)
    }

    /// Double the slots array and rehash every assigned ordinal into it. The
    /// ordinals themselves are untouched
    fn grow(&mut self) -> Result<()> {
        let new_slots_len = (self.mask as usize + 1) * 2;
        tracing::trace!(size = self.size, new_slots_len, "grow key table");
        let mut new_slots = self.big_arrays.new_array::<i64>(new_slots_len)?;
        let new_mask = (new_slots_len - 1) as u64;
        for ordinal in 0..self.size {
            let key = self.keys.get(ordinal as usize);
            let mut slot = self.home_slot(&key, new_mask);
            while new_slots.get(slot) != 0 {
                slot = (slot + 1) & new_mask as usize;
            }
            new_slots.set(slot, ordinal + 1);
        }
        self.slots.close();
        self.slots = new_slots;
        self.mask = new_mask;
        self.grow_at = (new_slots_len * 3 / 4) as i64;
        Ok(())
    }

    /// Release the backing arrays back to the allocator. No call is valid
    /// afterwards
    pub fn close(&mut self) {
        self.slots.close();
        self.keys.close();
    }
}

impl<K: FixedKey, B: BigArrays> Debug for KeyTable<K, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyTable {{ size: {}, slots: {} }}",
            self.size,
            self.mask + 1
        )
    }
}
