//! Growable arrays acquired from an injected, accounted allocator
//!
//! The grouping engine never allocates its table storage directly. Every
//! array comes from a [`BigArrays`] handle and its bytes stay accounted
//! against that handle's budget until the array is explicitly
//! [closed](BigArray::close). Dropping an array without closing it leaks the
//! accounting, which is a caller bug, not something this module can undo

use std::fmt::Debug;
use std::mem::size_of;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use snafu::Snafu;

use crate::private::Sealed;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum BigArrayError {
    #[snafu(display(
        "Allocating {requested} more bytes breaks the limit of {limit} bytes, {used} bytes are in use"
    ))]
    OverLimit {
        requested: usize,
        used: usize,
        limit: usize,
    },
}

/// Result type of the allocator
pub type Result<T> = std::result::Result<T, BigArrayError>;

/// Trait for plain values that can be stored in a [`BigArray`]. This trait
/// is sealed to avoid other types implement it
pub trait BigArrayValue: Sealed + Copy + Default + Debug + Send + Sync + 'static {}

macro_rules! impl_big_array_values {
    ($($ty:ty),*) => {
        $(
            impl Sealed for $ty {}

            impl BigArrayValue for $ty {}
        )*
    };
}

impl_big_array_values!(u8, i32, u32, i64, u64, u128);

/// Factory of growable arrays, injected into every hash table so the
/// table's memory is owned and limited by the execution environment rather
/// than by the table itself
pub trait BigArrays: Debug + Clone + 'static {
    /// Array type handed out by this allocator
    type Array<V: BigArrayValue>: BigArray<V>;

    /// Acquire an array of `len` default-initialized values
    fn new_array<V: BigArrayValue>(&self, len: usize) -> Result<Self::Array<V>>;
}

/// A growable array whose backing storage is reclaimed only by an explicit
/// [`close`](BigArray::close). Indexing out of bounds and any use after
/// close are caller contract violations
pub trait BigArray<V: BigArrayValue>: Debug {
    /// Number of addressable values
    fn len(&self) -> usize;

    /// Returns `true` if the array holds no values
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the value at `index`
    fn get(&self, index: usize) -> V;

    /// Write the value at `index`
    fn set(&mut self, index: usize, value: V);

    /// Grow to at least `min_len` values, geometrically. The new values are
    /// default-initialized. Growth is synchronous and may fail when the
    /// budget is exhausted
    fn grow(&mut self, min_len: usize) -> Result<()>;

    /// Release the backing storage back to the allocator. No call is valid
    /// afterwards
    fn close(&mut self);
}

/// Shared byte budget of a [`HeapBigArrays`]
#[derive(Debug)]
struct Budget {
    limit: usize,
    used: AtomicUsize,
}

impl Budget {
    fn reserve(&self, bytes: usize) -> Result<()> {
        let used = self.used.fetch_add(bytes, Ordering::Relaxed);
        if used + bytes > self.limit {
            self.used.fetch_sub(bytes, Ordering::Relaxed);
            return OverLimitSnafu {
                requested: bytes,
                used,
                limit: self.limit,
            }
            .fail();
        }
        Ok(())
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// Heap backed [`BigArrays`] accounting every allocation against one shared
/// byte budget. Cloned handles share the budget. It doubles as the in-memory
/// allocator used by tests
#[derive(Debug, Clone)]
pub struct HeapBigArrays {
    budget: Arc<Budget>,
}

impl HeapBigArrays {
    /// Create an allocator with an unlimited budget
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Create an allocator that fails any allocation pushing the accounted
    /// total above `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            budget: Arc::new(Budget {
                limit,
                used: AtomicUsize::new(0),
            }),
        }
    }

    /// Bytes currently accounted against the budget
    pub fn used_bytes(&self) -> usize {
        self.budget.used.load(Ordering::Relaxed)
    }
}

impl Default for HeapBigArrays {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl BigArrays for HeapBigArrays {
    type Array<V: BigArrayValue> = HeapArray<V>;

    fn new_array<V: BigArrayValue>(&self, len: usize) -> Result<HeapArray<V>> {
        self.budget.reserve(len * size_of::<V>())?;
        Ok(HeapArray {
            values: vec![V::default(); len],
            budget: Arc::clone(&self.budget),
        })
    }
}

/// Array handed out by [`HeapBigArrays`]
#[derive(Debug)]
pub struct HeapArray<V: BigArrayValue> {
    values: Vec<V>,
    budget: Arc<Budget>,
}

impl<V: BigArrayValue> BigArray<V> for HeapArray<V> {
    #[inline]
    fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn get(&self, index: usize) -> V {
        self.values[index]
    }

    #[inline]
    fn set(&mut self, index: usize, value: V) {
        self.values[index] = value;
    }

    fn grow(&mut self, min_len: usize) -> Result<()> {
        if min_len <= self.values.len() {
            return Ok(());
        }
        let new_len = min_len.max(self.values.len() * 2);
        self.budget
            .reserve((new_len - self.values.len()) * size_of::<V>())?;
        tracing::trace!(old_len = self.values.len(), new_len, "grow heap array");
        self.values.resize(new_len, V::default());
        Ok(())
    }

    fn close(&mut self) {
        self.budget.release(self.values.len() * size_of::<V>());
        self.values = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_accounting() {
        let big_arrays = HeapBigArrays::new();
        let mut array = big_arrays.new_array::<i64>(16).unwrap();
        assert_eq!(big_arrays.used_bytes(), 128);
        assert_eq!(array.len(), 16);
        array.set(3, -9);
        assert_eq!(array.get(3), -9);
        assert_eq!(array.get(4), 0);

        array.grow(17).unwrap();
        // Geometric growth, not minimal
        assert_eq!(array.len(), 32);
        assert_eq!(big_arrays.used_bytes(), 256);
        assert_eq!(array.get(3), -9);

        array.close();
        assert_eq!(big_arrays.used_bytes(), 0);
    }

    #[test]
    fn test_over_limit() {
        let big_arrays = HeapBigArrays::with_limit(128);
        let mut array = big_arrays.new_array::<i64>(16).unwrap();
        assert!(array.grow(17).is_err());
        // A failed growth leaves the accounting untouched
        assert_eq!(big_arrays.used_bytes(), 128);
        array.close();
        assert!(big_arrays.new_array::<u128>(9).is_err());
    }

    #[test]
    fn test_drop_without_close_leaks_accounting() {
        let big_arrays = HeapBigArrays::new();
        let array = big_arrays.new_array::<u64>(8).unwrap();
        drop(array);
        assert_eq!(big_arrays.used_bytes(), 64);
    }
}
