//! The [`GroupHash`] family converts the key column(s) of every incoming
//! [`Page`] into a parallel column of dense, stable group ids
//!
//! An engine instance is open from construction until
//! [`close`](GroupHash::close) and is write-active and read-active
//! simultaneously throughout that window, there is no finalized state.
//! Instances are driven by exactly one pipeline stage at a time: parallel
//! grouping is sharded upstream and merged downstream, never shared

mod packed;
mod single;

pub use packed::PackedGroupHash;
pub use single::SingleGroupHash;

use std::fmt::Debug;

use data_column::block::{BlockError, BlockImpl, TypedBlock};
use data_column::element::{Element, ElementType};
use data_column::page::Page;
use data_column::vector::Vector;
use snafu::Snafu;

use crate::big_array::{BigArrayError, BigArrays};
use crate::key_table::FixedKey;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum GroupHashError {
    #[snafu(display("Group by requires at least one key channel"))]
    EmptyKeys,
    #[snafu(display("Page has no channel {channel}"))]
    MissingChannel { channel: usize },
    #[snafu(display("Key channel {channel} holds an unexpected element type"))]
    KeyType {
        channel: usize,
        source: BlockError,
    },
    #[snafu(display("Hash table storage exhausted"))]
    Storage { source: BigArrayError },
}

/// Result type of the grouping engine
pub type Result<T> = std::result::Result<T, GroupHashError>;

/// Capacity the key tables start with, they grow on demand
const INITIAL_TABLE_CAPACITY: usize = 1;

/// Translate the ordinal encoding returned by [`KeyTable::add`] into the
/// group id space exposed to callers
///
/// [`KeyTable::add`]: crate::key_table::KeyTable::add
#[inline]
pub fn hash_ord_to_group(ord: i64) -> i64 {
    if ord < 0 { -1 - ord } else { ord }
}

/// One key channel of a grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupKey {
    /// Channel of the page holding the key column
    pub channel: usize,
    /// Element type of the key column
    pub element_type: ElementType,
}

impl GroupKey {
    /// Create a new [`GroupKey`]
    #[inline]
    pub fn new(channel: usize, element_type: ElementType) -> Self {
        Self {
            channel,
            element_type,
        }
    }
}

/// Contract shared by every grouping strategy
///
/// Group ids are assigned in first seen order across the whole lifetime of
/// the engine: re-encountering a key at any later position or page resolves
/// to the exact id the key was first assigned
pub trait GroupHash: Debug {
    /// Resolve every position of the key channel(s) of `page` to its group
    /// id, aligned position for position with the page
    ///
    /// Null key positions produce a null group id and never consume an
    /// ordinal. Multi-valued positions group by their first value only
    fn add(&mut self, page: &Page) -> Result<TypedBlock<i64>>;

    /// The distinct keys seen so far, in ordinal order, one column per key
    /// channel: value `j` of column `i` is the key that was assigned group
    /// id `j`. Single-pass consumption is expected, the columns reflect the
    /// table state at call time
    fn keys(&self) -> Vec<BlockImpl>;

    /// The contiguous ordinal range `[0, distinct key count)`, the groups
    /// materialized so far independent of page boundaries
    fn non_empty(&self) -> Vector<i32>;

    /// Release the backing hash storage back to the allocator. No call is
    /// valid afterwards
    fn close(&mut self);
}

/// Trait mapping a key element to the fixed width bit patterns the key
/// tables store. Floats are normalized first so `NaN` and `-0.0` each group
/// as one key
pub trait KeyElement: Element {
    /// Bit pattern stored in a typed single-key table
    type Bits: FixedKey;

    /// Into the typed bit pattern
    fn into_bits(self) -> Self::Bits;

    /// Back from the typed bit pattern
    fn from_bits(bits: Self::Bits) -> Self;

    /// Widen to the common 64-bit pattern used by packed composite keys
    fn into_wide(self) -> u64;

    /// Back from the widened bit pattern
    fn from_wide(bits: u64) -> Self;
}

impl KeyElement for bool {
    type Bits = u8;

    #[inline]
    fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    fn from_bits(bits: u8) -> bool {
        bits != 0
    }

    #[inline]
    fn into_wide(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_wide(bits: u64) -> bool {
        bits != 0
    }
}

impl KeyElement for i32 {
    type Bits = i32;

    #[inline]
    fn into_bits(self) -> i32 {
        self
    }

    #[inline]
    fn from_bits(bits: i32) -> i32 {
        bits
    }

    #[inline]
    fn into_wide(self) -> u64 {
        self as u32 as u64
    }

    #[inline]
    fn from_wide(bits: u64) -> i32 {
        bits as u32 as i32
    }
}

impl KeyElement for i64 {
    type Bits = i64;

    #[inline]
    fn into_bits(self) -> i64 {
        self
    }

    #[inline]
    fn from_bits(bits: i64) -> i64 {
        bits
    }

    #[inline]
    fn into_wide(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_wide(bits: u64) -> i64 {
        bits as i64
    }
}

impl KeyElement for f64 {
    type Bits = u64;

    #[inline]
    fn into_bits(self) -> u64 {
        data_column::element::normalize(self).to_bits()
    }

    #[inline]
    fn from_bits(bits: u64) -> f64 {
        f64::from_bits(bits)
    }

    #[inline]
    fn into_wide(self) -> u64 {
        self.into_bits()
    }

    #[inline]
    fn from_wide(bits: u64) -> f64 {
        f64::from_bits(bits)
    }
}

/// Create the grouping strategy for the given key channels: one typed table
/// for a single key, chained packed tables for a composite key
pub fn new_group_hash<B: BigArrays>(
    keys: &[GroupKey],
    big_arrays: &B,
) -> Result<Box<dyn GroupHash>> {
    match keys {
        [] => EmptyKeysSnafu.fail(),
        [key] => {
            let strategy: Box<dyn GroupHash> = match key.element_type {
                ElementType::Boolean => {
                    Box::new(SingleGroupHash::<bool, B>::try_new(key.channel, big_arrays)?)
                }
                ElementType::Int32 => {
                    Box::new(SingleGroupHash::<i32, B>::try_new(key.channel, big_arrays)?)
                }
                ElementType::Int64 => {
                    Box::new(SingleGroupHash::<i64, B>::try_new(key.channel, big_arrays)?)
                }
                ElementType::Float64 => {
                    Box::new(SingleGroupHash::<f64, B>::try_new(key.channel, big_arrays)?)
                }
            };
            Ok(strategy)
        }
        keys => Ok(Box::new(PackedGroupHash::try_new(keys, big_arrays)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::big_array::HeapBigArrays;

    #[test]
    fn test_hash_ord_to_group() {
        assert_eq!(hash_ord_to_group(0), 0);
        assert_eq!(hash_ord_to_group(7), 7);
        assert_eq!(hash_ord_to_group(-1), 0);
        assert_eq!(hash_ord_to_group(-8), 7);
    }

    #[test]
    fn test_factory_dispatch() {
        let big_arrays = HeapBigArrays::new();

        let err = new_group_hash(&[], &big_arrays).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Group by requires at least one key channel"
        );

        let mut single =
            new_group_hash(&[GroupKey::new(0, ElementType::Int64)], &big_arrays).unwrap();
        assert!(format!("{single:?}").starts_with("SingleGroupHash"));
        single.close();

        let mut packed = new_group_hash(
            &[
                GroupKey::new(0, ElementType::Int64),
                GroupKey::new(1, ElementType::Boolean),
            ],
            &big_arrays,
        )
        .unwrap();
        assert!(format!("{packed:?}").starts_with("PackedGroupHash"));
        packed.close();
        assert_eq!(big_arrays.used_bytes(), 0);
    }
}
