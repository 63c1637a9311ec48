//! Grouping by a composite of multiple key channels
//!
//! Each row's keys are widened to 64-bit patterns and chained pairwise
//! through tables of 128-bit entries: the entry of column `k` packs the
//! running group of columns `..k` together with the key bits of column `k`.
//! The ordinals of the last table are the exposed group ids, dense and in
//! first seen order of the full key tuple

use std::fmt::{self, Debug};

use data_column::block::{Block, BlockBuilder, BlockImpl, TypedBlock};
use data_column::element::{Element, ElementType};
use data_column::page::Page;
use data_column::vector::Vector;
use snafu::{OptionExt, ResultExt};

use super::{
    GroupHash, GroupKey, INITIAL_TABLE_CAPACITY, KeyElement, KeyTypeSnafu, MissingChannelSnafu,
    Result, StorageSnafu, hash_ord_to_group,
};
use crate::big_array::BigArrays;
use crate::key_table::KeyTable;

/// Pack the running group of the previous columns with the key bits of the
/// current column. The running group is shifted by one so the first column,
/// which has no previous group, packs a zero
#[inline]
fn pack(running: i64, bits: u64) -> u128 {
    (((running + 1) as u64 as u128) << 64) | bits as u128
}

#[inline]
fn unpack(entry: u128) -> (i64, u64) {
    (((entry >> 64) as u64 as i64) - 1, entry as u64)
}

/// Grouping by multiple key channels. A position whose key is null in any
/// channel resolves to a null group id
pub struct PackedGroupHash<B: BigArrays> {
    keys: Vec<GroupKey>,
    /// One table per key channel, chained in channel order
    tables: Vec<KeyTable<u128, B>>,
}

impl<B: BigArrays> PackedGroupHash<B> {
    /// Create the strategy grouping by the given key channels, in order
    pub fn try_new(keys: &[GroupKey], big_arrays: &B) -> Result<Self> {
        let tables = keys
            .iter()
            .map(|_| KeyTable::try_new(big_arrays, INITIAL_TABLE_CAPACITY).context(StorageSnafu))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            keys: keys.to_vec(),
            tables,
        })
    }

    fn key_columns<'a>(&self, page: &'a Page) -> Result<Vec<&'a BlockImpl>> {
        self.keys
            .iter()
            .map(|key| {
                let column = page
                    .get_block(key.channel)
                    .context(MissingChannelSnafu {
                        channel: key.channel,
                    })?;
                check_key_type(column, key)?;
                Ok(column)
            })
            .collect()
    }
}

/// Validate that the column holds the element type the key was declared with
fn check_key_type(column: &BlockImpl, key: &GroupKey) -> Result<()> {
    let context = KeyTypeSnafu {
        channel: key.channel,
    };
    match key.element_type {
        ElementType::Boolean => bool::downcast(column).context(context).map(drop),
        ElementType::Int32 => i32::downcast(column).context(context).map(drop),
        ElementType::Int64 => i64::downcast(column).context(context).map(drop),
        ElementType::Float64 => f64::downcast(column).context(context).map(drop),
    }
}

/// The widened first-value key bits of one position, `None` for a null
fn wide_key_at(column: &BlockImpl, position: usize) -> Option<u64> {
    fn wide<T: KeyElement>(block: &TypedBlock<T>, position: usize) -> Option<u64> {
        if block.is_null(position) {
            None
        } else {
            Some(block.value(block.first_value_index(position)).into_wide())
        }
    }

    match column {
        BlockImpl::Boolean(block) => wide(block, position),
        BlockImpl::Int32(block) => wide(block, position),
        BlockImpl::Int64(block) => wide(block, position),
        BlockImpl::Float64(block) => wide(block, position),
    }
}

/// Rebuild a typed key column from the widened bit patterns of one channel
fn build_wide_column(element_type: ElementType, bits: Vec<u64>) -> BlockImpl {
    fn build<T: KeyElement>(bits: Vec<u64>) -> BlockImpl {
        T::upcast(TypedBlock::Vector(Vector::from_values(
            bits.into_iter().map(T::from_wide).collect(),
        )))
    }

    match element_type {
        ElementType::Boolean => build::<bool>(bits),
        ElementType::Int32 => build::<i32>(bits),
        ElementType::Int64 => build::<i64>(bits),
        ElementType::Float64 => build::<f64>(bits),
    }
}

impl<B: BigArrays> Debug for PackedGroupHash<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self
            .keys
            .iter()
            .map(|key| key.channel.to_string())
            .collect::<Vec<_>>();
        write!(
            f,
            "PackedGroupHash {{ channels: [{}], entries: {} }}",
            channels.join(", "),
            self.entries()
        )
    }
}

impl<B: BigArrays> PackedGroupHash<B> {
    /// Number of distinct key tuples seen so far
    fn entries(&self) -> i64 {
        self.tables.last().map_or(0, KeyTable::size)
    }
}

impl<B: BigArrays> GroupHash for PackedGroupHash<B> {
    fn add(&mut self, page: &Page) -> Result<TypedBlock<i64>> {
        let columns = self.key_columns(page)?;
        let position_count = page.position_count();
        let mut builder = BlockBuilder::with_capacity(position_count);
        'positions: for position in 0..position_count {
            let mut running = -1_i64;
            for (column, table) in columns.iter().zip(self.tables.iter_mut()) {
                let Some(bits) = wide_key_at(column, position) else {
                    builder.append_null();
                    continue 'positions;
                };
                let ord = table.add(pack(running, bits)).context(StorageSnafu)?;
                running = hash_ord_to_group(ord);
            }
            builder.append_value(running);
        }
        Ok(builder.build())
    }

    fn keys(&self) -> Vec<BlockImpl> {
        let Some((last, rest)) = self.tables.split_last() else {
            return Vec::new();
        };
        let size = last.size();
        let mut columns: Vec<Vec<u64>> = (0..self.keys.len())
            .map(|_| Vec::with_capacity(size as usize))
            .collect();
        for group in 0..size {
            let mut column = self.keys.len();
            let mut entry = last.get(group);
            loop {
                column -= 1;
                let (running, bits) = unpack(entry);
                columns[column].push(bits);
                if column == 0 {
                    break;
                }
                entry = rest[column - 1].get(running);
            }
        }
        self.keys
            .iter()
            .zip(columns)
            .map(|(key, bits)| build_wide_column(key.element_type, bits))
            .collect()
    }

    fn non_empty(&self) -> Vector<i32> {
        Vector::range(0, self.entries() as i32)
    }

    fn close(&mut self) {
        tracing::debug!(entries = self.entries(), "close packed group hash");
        for table in &mut self.tables {
            table.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::big_array::HeapBigArrays;
    use data_column::vector::{BooleanVector, Int64Vector};

    fn key_page(longs: Vec<i64>, booleans: Vec<bool>) -> Page {
        Page::try_new(vec![
            BlockImpl::from(Int64Vector::from_values(longs)),
            BlockImpl::from(BooleanVector::from_values(booleans)),
        ])
        .unwrap()
    }

    fn engine(big_arrays: &HeapBigArrays) -> PackedGroupHash<HeapBigArrays> {
        PackedGroupHash::try_new(
            &[
                GroupKey::new(0, ElementType::Int64),
                GroupKey::new(1, ElementType::Boolean),
            ],
            big_arrays,
        )
        .unwrap()
    }

    fn groups_of(block: &TypedBlock<i64>) -> Vec<Option<i64>> {
        (0..block.position_count())
            .map(|position| {
                (!block.is_null(position))
                    .then(|| block.value(block.first_value_index(position)))
            })
            .collect()
    }

    #[test]
    fn test_tuples_group_together() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = engine(&big_arrays);

        let page = key_page(vec![1, 1, 2, 1], vec![true, false, true, true]);
        let groups = engine.add(&page).unwrap();
        assert_eq!(groups_of(&groups), [Some(0), Some(1), Some(2), Some(0)]);

        // A later page resolves known tuples to their original ids
        let page = key_page(vec![2, 1], vec![true, false]);
        let groups = engine.add(&page).unwrap();
        assert_eq!(groups_of(&groups), [Some(2), Some(1)]);

        assert_eq!(engine.non_empty().values(), [0, 1, 2]);
        engine.close();
    }

    #[test]
    fn test_keys_rebuild_both_columns() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = engine(&big_arrays);
        engine
            .add(&key_page(vec![1, 1, 2], vec![true, false, true]))
            .unwrap();

        let keys = engine.keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys[0],
            BlockImpl::from(Int64Vector::from_values(vec![1, 1, 2]))
        );
        assert_eq!(
            keys[1],
            BlockImpl::from(BooleanVector::from_values(vec![true, false, true]))
        );
        engine.close();
    }

    #[test]
    fn test_growth_preserves_group_ids_and_key_order() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = engine(&big_arrays);

        // 300 distinct tuples, far past the initial table capacity
        let longs = (0..300_i64).collect::<Vec<_>>();
        let booleans = (0..300).map(|row| row % 2 == 0).collect::<Vec<_>>();
        let groups = engine.add(&key_page(longs.clone(), booleans.clone())).unwrap();
        let expected = (0..300_i64).map(Some).collect::<Vec<_>>();
        assert_eq!(groups_of(&groups), expected);

        // Re-adding after several growths resolves to the original ids
        let groups = engine.add(&key_page(longs.clone(), booleans.clone())).unwrap();
        assert_eq!(groups_of(&groups), expected);

        let keys = engine.keys();
        assert_eq!(keys[0], BlockImpl::from(Int64Vector::from_values(longs)));
        assert_eq!(
            keys[1],
            BlockImpl::from(BooleanVector::from_values(booleans))
        );

        engine.close();
        assert_eq!(big_arrays.used_bytes(), 0);
    }

    #[test]
    fn test_null_in_any_channel_is_a_null_group() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = engine(&big_arrays);

        let mut longs = BlockBuilder::new();
        longs.append_value(1_i64).append_null().append_value(1);
        let page = Page::try_new(vec![
            BlockImpl::from(longs.build()),
            BlockImpl::from(BooleanVector::from_values(vec![true, true, true])),
        ])
        .unwrap();

        let groups = engine.add(&page).unwrap();
        assert_eq!(groups_of(&groups), [Some(0), None, Some(0)]);
        assert_eq!(engine.non_empty().values(), [0]);
        engine.close();
    }
}
