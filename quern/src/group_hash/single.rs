//! Grouping by one primitive key channel

use std::fmt::{self, Debug};
use std::marker::PhantomData;

use data_column::block::{Block, BlockBuilder, BlockImpl, TypedBlock};
use data_column::page::Page;
use data_column::vector::Vector;
use snafu::{OptionExt, ResultExt};

use super::{
    GroupHash, INITIAL_TABLE_CAPACITY, KeyElement, KeyTypeSnafu, MissingChannelSnafu, Result,
    StorageSnafu, hash_ord_to_group,
};
use crate::big_array::BigArrays;
use crate::key_table::KeyTable;

/// Grouping by a single key channel of element type `T`. One table entry
/// per distinct key value, nulls never reach the table
pub struct SingleGroupHash<T: KeyElement, B: BigArrays> {
    channel: usize,
    table: KeyTable<T::Bits, B>,
    _element: PhantomData<T>,
}

impl<T: KeyElement, B: BigArrays> SingleGroupHash<T, B> {
    /// Create the strategy reading its keys from `channel`
    pub fn try_new(channel: usize, big_arrays: &B) -> Result<Self> {
        let table =
            KeyTable::try_new(big_arrays, INITIAL_TABLE_CAPACITY).context(StorageSnafu)?;
        Ok(Self {
            channel,
            table,
            _element: PhantomData,
        })
    }

    fn key_block<'a>(&self, page: &'a Page) -> Result<&'a TypedBlock<T>> {
        let block = page.get_block(self.channel).context(MissingChannelSnafu {
            channel: self.channel,
        })?;
        T::downcast(block).context(KeyTypeSnafu {
            channel: self.channel,
        })
    }
}

impl<T: KeyElement, B: BigArrays> Debug for SingleGroupHash<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SingleGroupHash {{ channel: {}, element: {}, entries: {} }}",
            self.channel,
            T::NAME,
            self.table.size()
        )
    }
}

impl<T: KeyElement, B: BigArrays> GroupHash for SingleGroupHash<T, B> {
    fn add(&mut self, page: &Page) -> Result<TypedBlock<i64>> {
        let block = self.key_block(page)?;
        let position_count = block.position_count();
        if let Some(vector) = block.as_vector() {
            // Dense single-valued keys skip the null handling entirely
            let mut groups = Vec::with_capacity(position_count);
            for position in 0..position_count {
                let ord = self
                    .table
                    .add(vector.get(position).into_bits())
                    .context(StorageSnafu)?;
                groups.push(hash_ord_to_group(ord));
            }
            return Ok(TypedBlock::Vector(Vector::from_values(groups)));
        }

        let mut builder = BlockBuilder::with_capacity(position_count);
        for position in 0..position_count {
            if block.is_null(position) {
                builder.append_null();
            } else {
                // Multi-valued positions group by their first value only
                let key = block.value(block.first_value_index(position));
                let ord = self.table.add(key.into_bits()).context(StorageSnafu)?;
                builder.append_value(hash_ord_to_group(ord));
            }
        }
        Ok(builder.build())
    }

    fn keys(&self) -> Vec<BlockImpl> {
        let size = self.table.size();
        let mut keys = Vec::with_capacity(size as usize);
        for ordinal in 0..size {
            keys.push(T::from_bits(self.table.get(ordinal)));
        }
        vec![T::upcast(TypedBlock::Vector(Vector::from_values(keys)))]
    }

    fn non_empty(&self) -> Vector<i32> {
        Vector::range(0, self.table.size() as i32)
    }

    fn close(&mut self) {
        tracing::debug!(channel = self.channel, entries = self.table.size(), "close group hash");
        self.table.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::big_array::HeapBigArrays;
    use data_column::block::ArrayBlock;
    use data_column::vector::Int64Vector;

    fn page_of(block: TypedBlock<i64>) -> Page {
        Page::try_new(vec![BlockImpl::from(block)]).unwrap()
    }

    fn vector_page(values: Vec<i64>) -> Page {
        page_of(TypedBlock::Vector(Int64Vector::from_values(values)))
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
    fn test_group_ids_are_stable_across_pages() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = SingleGroupHash::<i64, _>::try_new(0, &big_arrays).unwrap();

        let groups = engine.add(&vector_page(vec![10, 20])).unwrap();
        assert_eq!(groups_of(&groups), [Some(0), Some(1)]);

        let groups = engine.add(&vector_page(vec![10, 30])).unwrap();
        assert_eq!(groups_of(&groups), [Some(0), Some(2)]);

        let expect = expect_test::expect![[
            r#"SingleGroupHash { channel: 0, element: Int64, entries: 3 }"#
        ]];
        expect.assert_eq(&format!("{:?}", engine));
        engine.close();
    }

    #[test]
    fn test_null_keys_produce_null_groups() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = SingleGroupHash::<i64, _>::try_new(0, &big_arrays).unwrap();

        let mut builder = BlockBuilder::new();
        builder
            .append_value(5_i64)
            .append_null()
            .append_value(5)
            .append_null()
            .append_value(7);
        let groups = engine.add(&page_of(builder.build())).unwrap();
        assert_eq!(
            groups_of(&groups),
            [Some(0), None, Some(0), None, Some(1)]
        );

        // Nulls never consumed an ordinal
        assert_eq!(engine.non_empty().values(), [0, 1]);
        let keys = engine.keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(
            keys[0],
            BlockImpl::from(Int64Vector::from_values(vec![5, 7]))
        );
        engine.close();
    }

    #[test]
    fn test_vector_fast_path_matches_general_path() {
        let values = vec![4_i64, 8, 4, 15, 8, 16, 23, 42, 4];
        let big_arrays = HeapBigArrays::new();

        let mut fast = SingleGroupHash::<i64, _>::try_new(0, &big_arrays).unwrap();
        let fast_groups = fast.add(&vector_page(values.clone())).unwrap();
        assert!(fast_groups.as_vector().is_some());

        // Same keys in the general array shape, built without densification
        let offsets = (0..=values.len() as u32).collect();
        let array_shaped = TypedBlock::Array(ArrayBlock::try_new(values, offsets).unwrap());
        let mut general = SingleGroupHash::<i64, _>::try_new(0, &big_arrays).unwrap();
        let general_groups = general.add(&page_of(array_shaped)).unwrap();

        assert_eq!(groups_of(&fast_groups), groups_of(&general_groups));
        fast.close();
        general.close();
    }

    #[test]
    fn test_multi_valued_position_groups_by_first_value() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = SingleGroupHash::<i64, _>::try_new(0, &big_arrays).unwrap();

        let mut builder = BlockBuilder::new();
        builder.append_value(7_i64).append_values(&[7, 8]).append_value(8);
        let groups = engine.add(&page_of(builder.build())).unwrap();
        assert_eq!(groups_of(&groups), [Some(0), Some(0), Some(1)]);
        engine.close();
    }

    #[test]
    fn test_float_keys_are_normalized() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = SingleGroupHash::<f64, _>::try_new(0, &big_arrays).unwrap();

        let page = Page::try_new(vec![BlockImpl::from(
            data_column::vector::Float64Vector::from_values(vec![0.0, -0.0, f64::NAN, f64::NAN]),
        )])
        .unwrap();
        let groups = engine.add(&page).unwrap();
        assert_eq!(groups_of(&groups), [Some(0), Some(0), Some(1), Some(1)]);
        engine.close();
    }

    #[test]
    fn test_close_releases_storage() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = SingleGroupHash::<i64, _>::try_new(0, &big_arrays).unwrap();
        engine.add(&vector_page((0..100).collect())).unwrap();
        assert!(big_arrays.used_bytes() > 0);
        engine.close();
        assert_eq!(big_arrays.used_bytes(), 0);
    }

    #[test]
    fn test_wrong_key_type_is_rejected() {
        let big_arrays = HeapBigArrays::new();
        let mut engine = SingleGroupHash::<f64, _>::try_new(0, &big_arrays).unwrap();
        let err = engine.add(&vector_page(vec![1, 2])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Key channel 0 holds an unexpected element type"
        );
        engine.close();
    }
}
