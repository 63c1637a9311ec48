//! [`FilteredBlock`] is the zero-copy position remapping view

use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use crate::block::{Block, fmt_block};
use crate::element::Element;
use crate::private::Sealed;

/// A view over `delegate` whose logical position `i` is backed by the
/// delegate position `positions[i]`. The view holds a non-owning reference
/// plus its own position map and never copies or remaps values: the value
/// space accessor forwards untouched, remapping happens exactly once, at
/// position resolution
///
/// Filtering a view wraps the view itself, which behaves identically to
/// filtering the base with the composed position map
pub struct FilteredBlock<'a, B: Block> {
    delegate: &'a B,
    positions: Vec<u32>,
}

impl<'a, B: Block> FilteredBlock<'a, B> {
    /// Create the view
    ///
    /// Every entry of `positions` must be a valid position of `delegate`, an
    /// out-of-range entry is a caller contract violation. Accesses do not
    /// re-validate, the check only runs under the `verify` feature
    pub fn new(delegate: &'a B, positions: Vec<u32>) -> Self {
        #[cfg(feature = "verify")]
        assert!(
            positions
                .iter()
                .all(|&position| (position as usize) < delegate.position_count())
        );

        Self { delegate, positions }
    }

    /// The delegate position backing the given view position
    #[inline]
    fn delegate_position(&self, position: usize) -> usize {
        self.positions[position] as usize
    }
}

impl<B: Block> Sealed for FilteredBlock<'_, B> {}

impl<B: Block> Block for FilteredBlock<'_, B> {
    type Element = B::Element;

    #[inline]
    fn position_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    fn first_value_index(&self, position: usize) -> usize {
        self.delegate
            .first_value_index(self.delegate_position(position))
    }

    #[inline]
    fn value_count(&self, position: usize) -> usize {
        self.delegate.value_count(self.delegate_position(position))
    }

    #[inline]
    fn is_null(&self, position: usize) -> bool {
        self.delegate.is_null(self.delegate_position(position))
    }

    #[inline]
    fn value(&self, value_index: usize) -> B::Element {
        self.delegate.value(value_index)
    }
}

impl<B: Block> Debug for FilteredBlock<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_block(
            &format!("Filter{}Block", <B::Element as Element>::NAME),
            self,
            f,
        )
    }
}

impl<B: Block, O: Block<Element = B::Element>> PartialEq<O> for FilteredBlock<'_, B> {
    #[inline]
    fn eq(&self, other: &O) -> bool {
        self.eq_block(other)
    }
}

impl<B: Block> Hash for FilteredBlock<'_, B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_block(state);
    }
}
