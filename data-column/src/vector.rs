//! [`Vector`] is the dense, non-nullable, single-valued column shape

use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use crate::block::{Block, fmt_block};
use crate::element::Element;
use crate::macros::for_all_element_types;
use crate::private::Sealed;

/// Dense column with exactly one non-null value per position. A [`Vector`]
/// exclusively owns its backing value array and never mutates after
/// construction, the first value index of position `p` is `p` itself
#[derive(Clone)]
pub struct Vector<T: Element> {
    values: Vec<T>,
}

impl<T: Element> Vector<T> {
    /// Create a new [`Vector`] that owns the given values
    #[inline]
    pub fn from_values(values: Vec<T>) -> Self {
        Self { values }
    }

    /// Get the value at the given position. It will panic if the position is
    /// out of bounds
    #[inline]
    pub fn get(&self, position: usize) -> T {
        self.values[position]
    }

    /// Get the number of positions in the [`Vector`]
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the [`Vector`] contains no positions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// View the backing values as a slice
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Get the iterator of values in the [`Vector`]
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.values.iter().copied()
    }
}

impl Vector<i32> {
    /// [`Vector`] of the contiguous integer range `[start, end)`
    pub fn range(start: i32, end: i32) -> Self {
        Self {
            values: (start..end).collect(),
        }
    }
}

impl<T: Element> FromIterator<T> for Vector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<T: Element> Sealed for Vector<T> {}

impl<T: Element> Block for Vector<T> {
    type Element = T;

    #[inline]
    fn position_count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn first_value_index(&self, position: usize) -> usize {
        position
    }

    #[inline]
    fn value_count(&self, _position: usize) -> usize {
        1
    }

    #[inline]
    fn is_null(&self, _position: usize) -> bool {
        false
    }

    #[inline]
    fn value(&self, value_index: usize) -> T {
        self.values[value_index]
    }

    #[inline]
    fn as_vector(&self) -> Option<&Vector<T>> {
        Some(self)
    }
}

impl<T: Element> Debug for Vector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_block(&format!("{}Vector", T::NAME), self, f)
    }
}

impl<T: Element> PartialEq for Vector<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<T: Element> Hash for Vector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_block(state);
    }
}

macro_rules! alias {
    ($({$variant:ident, $ty:ty}),+) => {
        paste::paste! {
            $(
                #[doc = concat!("A [`Vector`] of [`", stringify!($ty), "`]")]
                pub type [<$variant Vector>] = Vector<$ty>;
            )+
        }
    };
}

for_all_element_types!(alias);
