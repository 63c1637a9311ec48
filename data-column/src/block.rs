//! [`Block`] is the contract shared by every column shape

use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use snafu::{Snafu, ensure};

use crate::element::{Element, ElementType};
use crate::filtered::FilteredBlock;
use crate::macros::for_all_element_types;
use crate::private::Sealed;
use crate::vector::Vector;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
// The `Convert` selector is constructed by the downcast hooks in `element`
#[snafu(visibility(pub(crate)))]
pub enum BlockError {
    #[snafu(display("Can not convert `BlockImpl::{block}` into a `{target}` column"))]
    Convert {
        block: &'static str,
        target: &'static str,
    },
    #[snafu(display(
        "Offsets are not a valid position structure for {values} values: {offsets:?}"
    ))]
    InvalidOffsets { offsets: Vec<u32>, values: usize },
}

type Result<T> = std::result::Result<T, BlockError>;

/// A trait over all column shapes
///
/// A *position* is one logical row slot. It resolves to zero, one or many
/// slots of the flat value space through
/// [`first_value_index`](Block::first_value_index) and
/// [`value_count`](Block::value_count), a position with no value is null.
/// Containers never mutate after construction
pub trait Block: Sealed + Debug {
    /// Element stored in the value space of the column
    type Element: Element;

    /// Get the number of logical positions
    fn position_count(&self) -> usize;

    /// Index of the first value of `position` in the value space
    fn first_value_index(&self, position: usize) -> usize;

    /// Number of values of `position`, zero for a null position
    fn value_count(&self, position: usize) -> usize;

    /// Returns `true` if the position holds no value
    #[inline]
    fn is_null(&self, position: usize) -> bool {
        self.value_count(position) == 0
    }

    /// Get the value at the given index of the value space. The index must
    /// already be resolved through the position structure, filtered views
    /// forward it to their delegate untouched
    fn value(&self, value_index: usize) -> Self::Element;

    /// Iterator over the ordered value run of `position`
    #[inline]
    fn values_at(&self, position: usize) -> impl Iterator<Item = Self::Element> + '_ {
        let start = self.first_value_index(position);
        (start..start + self.value_count(position)).map(|value_index| self.value(value_index))
    }

    /// View the column as a dense non-nullable [`Vector`]. Returns `None`
    /// when the positions are not addressable one to one without remapping,
    /// callers needing the fast path must fall back to the general
    /// per-position accessors
    #[inline]
    fn as_vector(&self) -> Option<&Vector<Self::Element>> {
        None
    }

    /// Create a view of this column whose logical position `i` is backed by
    /// position `positions[i]` of `self`, without copying any value
    ///
    /// Every entry must be a valid position of `self`. The view does not
    /// re-validate on access, the check only runs under the `verify` feature
    #[inline]
    fn filter(&self, positions: Vec<u32>) -> FilteredBlock<'_, Self>
    where
        Self: Sized,
    {
        FilteredBlock::new(self, positions)
    }

    /// Order and null sensitive equality across column shapes: equal position
    /// counts and, for every position, equal null-ness and equal ordered
    /// value runs
    fn eq_block(&self, other: &impl Block<Element = Self::Element>) -> bool
    where
        Self: Sized,
    {
        self.position_count() == other.position_count()
            && (0..self.position_count()).all(|position| {
                self.value_count(position) == other.value_count(position)
                    && self.values_at(position).eq(other.values_at(position))
            })
    }

    /// Feed the column into the hasher, consistent with
    /// [`eq_block`](Block::eq_block)
    fn hash_block<H: Hasher>(&self, state: &mut H)
    where
        Self: Sized,
    {
        state.write_usize(self.position_count());
        for position in 0..self.position_count() {
            state.write_usize(self.value_count(position));
            for value in self.values_at(position) {
                value.write_hash(state);
            }
        }
    }
}

/// Format `block` in the canonical `Name[positions=N, values=[...]]` shape:
/// single-valued positions render the bare value, multi-valued positions a
/// bracketed sub-list, null positions `null`
pub(crate) fn fmt_block<B: Block>(name: &str, block: &B, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{name}[positions={}, values=[", block.position_count())?;
    for position in 0..block.position_count() {
        if position > 0 {
            write!(f, ", ")?;
        }
        match block.value_count(position) {
            0 => write!(f, "null")?,
            1 => write!(f, "{}", block.value(block.first_value_index(position)))?,
            _ => {
                write!(f, "[")?;
                for (nth, value) in block.values_at(position).enumerate() {
                    if nth > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")?;
            }
        }
    }
    write!(f, "]]")
}

/// Render one position of `block` as a table cell
pub(crate) fn position_display<B: Block>(block: &B, position: usize) -> String {
    match block.value_count(position) {
        0 => "Null".to_string(),
        1 => block.value(block.first_value_index(position)).to_string(),
        _ => {
            let values = block
                .values_at(position)
                .map(|value| value.to_string())
                .collect::<Vec<_>>();
            format!("[{}]", values.join(", "))
        }
    }
}

/// Nullable, possibly multi-valued column. The flat value array is addressed
/// through a monotonic offsets array: the value run of position `p` is
/// `offsets[p]..offsets[p + 1]`, an empty run marks a null
#[derive(Clone)]
pub struct ArrayBlock<T: Element> {
    values: Vec<T>,
    /// `position_count + 1` entries
    offsets: Vec<u32>,
}

impl<T: Element> ArrayBlock<T> {
    /// Create a new [`ArrayBlock`] from the flat value array and the offsets
    /// of the value run of each position
    ///
    /// The offsets must be monotonically non-decreasing and stay within the
    /// value array, `offsets.len() - 1` is the position count
    pub fn try_new(values: Vec<T>, offsets: Vec<u32>) -> Result<Self> {
        let monotonic = match offsets.last() {
            Some(&last) => {
                last as usize <= values.len()
                    && offsets.windows(2).all(|window| window[0] <= window[1])
            }
            None => false,
        };
        ensure!(
            monotonic,
            InvalidOffsetsSnafu {
                offsets,
                values: values.len()
            }
        );
        Ok(Self { values, offsets })
    }

    pub(crate) fn new_unchecked(values: Vec<T>, offsets: Vec<u32>) -> Self {
        Self { values, offsets }
    }
}

impl<T: Element> Sealed for ArrayBlock<T> {}

impl<T: Element> Block for ArrayBlock<T> {
    type Element = T;

    #[inline]
    fn position_count(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    fn first_value_index(&self, position: usize) -> usize {
        self.offsets[position] as usize
    }

    #[inline]
    fn value_count(&self, position: usize) -> usize {
        (self.offsets[position + 1] - self.offsets[position]) as usize
    }

    #[inline]
    fn value(&self, value_index: usize) -> T {
        self.values[value_index]
    }
}

impl<T: Element> Debug for ArrayBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_block(&format!("{}ArrayBlock", T::NAME), self, f)
    }
}

impl<T: Element> PartialEq for ArrayBlock<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.eq_block(other)
    }
}

impl<T: Element> Hash for ArrayBlock<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_block(state);
    }
}

/// Builder of one column. [`build`](BlockBuilder::build) degrades to the
/// dense [`Vector`] shape when every appended position held exactly one
/// value, which is what enables the vector fast path of the consumers
pub struct BlockBuilder<T: Element> {
    values: Vec<T>,
    offsets: Vec<u32>,
    dense: bool,
}

impl<T: Element> BlockBuilder<T> {
    /// Create a new empty [`BlockBuilder`]
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new empty [`BlockBuilder`] with room for `position_count`
    /// positions
    pub fn with_capacity(position_count: usize) -> Self {
        let mut offsets = Vec::with_capacity(position_count + 1);
        offsets.push(0);
        Self {
            values: Vec::with_capacity(position_count),
            offsets,
            dense: true,
        }
    }

    /// Append a position holding a single value
    #[inline]
    pub fn append_value(&mut self, value: T) -> &mut Self {
        self.values.push(value);
        self.offsets.push(self.values.len() as u32);
        self
    }

    /// Append a null position
    #[inline]
    pub fn append_null(&mut self) -> &mut Self {
        self.offsets.push(self.values.len() as u32);
        self.dense = false;
        self
    }

    /// Append a multi-valued position holding `values` in order. An empty
    /// slice behaves like [`append_null`](BlockBuilder::append_null)
    pub fn append_values(&mut self, values: &[T]) -> &mut Self {
        if values.len() != 1 {
            self.dense = false;
        }
        self.values.extend_from_slice(values);
        self.offsets.push(self.values.len() as u32);
        self
    }

    /// Build the column, choosing the cheapest shape that can represent it
    pub fn build(self) -> TypedBlock<T> {
        if self.dense {
            TypedBlock::Vector(Vector::from_values(self.values))
        } else {
            TypedBlock::Array(ArrayBlock::new_unchecked(self.values, self.offsets))
        }
    }
}

impl<T: Element> Default for BlockBuilder<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Debug for BlockBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}BlockBuilder {{ positions: {} }}",
            T::NAME,
            self.offsets.len() - 1
        )
    }
}

/// A concrete column of `T`: either the dense [`Vector`] shape or the general
/// nullable multi-value [`ArrayBlock`] shape
#[derive(Clone)]
pub enum TypedBlock<T: Element> {
    /// Dense non-nullable shape
    Vector(Vector<T>),
    /// Nullable, possibly multi-valued shape
    Array(ArrayBlock<T>),
}

impl<T: Element> Sealed for TypedBlock<T> {}

impl<T: Element> Block for TypedBlock<T> {
    type Element = T;

    #[inline]
    fn position_count(&self) -> usize {
        match self {
            Self::Vector(vector) => vector.position_count(),
            Self::Array(block) => block.position_count(),
        }
    }

    #[inline]
    fn first_value_index(&self, position: usize) -> usize {
        match self {
            Self::Vector(vector) => vector.first_value_index(position),
            Self::Array(block) => block.first_value_index(position),
        }
    }

    #[inline]
    fn value_count(&self, position: usize) -> usize {
        match self {
            Self::Vector(vector) => vector.value_count(position),
            Self::Array(block) => block.value_count(position),
        }
    }

    #[inline]
    fn value(&self, value_index: usize) -> T {
        match self {
            Self::Vector(vector) => Block::value(vector, value_index),
            Self::Array(block) => block.value(value_index),
        }
    }

    #[inline]
    fn as_vector(&self) -> Option<&Vector<T>> {
        match self {
            Self::Vector(vector) => Some(vector),
            Self::Array(_) => None,
        }
    }
}

impl<T: Element> Debug for TypedBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector(vector) => vector.fmt(f),
            Self::Array(block) => block.fmt(f),
        }
    }
}

impl<T: Element> PartialEq for TypedBlock<T> {
    /// Cross-shape equality: a vector-shaped column equals an array-shaped
    /// column holding the same positions
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.eq_block(other)
    }
}

impl<T: Element> Hash for TypedBlock<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_block(state);
    }
}

impl<T: Element> From<Vector<T>> for TypedBlock<T> {
    #[inline]
    fn from(vector: Vector<T>) -> Self {
        Self::Vector(vector)
    }
}

impl<T: Element> From<ArrayBlock<T>> for TypedBlock<T> {
    #[inline]
    fn from(block: ArrayBlock<T>) -> Self {
        Self::Array(block)
    }
}

macro_rules! block_impl {
    ($({$variant:ident, $ty:ty}),+) => {
        /// Implementations of the [`Block`], enum dispatch
        #[derive(Debug, Clone)]
        pub enum BlockImpl {
            $(
                #[doc = concat!("Column of `", stringify!($ty), "`")]
                $variant(TypedBlock<$ty>)
            ),+
        }

        impl BlockImpl {
            /// Get the number of logical positions in the column
            pub fn position_count(&self) -> usize {
                match self {
                    $(
                        Self::$variant(block) => block.position_count(),
                    )+
                }
            }

            /// Get the [`ElementType`] stored in the column
            pub fn element_type(&self) -> ElementType {
                match self {
                    $(
                        Self::$variant(_) => ElementType::$variant,
                    )+
                }
            }

            /// Get ident of the column
            pub fn ident(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant(_) => stringify!($variant),
                    )+
                }
            }

            /// Returns `true` if the given position is null
            pub fn is_null(&self, position: usize) -> bool {
                match self {
                    $(
                        Self::$variant(block) => block.is_null(position),
                    )+
                }
            }

            /// Render one position for table display
            pub(crate) fn position_display(&self, position: usize) -> String {
                match self {
                    $(
                        Self::$variant(block) => position_display(block, position),
                    )+
                }
            }
        }

        impl PartialEq for BlockImpl {
            fn eq(&self, other: &Self) -> bool {
                match (self, other) {
                    $(
                        (Self::$variant(lhs), Self::$variant(rhs)) => lhs == rhs,
                    )+
                    _ => false,
                }
            }
        }

        $(
            impl From<TypedBlock<$ty>> for BlockImpl {
                #[inline]
                fn from(block: TypedBlock<$ty>) -> Self {
                    Self::$variant(block)
                }
            }

            impl From<Vector<$ty>> for BlockImpl {
                #[inline]
                fn from(vector: Vector<$ty>) -> Self {
                    Self::$variant(TypedBlock::Vector(vector))
                }
            }

            impl<'a> TryFrom<&'a BlockImpl> for &'a TypedBlock<$ty> {
                type Error = BlockError;

                #[inline]
                fn try_from(block: &'a BlockImpl) -> Result<&'a TypedBlock<$ty>> {
                    <$ty as Element>::downcast(block)
                }
            }
        )+
    };
}

for_all_element_types!(block_impl);

macro_rules! alias {
    ($({$variant:ident, $ty:ty}),+) => {
        paste::paste! {
            $(
                #[doc = concat!("A [`TypedBlock`] of [`", stringify!($ty), "`]")]
                pub type [<$variant Block>] = TypedBlock<$ty>;
            )+
        }
    };
}

for_all_element_types!(alias);

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::DefaultHasher;

    fn hash_of(block: &impl Block<Element = i64>) -> u64 {
        let mut state = DefaultHasher::new();
        block.hash_block(&mut state);
        state.finish()
    }

    #[test]
    fn test_builder_densifies_to_vector() {
        let mut builder = BlockBuilder::with_capacity(3);
        builder.append_value(1_i64).append_value(2).append_value(3);
        let block = builder.build();
        assert!(block.as_vector().is_some());
        assert_eq!(block.position_count(), 3);
    }

    #[test]
    fn test_builder_general_shape() {
        let mut builder = BlockBuilder::new();
        builder
            .append_value(5_i64)
            .append_null()
            .append_values(&[7, 9]);
        let block = builder.build();
        assert!(block.as_vector().is_none());
        assert_eq!(block.position_count(), 3);
        assert!(!block.is_null(0));
        assert!(block.is_null(1));
        assert_eq!(block.value_count(2), 2);
        assert_eq!(block.first_value_index(2), 1);
        assert_eq!(block.values_at(2).collect::<Vec<_>>(), [7, 9]);

        let expect =
            expect_test::expect![[r#"Int64ArrayBlock[positions=3, values=[5, null, [7, 9]]]"#]];
        expect.assert_eq(&format!("{:?}", block));
    }

    #[test]
    fn test_cross_shape_equality_and_hash() {
        let mut builder = BlockBuilder::new();
        builder.append_value(1_i64).append_value(2);
        let vector_shaped = builder.build();
        let array_shaped =
            TypedBlock::Array(ArrayBlock::try_new(vec![1_i64, 2], vec![0, 1, 2]).unwrap());

        assert_eq!(vector_shaped, array_shaped);
        assert_eq!(hash_of(&vector_shaped), hash_of(&array_shaped));
    }

    #[test]
    fn test_equality_is_order_and_null_sensitive() {
        let mut builder = BlockBuilder::new();
        builder.append_values(&[1_i64, 2]).append_null();
        let block = builder.build();

        // Same values at the multi-valued position, different order
        let mut builder = BlockBuilder::new();
        builder.append_values(&[2_i64, 1]).append_null();
        assert_ne!(block, builder.build());

        // Null-ness flipped at the second position
        let mut builder = BlockBuilder::new();
        builder.append_values(&[1_i64, 2]).append_value(0);
        assert_ne!(block, builder.build());

        // Identical construction
        let mut builder = BlockBuilder::new();
        builder.append_values(&[1_i64, 2]).append_null();
        assert_eq!(block, builder.build());
    }

    #[test]
    fn test_invalid_offsets() {
        assert!(ArrayBlock::try_new(vec![1_i64], vec![0, 2, 1]).is_err());
        assert!(ArrayBlock::try_new(vec![1_i64], vec![0, 2]).is_err());
        assert!(ArrayBlock::<i64>::try_new(Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn test_block_impl_downcast() {
        let block = BlockImpl::from(Vector::from_values(vec![1_i64, 2]));
        assert_eq!(block.element_type(), ElementType::Int64);
        assert!(<&Int64Block>::try_from(&block).is_ok());
        let err = <&Float64Block>::try_from(&block).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can not convert `BlockImpl::Int64` into a `Float64` column"
        );
    }
}
