//! [`Element`] is the value stored at one slot of the value space of a column

use std::fmt::{Debug, Display};
use std::hash::Hasher;

use crate::block::{BlockError, BlockImpl, TypedBlock};
use crate::macros::for_all_element_types;
use crate::private::Sealed;

/// All of the primitive kinds a column can hold. Each variant has a
/// one-to-one mapping to a type that implements [`Element`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Boolean
    Boolean,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// 64-bit float number
    Float64,
}

impl Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ElementType::{:?}", self)
    }
}

/// Trait for values that can be placed in the value space of a column. This
/// trait is sealed to avoid other types implement it
pub trait Element:
    Sealed + Copy + Debug + Display + Default + PartialEq + Send + Sync + 'static
{
    /// Element type of this primitive
    const ELEMENT_TYPE: ElementType;

    /// Name used in diagnostics and debug rendering
    const NAME: &'static str;

    /// Feed the value into the hasher. Block hashes combine these
    /// per-position, order sensitive, which keeps them consistent with block
    /// equality. Floats hash their normalized bit pattern so `NaN` and `-0.0`
    /// each hash as one value
    fn write_hash<H: Hasher>(self, state: &mut H);

    /// Wrap a typed column into the enum dispatched [`BlockImpl`]
    fn upcast(block: TypedBlock<Self>) -> BlockImpl;

    /// Borrow the typed column out of the enum dispatched [`BlockImpl`]
    fn downcast(block: &BlockImpl) -> Result<&TypedBlock<Self>, BlockError>;
}

/// Hashing of the raw value, kept out of [`Element`] so the macro below stays
/// uniform across the integer and float types
trait WriteHash {
    fn write<H: Hasher>(self, state: &mut H);
}

impl WriteHash for bool {
    #[inline]
    fn write<H: Hasher>(self, state: &mut H) {
        state.write_u8(self as u8);
    }
}

impl WriteHash for i32 {
    #[inline]
    fn write<H: Hasher>(self, state: &mut H) {
        state.write_i32(self);
    }
}

impl WriteHash for i64 {
    #[inline]
    fn write<H: Hasher>(self, state: &mut H) {
        state.write_i64(self);
    }
}

impl WriteHash for f64 {
    #[inline]
    fn write<H: Hasher>(self, state: &mut H) {
        state.write_u64(crate::element::normalize(self).to_bits());
    }
}

/// Normalize a float, make `NaN`/`-NaN` and `-0.0`/`0.0` consistent
#[inline]
pub fn normalize(value: f64) -> f64 {
    if value.is_nan() {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

macro_rules! impl_element {
    ($({$variant:ident, $ty:ty}),+) => {
        $(
            impl Sealed for $ty {}

            impl Element for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$variant;

                const NAME: &'static str = stringify!($variant);

                #[inline]
                fn write_hash<H: Hasher>(self, state: &mut H) {
                    WriteHash::write(self, state)
                }

                #[inline]
                fn upcast(block: TypedBlock<Self>) -> BlockImpl {
                    BlockImpl::$variant(block)
                }

                #[inline]
                fn downcast(block: &BlockImpl) -> Result<&TypedBlock<Self>, BlockError> {
                    if let BlockImpl::$variant(block) = block {
                        Ok(block)
                    } else {
                        crate::block::ConvertSnafu {
                            block: block.ident(),
                            target: stringify!($variant),
                        }
                        .fail()
                    }
                }
            }
        )+
    };
}

for_all_element_types!(impl_element);

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::DefaultHasher;

    fn hash_one<T: Element>(value: T) -> u64 {
        let mut state = DefaultHasher::new();
        value.write_hash(&mut state);
        state.finish()
    }

    #[test]
    fn test_float_hash_is_normalized() {
        assert_eq!(hash_one(0.0_f64), hash_one(-0.0_f64));
        assert_eq!(hash_one(f64::NAN), hash_one(-f64::NAN));
        assert_ne!(hash_one(1.5_f64), hash_one(2.5_f64));
    }
}
