//! Hash utilities used by the key tables

/// Default hash builder
pub type BuildHasherDefault = ahash::RandomState;

/// Constant build hasher default. The seeds are pinned: two runs over the
/// same key stream must assign the same ordinals
pub const BUILD_HASHER_DEFAULT: BuildHasherDefault = BuildHasherDefault::with_seeds(3, 1, 4, 1);
