//! # DataColumn
//!
//! `DataColumn` is the columnar value container family of the `quern` compute
//! engine. A column is addressed in two spaces: the *position* space (one
//! logical row slot each, possibly null, possibly holding several values) and
//! the flat *value* space backing it. The family has three shapes:
//!
//! - [`Vector`](vector::Vector): dense, non-nullable, exactly one value per
//!   position
//!
//! - [`ArrayBlock`](block::ArrayBlock): nullable and multi-valued, positions
//!   resolved through an offsets array
//!
//! - [`FilteredBlock`](filtered::FilteredBlock): a zero-copy view that remaps
//!   logical positions onto any delegate column
//!
//! All containers are immutable after construction, so sharing them across
//! threads for reads is safe. [`Page`](page::Page) bundles columns that share
//! one position count into the unit driven through operators.

pub mod block;
pub mod element;
pub mod filtered;
mod macros;
pub mod page;
pub mod vector;

mod private {
    /// Sealed trait protect against downstream implementations
    pub trait Sealed {}
}
