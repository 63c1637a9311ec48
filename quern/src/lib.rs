#![deny(
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    rustdoc::private_intra_doc_links,
    rust_2018_idioms,
    missing_docs,
    clippy::needless_borrow,
    clippy::redundant_clone,
    missing_debug_implementations
)]

//! # Quern
//!
//! `Quern` is the grouping substrate of a columnar compute engine. It
//! consumes the key columns of [`Page`]s and resolves every row to a dense,
//! stable group id, the foundation the aggregation operators build on. The
//! hash tables never allocate directly: their storage is acquired from an
//! injected [`BigArrays`] allocator and reclaimed only by an explicit close.
//!
//! [`Page`]: data_column::page::Page
//! [`BigArrays`]: crate::big_array::BigArrays

pub mod big_array;
pub mod group_hash;
pub mod hash;
pub mod key_table;

mod private {
    /// Sealed trait protect against downstream implementations
    pub trait Sealed {}
}
