//! GTFS table descriptors for feed merging.
//!
//! A [`Schema`] is an ordered list of [`TableDescriptor`]s. The order is the
//! dependency order: every table appears after the tables its fields
//! reference, so a merge that walks the schema front to back has always
//! registered a key before anything refers to it.
//!
//! # Crate layout
//!
//! - [`field`]: [`Field`] and the [`Reference`] a field may carry.
//! - [`table`]: [`TableDescriptor`] and [`Schema`].
//! - [`gtfs`]: the built-in GTFS table set.
//! - [`error`]: [`SchemaError`].

pub mod error;
pub mod field;
pub mod gtfs;
pub mod table;

pub use error::SchemaError;
pub use field::{Field, Reference};
pub use table::{Schema, TableDescriptor};
