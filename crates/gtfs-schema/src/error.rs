//! Error type for schema lookups.

use thiserror::Error;

/// Errors raised when a caller asks the schema for something it does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No table with this name is registered.
    #[error("unknown table '{name}'\n  To fix: use one of: {known}")]
    UnknownTable {
        /// The name that was looked up.
        name: String,
        /// Comma-separated list of registered table names.
        known: String,
    },
}
