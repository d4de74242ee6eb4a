//! Field descriptors.

use std::fmt;

/// What a foreign-key field points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    /// The key field of another table, e.g. `trips.route_id -> routes.route_id`.
    Table {
        /// Referenced table name.
        table: &'static str,
        /// Key field within that table.
        field: &'static str,
    },
    /// The service namespace, defined jointly by `calendar` and `calendar_dates`.
    Service,
    /// The key field of any one of several tables, as `(table, field)` pairs.
    /// Flex `stop_times.stop_id` may name a stop, a location, or a location
    /// group.
    OneOf(&'static [(&'static str, &'static str)]),
}

impl Reference {
    /// Whether this reference targets `table` itself (e.g. `stops.parent_station`).
    #[must_use]
    pub fn is_self_reference(&self, table: &str) -> bool {
        matches!(self, Self::Table { table: t, .. } if *t == table)
    }

    /// Whether a value may be found in more than one table.
    #[must_use]
    pub const fn has_alternatives(&self) -> bool {
        matches!(self, Self::Service | Self::OneOf(_))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table { table, field } => write!(f, "{table}.{field}"),
            Self::Service => write!(f, "service"),
            Self::OneOf(targets) => {
                for (idx, (table, field)) in targets.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{table}.{field}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single column of a GTFS table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    /// Column name as it appears in the CSV header.
    pub name: &'static str,
    /// Whether GTFS requires the column.
    pub required: bool,
    /// Foreign reference carried by the column, if any.
    pub reference: Option<Reference>,
}

impl Field {
    /// An optional field with no reference.
    #[must_use]
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            reference: None,
        }
    }

    /// A required field with no reference.
    #[must_use]
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            reference: None,
        }
    }

    /// Attach a reference to another table's key field.
    #[must_use]
    pub const fn references(mut self, table: &'static str, field: &'static str) -> Self {
        self.reference = Some(Reference::Table { table, field });
        self
    }

    /// Attach a reference to the key field of any of `targets`.
    #[must_use]
    pub const fn references_any(mut self, targets: &'static [(&'static str, &'static str)]) -> Self {
        self.reference = Some(Reference::OneOf(targets));
        self
    }

    /// Attach a reference to the service namespace.
    #[must_use]
    pub const fn references_service(mut self) -> Self {
        self.reference = Some(Reference::Service);
        self
    }

    #[must_use]
    pub const fn is_foreign_key(&self) -> bool {
        self.reference.is_some()
    }
}
