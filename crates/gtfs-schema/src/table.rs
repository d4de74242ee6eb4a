//! Table descriptors and the ordered schema that holds them.

use crate::error::SchemaError;
use crate::field::Field;

// ---------------------------------------------------------------------------
// TableDescriptor
// ---------------------------------------------------------------------------

/// Describes one GTFS table: its columns and how its rows are identified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name without the `.txt` suffix, e.g. `stop_times`.
    pub name: &'static str,
    /// Columns in output order.
    pub fields: &'static [Field],
    /// The field that identifies a row, if the table has one.
    pub key_field: Option<&'static str>,
    /// A secondary identifier that may be used instead of the key field
    /// when matching rows across feeds (`stop_code`, `route_short_name`).
    pub alt_key_field: Option<&'static str>,
    /// Field that, together with the key, makes a row unique
    /// (`stop_sequence` for `stop_times`, `date` for `calendar_dates`).
    pub order_field: Option<&'static str>,
}

impl TableDescriptor {
    /// A table whose rows are identified by `key_field`.
    #[must_use]
    pub const fn keyed(
        name: &'static str,
        key_field: &'static str,
        fields: &'static [Field],
    ) -> Self {
        Self {
            name,
            fields,
            key_field: Some(key_field),
            alt_key_field: None,
            order_field: None,
        }
    }

    /// A table with no identifying field (`feed_info`, `transfers`).
    #[must_use]
    pub const fn keyless(name: &'static str, fields: &'static [Field]) -> Self {
        Self {
            name,
            fields,
            key_field: None,
            alt_key_field: None,
            order_field: None,
        }
    }

    #[must_use]
    pub const fn with_alt_key(mut self, field: &'static str) -> Self {
        self.alt_key_field = Some(field);
        self
    }

    #[must_use]
    pub const fn with_order(mut self, field: &'static str) -> Self {
        self.order_field = Some(field);
        self
    }

    /// Archive entry name, e.g. `stops.txt`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.name)
    }

    /// Look up a column by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` is the key, alternate key, or order field.
    #[must_use]
    pub fn is_identifying(&self, name: &str) -> bool {
        self.key_field == Some(name)
            || self.alt_key_field == Some(name)
            || self.order_field == Some(name)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// An ordered set of table descriptors.
///
/// Tables are kept in the order given; merges process them in that order.
#[derive(Clone, Debug)]
pub struct Schema {
    tables: Vec<TableDescriptor>,
}

impl Schema {
    #[must_use]
    pub const fn new(tables: Vec<TableDescriptor>) -> Self {
        Self { tables }
    }

    /// All tables in dependency order.
    #[must_use]
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    /// Look up a table by name.
    ///
    /// # Errors
    /// Returns [`SchemaError::UnknownTable`] when no table has that name.
    pub fn table(&self, name: &str) -> Result<&TableDescriptor, SchemaError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SchemaError::UnknownTable {
                name: name.to_owned(),
                known: self
                    .tables
                    .iter()
                    .map(|t| t.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        crate::gtfs::schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Reference;

    #[test]
    fn unknown_table_lists_known_names() {
        let schema = Schema::default();
        let err = schema.table("nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'nope'"));
        assert!(msg.contains("stop_times"));
    }

    #[test]
    fn references_point_backwards_in_table_order() {
        let schema = Schema::default();
        for (idx, table) in schema.tables().iter().enumerate() {
            for field in table.fields {
                let targets = match field.reference {
                    Some(Reference::Table { table, field }) => vec![(table, field)],
                    Some(Reference::OneOf(targets)) => targets.to_vec(),
                    Some(Reference::Service) | None => continue,
                };
                for (target, key) in targets {
                    if target == table.name {
                        continue;
                    }
                    let pos = schema
                        .tables()
                        .iter()
                        .position(|t| t.name == target)
                        .unwrap();
                    assert!(
                        pos < idx,
                        "{}.{} references {target} which comes later",
                        table.name,
                        field.name
                    );
                    assert_eq!(schema.tables()[pos].key_field, Some(key));
                }
            }
        }
    }

    #[test]
    fn identifying_fields_are_declared_columns() {
        for table in Schema::default().tables() {
            for name in [table.key_field, table.alt_key_field, table.order_field]
                .into_iter()
                .flatten()
            {
                assert!(table.field(name).is_some(), "{}.{name}", table.name);
            }
        }
    }

    #[test]
    fn file_name_appends_txt() {
        let schema = Schema::default();
        assert_eq!(schema.table("stops").unwrap().file_name(), "stops.txt");
    }
}
