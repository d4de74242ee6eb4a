//! Reference registry: uniqueness and foreign-key existence across a merge.
//!
//! The registry remembers every key value written so far, typed by table and
//! field. Each `(row, field)` pair is checked once, after the value to write
//! has been decided, so the registry always speaks in output ids.
//!
//! A check on a field that both references another table and identifies its
//! own row (`stop_times.trip_id`) tests the reference first and registers the
//! key only when the reference resolves.

use std::collections::BTreeSet;
use std::fmt;

use gtfs_schema::{Field, Reference, TableDescriptor};

/// A registered key value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RegistryKey {
    table: String,
    field: String,
    value: String,
}

impl RegistryKey {
    fn new(table: &str, field: &str, value: &str) -> Self {
        Self {
            table: table.to_owned(),
            field: field.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// A registered `(key, order)` pair for tables with compound uniqueness.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct OrderedKey {
    table: String,
    key: String,
    order: String,
}

/// A problem found while checking one field of one row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// The value was already registered for this table and field.
    DuplicateKey {
        table: String,
        field: String,
        value: String,
        line: usize,
    },
    /// The value references a key that has not been registered.
    MissingReference {
        table: String,
        field: String,
        value: String,
        target: Reference,
        line: usize,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey {
                table,
                field,
                value,
                line,
            } => write!(f, "{table}.{field} '{value}' on line {line} is a duplicate"),
            Self::MissingReference {
                table,
                field,
                value,
                target,
                line,
            } => write!(
                f,
                "{table}.{field} '{value}' on line {line} references missing {target}"
            ),
        }
    }
}

/// One field of one row, ready to be checked.
#[derive(Clone, Copy, Debug)]
pub struct FieldCheck<'a> {
    pub table: &'a TableDescriptor,
    pub field: &'a Field,
    /// Value to be written for `field`.
    pub value: &'a str,
    /// Value to be written for the row's key field.
    pub key_value: &'a str,
    /// The field the row is identified by. Normally the table's key field;
    /// the alternate key when rows are matched on it.
    pub key_field: &'a str,
    /// Field that makes `key_field` unique, if any.
    pub order_field: Option<&'a str>,
    /// 1-based line in the source table.
    pub line: usize,
}

/// Tracks key values across all archives of one merge.
#[derive(Debug, Default)]
pub struct ReferenceRegistry {
    keys: BTreeSet<RegistryKey>,
    ordered: BTreeSet<OrderedKey>,
    opened: BTreeSet<String>,
}

impl ReferenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `table` as part of the output. References into tables that were
    /// never opened are not checked.
    pub fn open_table(&mut self, table: &str) {
        self.opened.insert(table.to_owned());
    }

    /// Check one field of one row and register it if it identifies the row.
    ///
    /// Empty values are never checked or registered.
    pub fn check(&mut self, check: &FieldCheck<'_>) -> Vec<Violation> {
        let FieldCheck {
            table,
            field,
            value,
            key_value,
            key_field,
            order_field,
            line,
        } = *check;
        if value.is_empty() {
            return Vec::new();
        }

        if let Some(target) = field.reference
            && !target.is_self_reference(table.name)
            && self.enforces(target)
            && !self.resolves(target, value)
        {
            return vec![Violation::MissingReference {
                table: table.name.to_owned(),
                field: field.name.to_owned(),
                value: value.to_owned(),
                target,
                line,
            }];
        }

        let duplicate = if order_field == Some(field.name) {
            !self.ordered.insert(OrderedKey {
                table: table.name.to_owned(),
                key: key_value.to_owned(),
                order: value.to_owned(),
            })
        } else if field.name == key_field || table.key_field == Some(field.name) {
            let fresh = self
                .keys
                .insert(RegistryKey::new(table.name, field.name, value));
            !fresh && order_field.is_none()
        } else {
            false
        };

        if duplicate {
            vec![Violation::DuplicateKey {
                table: table.name.to_owned(),
                field: field.name.to_owned(),
                value: value.to_owned(),
                line,
            }]
        } else {
            Vec::new()
        }
    }

    /// Whether `value` has been registered for `table.field`.
    #[must_use]
    pub fn contains(&self, table: &str, field: &str, value: &str) -> bool {
        self.keys.contains(&RegistryKey::new(table, field, value))
    }

    /// Whether a reference to `value` would resolve.
    #[must_use]
    pub fn resolves(&self, target: Reference, value: &str) -> bool {
        match target {
            Reference::Table { table, field } => self.contains(table, field, value),
            Reference::Service => {
                self.contains("calendar", "service_id", value)
                    || self.contains("calendar_dates", "service_id", value)
            }
            Reference::OneOf(targets) => targets
                .iter()
                .any(|(table, field)| self.contains(table, field, value)),
        }
    }

    /// Any one value registered for `table.field`.
    #[must_use]
    pub fn any_value(&self, table: &str, field: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.table == table && k.field == field)
            .map(|k| k.value.as_str())
    }

    fn enforces(&self, target: Reference) -> bool {
        match target {
            Reference::Table { table, .. } => self.opened.contains(table),
            Reference::Service => {
                self.opened.contains("calendar") || self.opened.contains("calendar_dates")
            }
            Reference::OneOf(targets) => {
                targets.iter().any(|(table, _)| self.opened.contains(*table))
            }
        }
    }
}
