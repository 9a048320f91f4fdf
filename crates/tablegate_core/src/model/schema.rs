//! Table schema descriptor and record validation.
//!
//! # Responsibility
//! - Hold introspected column metadata for one table.
//! - Validate insert candidates against that metadata.
//!
//! # Invariants
//! - Column order follows the store's reported order.
//! - Validation is pure: it never touches the store.
//! - Record columns unknown to the schema are never rejected.

use crate::model::record::Record;

/// Metadata reported by the store for a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    pub nullable: bool,
    pub has_default: bool,
    /// Declared character limit, when the column type carries one.
    pub max_length: Option<u32>,
}

impl ColumnInfo {
    /// A column must be supplied on insert when it is neither nullable
    /// nor backed by a default value.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default
    }
}

/// Column name to metadata mapping for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<(String, ColumnInfo)>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a column entry.
    pub fn insert(&mut self, column: impl Into<String>, info: ColumnInfo) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = info,
            None => self.columns.push((column, info)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnInfo)> {
        self.columns.iter().map(|(name, info)| (name.as_str(), info))
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, info)| info.is_required())
            .map(|(name, _)| name)
    }

    /// Validates an insert candidate and returns one message per violation.
    ///
    /// An empty list means the record is acceptable.
    ///
    /// # Contract
    /// - Missing required columns (schema order) produce one combined
    ///   message first. A column present with a null value is not missing.
    /// - Per-field max-length and not-null messages follow in record order.
    /// - Fields whose column is not in the schema are skipped.
    /// - Max length is measured on the rendered text of any truthy value,
    ///   so numbers and booleans are length-checked too.
    pub fn validate(&self, record: &Record) -> Vec<String> {
        let mut violations = Vec::new();

        let missing = self
            .required_columns()
            .filter(|column| !record.contains_column(column))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            violations.push(format!("Missing values: {}", missing.join(", ")));
        }

        for (column, value) in record.iter() {
            let Some(info) = self.get(column) else {
                continue;
            };

            if let Some(max_length) = info.max_length {
                let length = value.text_len();
                if value.is_truthy() && length > max_length as usize {
                    violations.push(format!(
                        "Value for {column} exceeds max length of {max_length}, length was: {length}"
                    ));
                }
            }

            if !value.is_truthy() && !info.nullable {
                violations.push(format!(
                    "\"{value}\" value in column {column} violates not-null constraint."
                ));
            }
        }

        violations
    }
}

impl<K: Into<String>> FromIterator<(K, ColumnInfo)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (K, ColumnInfo)>>(iter: I) -> Self {
        let mut schema = Self::new();
        for (column, info) in iter {
            schema.insert(column, info);
        }
        schema
    }
}
