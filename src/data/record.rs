//! Record Module
//! Schema-validated rows: column names are resolved once per dataset, not per access.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Why a column list cannot form a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),
}

/// Ordered column names of a dataset plus a name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema. Fails if a column name appears twice.
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { columns, index })
    }

    /// Positional schema (`"0"`, `"1"`, ...) for header-less input.
    pub fn positional(width: usize) -> Self {
        let columns: Vec<String> = (0..width).map(|i| i.to_string()).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { columns, index }
    }

    /// Column names in input order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Zero-based position of `column`.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Whether `column` is part of the schema.
    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }
}

/// One parsed input row: column name -> raw string value.
///
/// Records from the same dataset share one [`Schema`]. Records are immutable
/// once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    schema: Arc<Schema>,
    fields: Vec<String>,
    line: Option<u64>,
}

impl RawRecord {
    /// Bind `fields` to `schema`, padding missing trailing fields with empty
    /// strings and dropping extras.
    pub fn new(schema: Arc<Schema>, mut fields: Vec<String>) -> Self {
        fields.resize(schema.len(), String::new());
        Self {
            schema,
            fields,
            line: None,
        }
    }

    /// Attach the 1-based source line the row starts on.
    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    /// Build a standalone record from `(column, value)` pairs.
    ///
    /// Used by hosts that hand over an already-parsed record stream. Later
    /// duplicates of a column overwrite earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut fields: Vec<String> = Vec::new();
        for (k, v) in pairs {
            let k = k.into();
            match columns.iter().position(|c| c == &k) {
                Some(i) => fields[i] = v.into(),
                None => {
                    columns.push(k);
                    fields.push(v.into());
                }
            }
        }

        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            schema: Arc::new(Schema { columns, index }),
            fields,
            line: None,
        }
    }

    /// Schema shared by every record of the dataset.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Source line of the row, when it came from the parser.
    pub fn line(&self) -> Option<u64> {
        self.line
    }

    /// Raw value of `column`, or `None` if the column is not in this record's schema.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.schema
            .position(column)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
    }

    /// Iterate `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.schema
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.fields.iter().map(String::as_str))
    }
}
