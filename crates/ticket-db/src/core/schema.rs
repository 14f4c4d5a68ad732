//! Dialect-independent schema model: tables, columns and indices.
//!
//! These types describe what a table should look like. They are never
//! modified by the DDL compiler; compilation produces [`CompiledColumn`]
//! values instead.

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// Abstract type of an auto-increment column after lowering.
pub const AUTO_INCREMENT_LOGICAL_TYPE: &str = "int";

/// Table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions, in declaration order.
    pub columns: Vec<Column>,

    /// Primary key column names.
    pub key: Vec<String>,

    /// Secondary indices, in declaration order.
    pub indices: Vec<Index>,
}

impl Table {
    /// Create an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            key: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Set the primary key columns.
    pub fn key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Append an index.
    pub fn index(mut self, index: Index) -> Self {
        self.indices.push(index);
        self
    }

    /// Look up a column by name.
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.key.is_empty()
    }

    /// Whether any column is auto-increment.
    pub fn has_auto_increment(&self) -> bool {
        self.columns.iter().any(|c| c.auto_increment)
    }

    /// Check that column names are unique and that keys and indices only
    /// reference declared columns.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Schema` naming the table and the offending column.
    pub fn validate(&self) -> Result<()> {
        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(DbError::Schema(format!(
                    "table '{}' declares column '{}' twice",
                    self.name, col.name
                )));
            }
        }

        for name in &self.key {
            if self.find_column(name).is_none() {
                return Err(DbError::Schema(format!(
                    "primary key of table '{}' references unknown column '{}'",
                    self.name, name
                )));
            }
        }

        for index in &self.indices {
            if index.columns.is_empty() {
                return Err(DbError::Schema(format!(
                    "table '{}' declares an index without columns",
                    self.name
                )));
            }
            for name in &index.columns {
                if self.find_column(name).is_none() {
                    return Err(DbError::Schema(format!(
                        "index {} references unknown column '{}'",
                        index.name(&self.name),
                        name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Abstract type tag ("text", "int", "int64", ...).
    #[serde(rename = "type")]
    pub data_type: String,

    /// Display size hint. Not used for DDL.
    pub size: Option<u32>,

    /// Maximum indexed prefix length for text columns.
    pub key_size: Option<u32>,

    /// Whether the database generates values for this column.
    pub auto_increment: bool,
}

impl Column {
    /// Create a text column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: "text".to_string(),
            size: None,
            key_size: None,
            auto_increment: false,
        }
    }

    /// Set the abstract type.
    pub fn typed(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    /// Set the size hint.
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the maximum indexed prefix length.
    pub fn key_size(mut self, key_size: u32) -> Self {
        self.key_size = Some(key_size);
        self
    }

    /// Mark the column as auto-increment.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// The type the column has once compiled.
    ///
    /// Auto-increment columns are always integers, whatever was declared.
    pub fn logical_type(&self) -> &str {
        if self.auto_increment {
            AUTO_INCREMENT_LOGICAL_TYPE
        } else {
            &self.data_type
        }
    }

    /// Whether the compiled column holds text.
    pub fn is_text(&self) -> bool {
        self.logical_type().eq_ignore_ascii_case("text")
    }
}

/// Index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Indexed column names.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub unique: bool,
}

impl Index {
    /// Create a non-unique index.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Derived index name: `{table}_{col1}_{col2}_idx`.
    pub fn name(&self, table: &str) -> String {
        format!("{}_{}_idx", table, self.columns.join("_"))
    }
}

/// A column lowered to concrete SQL for one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledColumn {
    /// Column name.
    pub name: String,

    /// Full SQL type clause used in CREATE TABLE.
    pub sql_type: String,

    /// Abstract type after lowering.
    pub logical_type: String,
}
