//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Type mapping, identifier quoting, the DDL compiler and the SQL fragment
//! generators used by the connection wrapper. Everything here is pure.

use std::collections::BTreeMap;

use crate::core::schema::{Column, CompiledColumn, Table};

/// Maximum total bytes of an index key (InnoDB with large prefixes).
pub const MAX_KEY_LENGTH: usize = 3072;

/// Maximum bytes of a single column prefix (InnoDB COMPACT rows).
pub const MAX_COLUMN_PREFIX: usize = 767;

/// SQL type of an auto-increment column.
const AUTO_INCREMENT_SQL_TYPE: &str = "INT UNSIGNED NOT NULL AUTO_INCREMENT";

/// Abstract types that need a MySQL-specific spelling.
const TYPE_MAP: &[(&str, &str)] = &[("int64", "bigint"), ("text", "mediumtext")];

/// Bytes per character of a MySQL character set.
pub fn max_bytes_for_charset(charset: &str) -> usize {
    if charset.eq_ignore_ascii_case("utf8mb4") {
        4
    } else {
        3
    }
}

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+ and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        "mysql"
    }

    /// Map an abstract type to its MySQL type. Unknown types pass through.
    pub fn map_type<'a>(&self, abstract_type: &'a str) -> &'a str {
        TYPE_MAP
            .iter()
            .find(|(from, _)| *from == abstract_type)
            .map(|(_, to)| *to)
            .unwrap_or(abstract_type)
    }

    /// Quote an identifier with backticks, doubling embedded backticks.
    pub fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Lower a column to its MySQL definition.
    ///
    /// Auto-increment columns become unsigned integers whatever their
    /// declared type, since text columns cannot be auto-incremented.
    pub fn compile_column(&self, column: &Column) -> CompiledColumn {
        let sql_type = if column.auto_increment {
            AUTO_INCREMENT_SQL_TYPE.to_string()
        } else {
            self.map_type(&column.data_type).to_string()
        };
        CompiledColumn {
            name: column.name.clone(),
            sql_type,
            logical_type: column.logical_type().to_string(),
        }
    }

    /// Build the column list of a key, limiting text column prefixes so the
    /// key fits the server's limits.
    ///
    /// Every column prefix is capped at 767 bytes and the whole key at 3072
    /// bytes. Only text columns get a prefix; the bytes of other columns are
    /// not accounted for.
    pub fn collist(&self, table: &Table, columns: &[String], max_bytes: usize) -> String {
        if columns.is_empty() {
            return String::new();
        }
        let max_bytes = max_bytes.max(1);
        let limit_col = MAX_COLUMN_PREFIX / max_bytes;
        let limit = (MAX_KEY_LENGTH / (max_bytes * columns.len())).min(limit_col);

        columns
            .iter()
            .map(|name| {
                let quoted = self.quote_ident(name);
                match table.find_column(name) {
                    Some(col) if col.is_text() => {
                        let prefix = col
                            .key_size
                            .map(|size| (size as usize).min(limit_col))
                            .unwrap_or(limit);
                        format!("{}({})", quoted, prefix)
                    }
                    _ => quoted,
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Compile a table into a CREATE TABLE statement followed by one
    /// CREATE INDEX statement per index.
    pub fn to_sql(&self, table: &Table, max_bytes: usize) -> Vec<String> {
        let mut coldefs: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let compiled = self.compile_column(c);
                format!("    {} {}", self.quote_ident(&compiled.name), compiled.sql_type)
            })
            .collect();

        if table.has_pk() {
            coldefs.push(format!(
                "    PRIMARY KEY ({})",
                self.collist(table, &table.key, max_bytes)
            ));
        }

        let mut statements = Vec::with_capacity(1 + table.indices.len());
        statements.push(format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_ident(&table.name),
            coldefs.join(",\n")
        ));

        for index in &table.indices {
            let unique = if index.unique { "UNIQUE " } else { "" };
            statements.push(format!(
                "CREATE {}INDEX {} ON {} ({})",
                unique,
                self.quote_ident(&index.name(&table.name)),
                self.quote_ident(&table.name),
                self.collist(table, &index.columns, max_bytes)
            ));
        }

        statements
    }

    /// Build the ALTER TABLE statement changing column types.
    ///
    /// `columns` maps column names to `(from, to)` abstract types. Columns
    /// whose mapped types are equal are skipped; if none remain, no
    /// statement is produced.
    pub fn alter_column_types(
        &self,
        table: &str,
        columns: &BTreeMap<String, (String, String)>,
    ) -> Vec<String> {
        let alterations: Vec<String> = columns
            .iter()
            .filter_map(|(name, (from, to))| {
                let to = self.map_type(to);
                (to != self.map_type(from))
                    .then(|| format!("MODIFY {} {}", self.quote_ident(name), to))
            })
            .collect();

        if alterations.is_empty() {
            Vec::new()
        } else {
            vec![format!(
                "ALTER TABLE {} {}",
                self.quote_ident(table),
                alterations.join(", ")
            )]
        }
    }

    /// Case-insensitive LIKE with `/` as escape character.
    pub fn like(&self, charset: &str) -> String {
        format!("LIKE ? COLLATE {}_general_ci ESCAPE '/'", charset)
    }

    /// Escape `/`, `_` and `%` with `/`.
    pub fn like_escape(&self, text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            if matches!(c, '/' | '_' | '%') {
                escaped.push('/');
            }
            escaped.push(c);
        }
        escaped
    }

    /// Case-sensitive prefix match with `/` as escape character.
    pub fn prefix_match(&self) -> String {
        "LIKE ? ESCAPE '/'".to_string()
    }

    /// CAST expression; abstract integer and text types use MySQL cast types.
    pub fn cast(&self, column: &str, sql_type: &str) -> String {
        let cast_type = match sql_type {
            "int" | "int64" => "signed",
            "text" => "char",
            other => other,
        };
        format!("CAST({} AS {})", column, cast_type)
    }

    pub fn concat(&self, args: &[&str]) -> String {
        format!("concat({})", args.join(", "))
    }
}
