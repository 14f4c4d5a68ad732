//! Core traits for the database layer.
//!
//! - [`Session`]: one live driver-level session (the only place that talks
//!   to the wire)
//! - [`SessionFactory`]: opens sessions from resolved connect options
//! - [`DbConnection`]: the connection wrapper every dialect provides
//! - [`DatabaseConnector`]: creates connections, databases and backups for
//!   one URI scheme
//!
//! # Design Patterns
//!
//! - **Abstract Factory**: a connector creates connections for its dialect
//! - **Strategy**: SQL fragment generators (`like`, `cast`, `concat`) differ
//!   per dialect behind `DbConnection`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::cursor::Cursor;
use super::schema::Table;
use super::uri::ConnectionParams;
use super::value::{Row, Value};

/// Outcome of one statement.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Column names of the result set (empty for statements without rows).
    pub columns: Arc<[String]>,
    /// Result rows.
    pub rows: Vec<Row>,
    /// Rows changed by the statement.
    pub affected_rows: u64,
    /// Auto-increment value generated by the statement, if any.
    pub last_insert_id: Option<u64>,
    /// Number of warnings the server raised.
    pub warnings: u16,
}

impl QueryOutcome {
    /// Outcome of a statement that returns rows.
    pub fn with_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(columns.clone(), values))
            .collect();
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }
}

/// A single live session with a database server.
///
/// Sessions are serial: one statement at a time. Once `close` has been
/// called every other method fails with `DbError::ConnectionClosed`.
#[async_trait]
pub trait Session: Send {
    /// Run one statement with positional `?` parameters.
    async fn query(&mut self, sql: &str, params: Vec<Value>) -> Result<QueryOutcome>;

    /// Check the session is alive, reconnecting if the server dropped it.
    async fn ping(&mut self) -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Close the session.
    async fn close(&mut self) -> Result<()>;

    /// Server version string, if known.
    fn server_version(&self) -> Option<String>;
}

/// Session shared between a connection and its cursors.
pub type SharedSession = Arc<tokio::sync::Mutex<Box<dyn Session>>>;

/// Opens sessions. Implemented by each driver; tests provide in-memory ones.
#[async_trait]
pub trait SessionFactory<Opts: Sync>: Send + Sync {
    /// Open a new session.
    async fn connect(&self, opts: &Opts) -> Result<Box<dyn Session>>;
}

/// A connection wrapper: cursors, transactions, quoting, introspection and
/// dialect-specific SQL fragments.
#[async_trait]
pub trait DbConnection: Send {
    /// Database (schema) the connection is bound to.
    fn schema(&self) -> &str;

    /// Negotiated character set.
    fn charset(&self) -> &str;

    /// Whether the connection has been closed.
    fn is_closed(&self) -> bool;

    /// Version reported by the server when the connection was opened.
    fn server_version(&self) -> Option<&str>;

    /// Create a cursor.
    fn cursor(&self) -> Result<Cursor>;

    /// Run one statement and return its rows.
    async fn execute(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let mut cursor = self.cursor()?;
        cursor.execute(sql, params).await?;
        Ok(cursor.fetchall())
    }

    /// Quote an identifier.
    fn quote(&self, identifier: &str) -> String;

    /// Case-insensitive LIKE fragment with one `?` placeholder.
    fn like(&self) -> String;

    /// Escape text for use in [`DbConnection::like`].
    fn like_escape(&self, text: &str) -> String;

    /// Prefix match fragment with one `?` placeholder.
    fn prefix_match(&self) -> String;

    /// Value for [`DbConnection::prefix_match`] matching `prefix`.
    fn prefix_match_value(&self, prefix: &str) -> String {
        format!("{}%", self.like_escape(prefix))
    }

    /// CAST expression.
    fn cast(&self, column: &str, sql_type: &str) -> String;

    /// String concatenation expression.
    fn concat(&self, args: &[&str]) -> String;

    /// Names of all tables in the bound schema.
    async fn get_table_names(&mut self) -> Result<Vec<String>>;

    /// Column names of a table, in ordinal order.
    async fn get_column_names(&mut self, table: &str) -> Result<Vec<String>>;

    /// Whether a table exists in the bound schema.
    async fn has_table(&mut self, table: &str) -> Result<bool>;

    /// Names of sequences in the bound schema.
    async fn get_sequence_names(&mut self) -> Result<Vec<String>>;

    /// Drop a table if it exists.
    async fn drop_table(&mut self, table: &str) -> Result<()>;

    /// Drop a column together with every composite key it belongs to.
    async fn drop_column(&mut self, table: &str, column: &str) -> Result<()>;

    /// Empty every table, resetting auto-increment counters.
    async fn reset_tables(&mut self) -> Result<Vec<String>>;

    /// Id generated by the last insert on `cursor`.
    fn get_last_id(&self, cursor: &Cursor, table: &str, column: &str) -> Option<u64>;

    /// Bring a sequence in line with the values of `table.column`.
    async fn update_sequence(&mut self, cursor: &mut Cursor, table: &str, column: &str)
        -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Creates connections and manages whole databases for one URI scheme.
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Connector name (e.g. "mysql").
    fn name(&self) -> &str;

    /// URI schemes handled, with priorities (higher wins).
    fn supported_schemes(&self) -> Vec<(&'static str, i32)>;

    /// Open a connection.
    async fn get_connection(&self, params: &ConnectionParams) -> Result<Box<dyn DbConnection>>;

    /// Create all tables of `schema` (or the default schema).
    async fn init_db(&self, params: &ConnectionParams, schema: Option<&[Table]>) -> Result<()>;

    /// Drop every table.
    async fn destroy_db(&self, params: &ConnectionParams) -> Result<()>;

    /// Whether the database has any table.
    async fn db_exists(&self, params: &ConnectionParams) -> Result<bool>;

    /// DDL statements creating `table`.
    fn to_sql(&self, table: &Table, max_bytes: usize) -> Vec<String>;

    /// DDL statements changing column types of `table`.
    fn alter_column_types(
        &self,
        table: &str,
        columns: &BTreeMap<String, (String, String)>,
    ) -> Vec<String>;

    /// Write a backup of the database to `dest`.
    async fn backup(&self, params: &ConnectionParams, dest: &Path) -> Result<PathBuf>;

    /// Check database-level invariants on a live connection.
    ///
    /// Returns whether an upgrade is needed; fails if the database cannot be
    /// used at all.
    async fn environment_needs_upgrade(&self, conn: &mut dyn DbConnection) -> Result<bool>;

    /// Name/version pairs describing the server and client library.
    fn system_info(&self, conn: Option<&dyn DbConnection>) -> Vec<(String, String)>;
}
