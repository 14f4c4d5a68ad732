//! # ticket-db
//!
//! Database layer of the ticket tracker: a MySQL connector and the schema
//! compiler that turns the application's table definitions into DDL.
//!
//! - **Schema model** of tables, columns and indices, compiled to MySQL DDL
//!   with index key lengths kept inside the server's limits
//! - **Connection wrapper** with charset negotiation, cursors, introspection
//!   and dialect SQL fragments
//! - **Connector** that creates, probes and destroys databases, verifies
//!   storage engine and collation invariants and runs `mysqldump` backups
//! - **Upgrade scripts** applied by version
//!
//! ## Example
//!
//! ```rust,no_run
//! use ticket_db::{Config, ConnectorRegistry};
//!
//! #[tokio::main]
//! async fn main() -> ticket_db::Result<()> {
//!     let config = Config::load("ticket-db.yaml")?;
//!     let registry = ConnectorRegistry::with_builtins();
//!     let (connector, params) = registry.resolve(&config.database.url)?;
//!     connector.init_db(&params, None).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod default_schema;
pub mod drivers;
pub mod error;
pub mod upgrades;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use crate::core::{
    Column, ConnectionParams, ConnectionUri, ConnectorRegistry, Cursor, DatabaseConnector,
    DbConnection, Index, Markup, Row, Table, Value,
};
pub use config::{BackupConfig, Config, DatabaseConfig};
pub use default_schema::DB_VERSION;
pub use drivers::mysql::{MysqlConnection, MysqlConnector};
pub use error::{DbError, Result};
