//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB driver
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Session` and `SessionFactory`: the wire-level session
//! - `DbConnection`: the connection wrapper callers use
//! - `DatabaseConnector`: whole-database operations, registered by scheme
//!   in `ConnectorRegistry::with_builtins()`

pub mod mysql;

pub use mysql::{MysqlConnection, MysqlConnector, MysqlDialect};
