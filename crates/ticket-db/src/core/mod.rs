//! Core abstractions for the database layer.
//!
//! - [`schema`]: Table, column, and index definitions
//! - [`value`]: SQL values and result rows
//! - [`uri`]: Connection URI parsing
//! - [`traits`]: Session, connection and connector traits
//! - [`cursor`]: Statement execution and result buffering
//! - [`catalog`]: Connector registry for dependency injection
//!
//! # Architecture
//!
//! The core module defines dialect-agnostic abstractions that are implemented
//! by driver modules (`drivers/mysql`). Only the driver's session talks to the
//! wire, so everything above it can be tested with an in-memory session.

pub mod catalog;
pub mod cursor;
pub mod schema;
pub mod traits;
pub mod uri;
pub mod value;

// Re-export commonly used types for convenience
pub use catalog::ConnectorRegistry;
pub use cursor::Cursor;
pub use schema::{Column, CompiledColumn, Index, Table};
pub use traits::{
    DatabaseConnector, DbConnection, QueryOutcome, Session, SessionFactory, SharedSession,
};
pub use uri::{ConnectionParams, ConnectionUri};
pub use value::{Markup, Row, Value};
