//! Error types for the database layer.

use thiserror::Error;

/// Main error type for connector and connection operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// Configuration error (invalid URI, unknown scheme, bad config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A storage engine or charset/collation invariant is violated.
    #[error("Database setup error: {0}")]
    Setup(String),

    /// The external dump tool could not run or did not produce its output.
    #[error("External tool error: {0}")]
    ExternalTool(String),

    /// The connection was closed locally or invalidated by the server.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Error reported by the MySQL driver, passed through unchanged.
    #[error("Database error: {0}")]
    Driver(#[from] mysql_async::Error),

    /// Malformed schema definition.
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Create a Setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        DbError::Setup(message.into())
    }

    /// Create an ExternalTool error.
    pub fn external_tool(message: impl Into<String>) -> Self {
        DbError::ExternalTool(message.into())
    }

    /// Whether this error means the underlying session is gone.
    pub fn is_disconnect(&self) -> bool {
        match self {
            DbError::ConnectionClosed => true,
            DbError::Driver(e) => driver_error_is_disconnect(e),
            _ => false,
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            DbError::Config(_) | DbError::Yaml(_) => 2,
            DbError::Setup(_) => 3,
            DbError::ExternalTool(_) => 4,
            DbError::ConnectionClosed | DbError::Driver(_) => 5,
            DbError::Schema(_) => 6,
            DbError::Io(_) | DbError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// MySQL client error codes for a lost server connection.
const CR_SERVER_GONE_ERROR: u16 = 2006;
const CR_SERVER_LOST: u16 = 2013;

fn driver_error_is_disconnect(err: &mysql_async::Error) -> bool {
    match err {
        mysql_async::Error::Io(_) => true,
        mysql_async::Error::Driver(mysql_async::DriverError::ConnectionClosed) => true,
        mysql_async::Error::Server(e) => e.code == CR_SERVER_GONE_ERROR || e.code == CR_SERVER_LOST,
        _ => false,
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DbError>;
