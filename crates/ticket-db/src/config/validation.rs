//! Configuration validation.

use super::Config;
use crate::core::uri::{redact, ConnectionUri};
use crate::error::{DbError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.url.trim().is_empty() {
        return Err(DbError::Config("database.url is required".into()));
    }

    let uri = ConnectionUri::parse(&config.database.url)?;
    if uri.scheme != "mysql" {
        return Err(DbError::Config(format!(
            "database.url must use the 'mysql' scheme, got '{}'",
            uri.scheme
        )));
    }
    if uri.params.database().is_empty() {
        return Err(DbError::Config(format!(
            "database.url must name a database: '{}'",
            redact(&config.database.url)
        )));
    }

    if config.database.mysqldump_path.as_os_str().is_empty() {
        return Err(DbError::Config(
            "database.mysqldump_path must not be empty".into(),
        ));
    }
    if config.backup.directory.as_os_str().is_empty() {
        return Err(DbError::Config("backup.directory must not be empty".into()));
    }

    Ok(())
}
