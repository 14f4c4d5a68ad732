//! Schema upgrade scripts.
//!
//! Each script is a literal list of statements that moves the database from
//! version `n - 1` to version `n`. The migration runner calls [`do_upgrade`]
//! once per version, in order.

use tracing::{debug, info};

use crate::core::cursor::Cursor;
use crate::default_schema::DB_VERSION;
use crate::error::{DbError, Result};

mod db46;

/// Highest version an upgrade script exists for.
pub const LATEST_VERSION: u32 = 46;

/// Statements upgrading the database to `version`, if a script exists.
pub fn statements(version: u32) -> Option<&'static [&'static str]> {
    match version {
        46 => Some(db46::SQL),
        _ => None,
    }
}

/// Versions with an upgrade script above `from`, in order.
pub fn pending(from: u32) -> Vec<u32> {
    (from.max(DB_VERSION) + 1..=LATEST_VERSION)
        .filter(|v| statements(*v).is_some())
        .collect()
}

/// Execute the upgrade script for `version` on `cursor`.
///
/// # Errors
///
/// Returns `DbError::Config` if no script exists for `version`; statement
/// failures are passed through.
pub async fn do_upgrade(cursor: &mut Cursor, version: u32) -> Result<()> {
    let sql = statements(version)
        .ok_or_else(|| DbError::Config(format!("No upgrade script for version {}", version)))?;

    info!("Upgrading database to version {}", version);
    for stmt in sql {
        debug!("{}", stmt);
        cursor.execute(stmt, Vec::new()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;

    #[test]
    fn test_statements_for_known_and_unknown_versions() {
        let sql = statements(46).unwrap();
        assert_eq!(sql.len(), 4);
        assert!(sql[2].contains("started\tinteger"));
        assert!(statements(45).is_none());
        assert!(statements(47).is_none());
    }

    #[test]
    fn test_pending() {
        assert_eq!(pending(45), vec![46]);
        assert_eq!(pending(0), vec![46]);
        assert!(pending(46).is_empty());
    }

    #[tokio::test]
    async fn test_do_upgrade_executes_in_order() {
        let server = FakeServer::new("trac");
        let mut cursor = Cursor::new(server.shared_session());
        do_upgrade(&mut cursor, 46).await.unwrap();

        let log = server.statements();
        let executed: Vec<&str> = log.iter().map(|(sql, _)| sql.as_str()).collect();
        assert_eq!(executed, statements(46).unwrap());
    }

    #[tokio::test]
    async fn test_do_upgrade_unknown_version() {
        let server = FakeServer::new("trac");
        let mut cursor = Cursor::new(server.shared_session());
        let err = do_upgrade(&mut cursor, 99).await.unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
        assert!(server.statements().is_empty());
    }
}
