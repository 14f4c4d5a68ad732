//! Connector registry for explicit dependency injection.
//!
//! The [`ConnectorRegistry`] maps URI schemes to database connectors. It is
//! constructed explicitly and passed to callers rather than kept as global
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DbError, Result};

use super::traits::{DatabaseConnector, DbConnection};
use super::uri::{redact, ConnectionParams, ConnectionUri};

/// A connector registered for one scheme.
#[derive(Clone)]
struct Registration {
    priority: i32,
    connector: Arc<dyn DatabaseConnector>,
}

/// Registry of database connectors keyed by URI scheme.
///
/// When two connectors claim the same scheme, the one with the higher
/// priority wins; on a tie the later registration replaces the earlier one.
///
/// # Example
///
/// ```rust,ignore
/// let registry = ConnectorRegistry::with_builtins();
/// let (connector, params) = registry.resolve("mysql://trac@localhost/trac")?;
/// let mut conn = connector.get_connection(&params).await?;
/// ```
#[derive(Default)]
pub struct ConnectorRegistry {
    schemes: HashMap<String, Registration>,
}

impl ConnectorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in MySQL connector registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::drivers::mysql::MysqlConnector::new());
        registry
    }

    /// Register a connector for every scheme it supports.
    pub fn register(&mut self, connector: impl DatabaseConnector + 'static) {
        self.register_arc(Arc::new(connector));
    }

    /// Register a shared connector for every scheme it supports.
    pub fn register_arc(&mut self, connector: Arc<dyn DatabaseConnector>) {
        for (scheme, priority) in connector.supported_schemes() {
            let replace = self
                .schemes
                .get(scheme)
                .map_or(true, |existing| priority >= existing.priority);
            if replace {
                self.schemes.insert(
                    scheme.to_string(),
                    Registration {
                        priority,
                        connector: connector.clone(),
                    },
                );
            }
        }
    }

    /// Get the connector for a scheme.
    pub fn get(&self, scheme: &str) -> Option<Arc<dyn DatabaseConnector>> {
        self.schemes.get(scheme).map(|r| r.connector.clone())
    }

    /// Get the connector for a scheme, returning an error if none is registered.
    pub fn require(&self, scheme: &str) -> Result<Arc<dyn DatabaseConnector>> {
        self.get(scheme).ok_or_else(|| {
            DbError::Config(format!(
                "Unsupported database type \"{}\". Supported: {}",
                scheme,
                self.scheme_names().join(", ")
            ))
        })
    }

    /// Check if a scheme is registered.
    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.schemes.contains_key(scheme)
    }

    /// All registered schemes, sorted.
    pub fn scheme_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parse a connection URI and find its connector.
    pub fn resolve(&self, uri: &str) -> Result<(Arc<dyn DatabaseConnector>, ConnectionParams)> {
        let parsed = ConnectionUri::parse(uri)?;
        let connector = self.require(&parsed.scheme).map_err(|e| {
            DbError::Config(format!("{} (database URI '{}')", e, redact(uri)))
        })?;
        Ok((connector, parsed.params))
    }

    /// Parse a connection URI and open a connection.
    pub async fn connect(&self, uri: &str) -> Result<Box<dyn DbConnection>> {
        let (connector, params) = self.resolve(uri)?;
        connector.get_connection(&params).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;

    use super::*;
    use crate::core::schema::Table;

    struct StubConnector {
        name: &'static str,
        priority: i32,
    }

    #[async_trait]
    impl DatabaseConnector for StubConnector {
        fn name(&self) -> &str {
            self.name
        }

        fn supported_schemes(&self) -> Vec<(&'static str, i32)> {
            vec![("mysql", self.priority)]
        }

        async fn get_connection(&self, _: &ConnectionParams) -> Result<Box<dyn DbConnection>> {
            Err(DbError::ConnectionClosed)
        }

        async fn init_db(&self, _: &ConnectionParams, _: Option<&[Table]>) -> Result<()> {
            Ok(())
        }

        async fn destroy_db(&self, _: &ConnectionParams) -> Result<()> {
            Ok(())
        }

        async fn db_exists(&self, _: &ConnectionParams) -> Result<bool> {
            Ok(false)
        }

        fn to_sql(&self, _: &Table, _: usize) -> Vec<String> {
            Vec::new()
        }

        fn alter_column_types(
            &self,
            _: &str,
            _: &BTreeMap<String, (String, String)>,
        ) -> Vec<String> {
            Vec::new()
        }

        async fn backup(&self, _: &ConnectionParams, dest: &Path) -> Result<PathBuf> {
            Ok(dest.to_path_buf())
        }

        async fn environment_needs_upgrade(&self, _: &mut dyn DbConnection) -> Result<bool> {
            Ok(false)
        }

        fn system_info(&self, _: Option<&dyn DbConnection>) -> Vec<(String, String)> {
            Vec::new()
        }
    }

    #[test]
    fn test_builtins_register_mysql() {
        let registry = ConnectorRegistry::with_builtins();
        assert!(registry.has_scheme("mysql"));
        assert_eq!(registry.require("mysql").unwrap().name(), "mysql");
    }

    #[test]
    fn test_higher_priority_wins() {
        let mut registry = ConnectorRegistry::new();
        registry.register(StubConnector { name: "high", priority: 5 });
        registry.register(StubConnector { name: "low", priority: 1 });
        assert_eq!(registry.get("mysql").unwrap().name(), "high");

        registry.register(StubConnector { name: "higher", priority: 9 });
        assert_eq!(registry.get("mysql").unwrap().name(), "higher");
    }

    #[test]
    fn test_unknown_scheme_is_config_error() {
        let registry = ConnectorRegistry::with_builtins();
        let err = registry.resolve("sqlite:///tmp/trac.db").err().unwrap();
        assert!(matches!(err, DbError::Config(_)));
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn test_resolve_returns_params() {
        let registry = ConnectorRegistry::with_builtins();
        let (connector, params) = registry.resolve("mysql://u:p@db:3307/trac").unwrap();
        assert_eq!(connector.name(), "mysql");
        assert_eq!(params.database(), "trac");
        assert_eq!(params.port, Some(3307));
    }
}
