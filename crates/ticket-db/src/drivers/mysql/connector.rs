//! MySQL database connector.
//!
//! Creates connections, creates and destroys the application's tables,
//! checks the storage engine and collation invariants, and runs backups.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::schema::Table;
use crate::core::traits::{DatabaseConnector, DbConnection, SessionFactory};
use crate::core::uri::ConnectionParams;
use crate::core::value::Value;
use crate::default_schema;
use crate::error::{DbError, Result};

use super::backup::{run_backup, DEFAULT_MYSQLDUMP};
use super::connection::MysqlConnection;
use super::dialect::{max_bytes_for_charset, MysqlDialect};
use super::options::ConnectOptions;
use super::session::MysqlSessionFactory;

/// Storage engines without transaction support.
pub const UNSUPPORTED_ENGINES: &[&str] = &["MyISAM", "EXAMPLE", "ARCHIVE", "CSV", "ISAM"];

/// Accepted (charset, collation) pairs of the database.
pub const SUPPORTED_COLLATIONS: &[(&str, &str)] = &[
    ("utf8mb4", "utf8mb4_bin"),
    ("utf8mb3", "utf8_bin"),
    ("utf8", "utf8_bin"),
];

/// Accepted table collations; tables without a collation are accepted too.
const SUPPORTED_TABLE_COLLATIONS: &[&str] = &["utf8_bin", "utf8mb4_bin"];

/// Client library reported by [`DatabaseConnector::system_info`].
const CLIENT_NAME: &str = "mysql_async";

/// Version requirement of the client library this crate is built against.
const CLIENT_VERSION: &str = "0.34";

/// MySQL connector.
pub struct MysqlConnector {
    factory: Arc<dyn SessionFactory<ConnectOptions>>,
    dialect: MysqlDialect,
    mysqldump_path: PathBuf,
}

impl Default for MysqlConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlConnector {
    /// Create a connector backed by `mysql_async`.
    pub fn new() -> Self {
        Self::with_factory(Arc::new(MysqlSessionFactory))
    }

    /// Create a connector opening sessions through `factory`.
    pub fn with_factory(factory: Arc<dyn SessionFactory<ConnectOptions>>) -> Self {
        Self {
            factory,
            dialect: MysqlDialect::new(),
            mysqldump_path: PathBuf::from(DEFAULT_MYSQLDUMP),
        }
    }

    /// Set the `mysqldump` executable used by backups.
    pub fn with_mysqldump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mysqldump_path = path.into();
        self
    }

    pub fn mysqldump_path(&self) -> &Path {
        &self.mysqldump_path
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<MysqlConnection> {
        MysqlConnection::open(self.factory.as_ref(), params).await
    }

    async fn create_tables(&self, conn: &mut MysqlConnection, tables: &[Table]) -> Result<()> {
        verify_variables(conn).await?;
        let max_bytes = max_bytes_for_charset(conn.charset());

        let mut cursor = conn.cursor()?;
        for table in tables {
            for stmt in self.dialect.to_sql(table, max_bytes) {
                debug!("{}", stmt);
                cursor.execute(&stmt, Vec::new()).await?;
            }
        }

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        verify_table_status(conn, &names).await?;
        conn.commit().await?;
        info!("Created {} table(s) in {}", tables.len(), conn.schema());
        Ok(())
    }
}

async fn drop_tables(conn: &mut MysqlConnection) -> Result<()> {
    let tables = conn.get_table_names().await?;
    for table in &tables {
        conn.drop_table(table).await?;
    }
    conn.commit().await?;
    info!("Dropped {} table(s) from {}", tables.len(), conn.schema());
    Ok(())
}

/// Check the server's default engines and the database charset/collation.
///
/// # Errors
///
/// Returns `DbError::Setup` naming the offending engine or charset and
/// collation.
pub async fn verify_variables(conn: &mut dyn DbConnection) -> Result<()> {
    let rows = conn
        .execute(
            "SHOW VARIABLES WHERE variable_name IN (\
             'default_storage_engine','storage_engine',\
             'default_tmp_storage_engine',\
             'character_set_database','collation_database')",
            Vec::new(),
        )
        .await?;

    let vars: HashMap<String, String> = rows
        .iter()
        .filter_map(|row| {
            let name = row.text(0)?.to_lowercase();
            let value = row.text(1)?.to_string();
            Some((name, value))
        })
        .collect();
    let var = |name: &str| vars.get(name).map(String::as_str).filter(|v| !v.is_empty());

    if let Some(engine) = var("default_storage_engine").or_else(|| var("storage_engine")) {
        if UNSUPPORTED_ENGINES.contains(&engine) {
            return Err(DbError::setup(format!(
                "The current storage engine is {}. It must be InnoDB or NDB storage engine \
                 to support transactions.",
                engine
            )));
        }
    }

    if let Some(engine) = var("default_tmp_storage_engine") {
        if UNSUPPORTED_ENGINES.contains(&engine) {
            return Err(DbError::setup(format!(
                "The current storage engine for TEMPORARY tables is {}. It must be InnoDB \
                 or NDB storage engine to support transactions.",
                engine
            )));
        }
    }

    let charset = var("character_set_database").unwrap_or_default();
    let collation = var("collation_database").unwrap_or_default();
    if !SUPPORTED_COLLATIONS.contains(&(charset, collation)) {
        let supported: Vec<String> = SUPPORTED_COLLATIONS
            .iter()
            .map(|(cs, co)| format!("({}, {})", cs, co))
            .collect();
        return Err(DbError::setup(format!(
            "The charset and collation of database are '{}' and '{}'. The database must \
             be created with one of {}.",
            charset,
            collation,
            supported.join(", ")
        )));
    }

    Ok(())
}

/// Check that `tables` use a transactional engine and a binary collation.
///
/// # Errors
///
/// Returns `DbError::Setup` listing the offending tables.
pub async fn verify_table_status(conn: &mut dyn DbConnection, tables: &[&str]) -> Result<()> {
    if tables.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; tables.len()].join(",");
    let rows = conn
        .execute(
            &format!("SHOW TABLE STATUS WHERE name IN ({})", placeholders),
            tables.iter().map(|t| Value::from(*t)).collect(),
        )
        .await?;

    let mut engines = Vec::new();
    let mut non_utf8bin = Vec::new();
    for row in &rows {
        let name = row
            .get_by_name("Name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let engine = row.get_by_name("Engine").and_then(Value::as_str);
        let collation = row.get_by_name("Collation").and_then(Value::as_str);

        if engine.is_some_and(|e| UNSUPPORTED_ENGINES.contains(&e)) {
            engines.push(name);
        }
        if collation.is_some_and(|c| !SUPPORTED_TABLE_COLLATIONS.contains(&c)) {
            non_utf8bin.push(name);
        }
    }

    if !engines.is_empty() {
        return Err(DbError::setup(format!(
            "All tables must be created as InnoDB or NDB storage engine to support \
             transactions. The following tables have been created as storage engine which \
             doesn't support transactions: {}",
            engines.join(", ")
        )));
    }

    if !non_utf8bin.is_empty() {
        return Err(DbError::setup(format!(
            "All tables must be created with utf8_bin or utf8mb4_bin as collation. The \
             following tables don't have the collations: {}",
            non_utf8bin.join(", ")
        )));
    }

    Ok(())
}

#[async_trait]
impl DatabaseConnector for MysqlConnector {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn supported_schemes(&self) -> Vec<(&'static str, i32)> {
        vec![("mysql", 1)]
    }

    async fn get_connection(&self, params: &ConnectionParams) -> Result<Box<dyn DbConnection>> {
        Ok(Box::new(self.connect(params).await?))
    }

    async fn init_db(&self, params: &ConnectionParams, schema: Option<&[Table]>) -> Result<()> {
        let default_tables;
        let tables = match schema {
            Some(tables) => tables,
            None => {
                default_tables = default_schema::schema();
                &default_tables
            }
        };
        for table in tables {
            table.validate()?;
        }

        let mut conn = self.connect(params).await?;
        let result = self.create_tables(&mut conn, tables).await;
        conn.close().await?;
        result
    }

    async fn destroy_db(&self, params: &ConnectionParams) -> Result<()> {
        let mut conn = self.connect(params).await?;
        let result = drop_tables(&mut conn).await;
        conn.close().await?;
        result
    }

    async fn db_exists(&self, params: &ConnectionParams) -> Result<bool> {
        let mut conn = self.connect(params).await?;
        let result = conn.get_table_names().await;
        conn.close().await?;
        Ok(!result?.is_empty())
    }

    fn to_sql(&self, table: &Table, max_bytes: usize) -> Vec<String> {
        self.dialect.to_sql(table, max_bytes)
    }

    fn alter_column_types(
        &self,
        table: &str,
        columns: &BTreeMap<String, (String, String)>,
    ) -> Vec<String> {
        self.dialect.alter_column_types(table, columns)
    }

    async fn backup(&self, params: &ConnectionParams, dest: &Path) -> Result<PathBuf> {
        run_backup(&self.mysqldump_path, params, dest).await
    }

    async fn environment_needs_upgrade(&self, conn: &mut dyn DbConnection) -> Result<bool> {
        let tables = default_schema::schema();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        verify_table_status(conn, &names).await?;
        verify_variables(conn).await?;
        Ok(false)
    }

    fn system_info(&self, conn: Option<&dyn DbConnection>) -> Vec<(String, String)> {
        let server = conn
            .and_then(|c| c.server_version())
            .map(|v| format!("\"{}\"", v))
            .unwrap_or_else(|| "(not-connected)".to_string());
        vec![
            (
                "MySQL".to_string(),
                format!("server: {}, client: \"{}\"", server, CLIENT_NAME),
            ),
            (CLIENT_NAME.to_string(), CLIENT_VERSION.to_string()),
        ]
    }
}
