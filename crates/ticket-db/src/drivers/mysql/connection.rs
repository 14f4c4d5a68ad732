//! MySQL connection wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::cursor::Cursor;
use crate::core::traits::{DbConnection, Session, SessionFactory, SharedSession};
use crate::core::uri::ConnectionParams;
use crate::core::value::Value;
use crate::error::{DbError, Result};

use super::dialect::MysqlDialect;
use super::options::ConnectOptions;

const CHARSET_QUERY: &str = "SHOW VARIABLES WHERE variable_name='character_set_database'";

/// A live MySQL connection bound to one database.
///
/// The connection negotiates its charset on open: if the database charset
/// differs from the requested one, the session is reopened with the
/// database charset.
pub struct MysqlConnection {
    session: SharedSession,
    schema: String,
    charset: String,
    server_version: Option<String>,
    dialect: MysqlDialect,
    closed: bool,
}

impl MysqlConnection {
    /// Open a connection from URI components.
    pub async fn open<F>(factory: &F, params: &ConnectionParams) -> Result<Self>
    where
        F: SessionFactory<ConnectOptions> + ?Sized,
    {
        let mut opts = ConnectOptions::from_params(params);
        opts.load_option_file().await?;
        Self::open_with(factory, &opts).await
    }

    /// Open a connection from resolved options.
    pub async fn open_with<F>(factory: &F, opts: &ConnectOptions) -> Result<Self>
    where
        F: SessionFactory<ConnectOptions> + ?Sized,
    {
        let mut session = factory.connect(opts).await?;
        let charset = database_charset(session.as_mut()).await?;

        if charset != opts.charset {
            debug!(
                "Database charset is {} but {} was requested, reconnecting",
                charset, opts.charset
            );
            if let Err(e) = session.close().await {
                debug!("Closing the initial session failed: {}", e);
            }
            session = factory.connect(&opts.with_charset(&charset)).await?;
        }

        let server_version = session.server_version();
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            schema: opts.database.clone(),
            charset,
            server_version,
            dialect: MysqlDialect::new(),
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(DbError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Key names and their columns, in index order.
    async fn index_columns(&mut self, quoted_table: &str) -> Result<Vec<(String, Vec<String>)>> {
        let rows = self
            .execute(&format!("SHOW INDEX FROM {}", quoted_table), Vec::new())
            .await?;

        let mut keys: Vec<(String, Vec<String>)> = Vec::new();
        for row in rows {
            let key = row.get_by_name("Key_name").and_then(Value::as_str);
            let column = row.get_by_name("Column_name").and_then(Value::as_str);
            let (Some(key), Some(column)) = (key, column) else {
                continue;
            };
            match keys.iter_mut().find(|(k, _)| k == key) {
                Some((_, columns)) => columns.push(column.to_string()),
                None => keys.push((key.to_string(), vec![column.to_string()])),
            }
        }
        Ok(keys)
    }
}

/// Read the database charset, normalizing `utf8mb3` to `utf8`.
async fn database_charset(session: &mut dyn Session) -> Result<String> {
    let outcome = session.query(CHARSET_QUERY, Vec::new()).await?;
    let charset = outcome
        .rows
        .first()
        .and_then(|row| row.text(1))
        .filter(|cs| !cs.is_empty())
        .ok_or_else(|| DbError::setup("Server did not report character_set_database"))?;
    Ok(match charset {
        "utf8mb3" => "utf8".to_string(),
        other => other.to_string(),
    })
}

#[async_trait]
impl DbConnection for MysqlConnection {
    fn schema(&self) -> &str {
        &self.schema
    }

    fn charset(&self) -> &str {
        &self.charset
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    fn cursor(&self) -> Result<Cursor> {
        self.ensure_open()?;
        Ok(Cursor::new(self.session.clone()))
    }

    fn quote(&self, identifier: &str) -> String {
        self.dialect.quote_ident(identifier)
    }

    fn like(&self) -> String {
        self.dialect.like(&self.charset)
    }

    fn like_escape(&self, text: &str) -> String {
        self.dialect.like_escape(text)
    }

    fn prefix_match(&self) -> String {
        self.dialect.prefix_match()
    }

    fn cast(&self, column: &str, sql_type: &str) -> String {
        self.dialect.cast(column, sql_type)
    }

    fn concat(&self, args: &[&str]) -> String {
        self.dialect.concat(args)
    }

    async fn get_table_names(&mut self) -> Result<Vec<String>> {
        let rows = self
            .execute(
                "SELECT table_name FROM information_schema.tables WHERE table_schema=?",
                vec![self.schema.clone().into()],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.text(0).map(str::to_string))
            .collect())
    }

    async fn get_column_names(&mut self, table: &str) -> Result<Vec<String>> {
        let rows = self
            .execute(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema=? AND table_name=? ORDER BY ordinal_position",
                vec![self.schema.clone().into(), table.into()],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.text(0).map(str::to_string))
            .collect())
    }

    async fn has_table(&mut self, table: &str) -> Result<bool> {
        let rows = self
            .execute(
                "SELECT EXISTS (SELECT * FROM information_schema.columns \
                 WHERE table_schema=? AND table_name=?)",
                vec![self.schema.clone().into(), table.into()],
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(0))
            .is_some_and(Value::is_truthy))
    }

    async fn get_sequence_names(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(Vec::new())
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        self.ensure_open()?;
        let mut cursor = Cursor::silent(self.session.clone());
        cursor
            .execute(&format!("DROP TABLE IF EXISTS {}", self.quote(table)), Vec::new())
            .await
    }

    async fn drop_column(&mut self, table: &str, column: &str) -> Result<()> {
        if !self
            .get_column_names(table)
            .await?
            .iter()
            .any(|c| c == column)
        {
            return Ok(());
        }

        let quoted_table = self.quote(table);
        let keys = self.index_columns(&quoted_table).await?;
        let mut cursor = self.cursor()?;

        for (key, columns) in keys {
            if columns.len() > 1 && columns.iter().any(|c| c == column) {
                let sql = if key == "PRIMARY" {
                    format!("ALTER TABLE {} DROP PRIMARY KEY", quoted_table)
                } else {
                    format!("ALTER TABLE {} DROP KEY {}", quoted_table, self.quote(&key))
                };
                debug!("{}", sql);
                cursor.execute(&sql, Vec::new()).await?;
            }
        }

        cursor
            .execute(
                &format!("ALTER TABLE {} DROP COLUMN {}", quoted_table, self.quote(column)),
                Vec::new(),
            )
            .await
    }

    async fn reset_tables(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        if self.schema.is_empty() {
            return Ok(Vec::new());
        }

        let mut cursor = self.cursor()?;
        cursor
            .execute(
                "SELECT t.table_name, \
                 EXISTS (SELECT * FROM information_schema.columns AS c \
                 WHERE c.table_schema=t.table_schema \
                 AND c.table_name=t.table_name \
                 AND extra='auto_increment') \
                 FROM information_schema.tables AS t \
                 WHERE t.table_schema=?",
                vec![self.schema.clone().into()],
            )
            .await?;

        let mut table_names = Vec::new();
        for row in cursor.fetchall() {
            let Some(table) = row.text(0).map(str::to_string) else {
                continue;
            };
            let has_autoinc = row.get(1).is_some_and(Value::is_truthy);
            let quoted = self.quote(&table);
            // TRUNCATE resets the auto-increment counter, DELETE does not
            let sql = if has_autoinc {
                format!("TRUNCATE TABLE {}", quoted)
            } else {
                format!("DELETE FROM {}", quoted)
            };
            cursor.execute(&sql, Vec::new()).await?;
            table_names.push(table);
        }
        Ok(table_names)
    }

    fn get_last_id(&self, cursor: &Cursor, _table: &str, _column: &str) -> Option<u64> {
        cursor.lastrowid()
    }

    async fn update_sequence(
        &mut self,
        _cursor: &mut Cursor,
        _table: &str,
        _column: &str,
    ) -> Result<()> {
        // MySQL keeps auto-increment counters up to date itself
        self.ensure_open()
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.session.lock().await.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let mut session = self.session.lock().await;
        session.ping().await?;
        match session.rollback().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_disconnect() => {
                debug!("Rollback on an invalidated session: {}", e);
                self.closed = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Err(e) = self.session.lock().await.close().await {
            debug!("Session was already closed: {}", e);
        }
        self.closed = true;
        Ok(())
    }
}
