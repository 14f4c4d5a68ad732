//! MySQL session over a single `mysql_async` connection.
//!
//! This is the only module that talks to the wire; everything above it goes
//! through the [`Session`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Compression, Conn, Opts, OptsBuilder, Params, QueryResult};
use tracing::{debug, info, warn};

use crate::core::traits::{QueryOutcome, Session, SessionFactory};
use crate::core::value::{Row, Value};
use crate::error::{DbError, Result};

use super::options::ConnectOptions;

/// A live MySQL session.
pub struct MysqlSession {
    conn: Option<Conn>,
    opts: Opts,
    server_version: Option<String>,
}

impl MysqlSession {
    /// Open a session.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let opts = build_opts(options);
        let conn = Conn::new(opts.clone()).await?;
        let (major, minor, patch) = conn.server_version();
        let server_version = format!("{}.{}.{}", major, minor, patch);

        info!(
            "Connected to MySQL {} at {}:{}/{} (charset {})",
            server_version,
            options.host(),
            options.port(),
            options.database,
            options.charset
        );

        Ok(Self {
            conn: Some(conn),
            opts,
            server_version: Some(server_version),
        })
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        self.conn.as_mut().ok_or(DbError::ConnectionClosed)
    }
}

fn build_opts(options: &ConnectOptions) -> Opts {
    if options.named_pipe {
        warn!("Named pipe connections are not supported, using TCP or socket instead");
    }

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(options.host())
        .tcp_port(options.port())
        .db_name(Some(&options.database))
        .user(options.user.as_deref())
        .pass(Some(&options.password))
        .init(options.init_statements());

    if let Some(socket) = &options.unix_socket {
        builder = builder.socket(Some(socket));
    }
    if options.compress {
        builder = builder.compression(Some(Compression::default()));
    }

    builder.into()
}

#[async_trait]
impl Session for MysqlSession {
    async fn query(&mut self, sql: &str, params: Vec<Value>) -> Result<QueryOutcome> {
        let conn = self.conn()?;
        let (columns, rows) = if params.is_empty() {
            drain(conn.query_iter(sql).await?).await?
        } else {
            let params: Vec<mysql_async::Value> = params.into_iter().map(to_mysql).collect();
            drain(conn.exec_iter(sql, Params::Positional(params)).await?).await?
        };

        Ok(QueryOutcome {
            columns,
            rows,
            affected_rows: conn.affected_rows(),
            last_insert_id: conn.last_insert_id(),
            warnings: conn.get_warnings(),
        })
    }

    async fn ping(&mut self) -> Result<()> {
        let conn = self.conn()?;
        match conn.ping().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = DbError::from(e);
                if !err.is_disconnect() {
                    return Err(err);
                }
                warn!("MySQL server went away, reconnecting");
                let conn = Conn::new(self.opts.clone()).await?;
                self.conn = Some(conn);
                Ok(())
            }
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn()?.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn()?.query_drop("ROLLBACK").await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(DbError::ConnectionClosed)?;
        conn.disconnect().await?;
        debug!("MySQL session closed");
        Ok(())
    }

    fn server_version(&self) -> Option<String> {
        self.server_version.clone()
    }
}

/// Opens [`MysqlSession`]s.
#[derive(Debug, Clone, Default)]
pub struct MysqlSessionFactory;

#[async_trait]
impl SessionFactory<ConnectOptions> for MysqlSessionFactory {
    async fn connect(&self, opts: &ConnectOptions) -> Result<Box<dyn Session>> {
        Ok(Box::new(MysqlSession::connect(opts).await?))
    }
}

/// Read every row of a result, then drop it.
async fn drain<'a, 't: 'a, P: Protocol>(
    result: QueryResult<'a, 't, P>,
) -> Result<(Arc<[String]>, Vec<Row>)> {
    let columns: Arc<[String]> = match result.columns() {
        Some(cols) => cols.iter().map(|c| c.name_str().into_owned()).collect(),
        None => Arc::from(Vec::new()),
    };
    let raw: Vec<mysql_async::Row> = result.collect_and_drop().await?;
    let rows = raw
        .into_iter()
        .map(|row| Row::new(columns.clone(), row.unwrap().into_iter().map(from_mysql).collect()))
        .collect();
    Ok((columns, rows))
}

/// Convert a parameter to a driver value.
fn to_mysql(value: Value) -> mysql_async::Value {
    match value.into_plain() {
        Value::Null => mysql_async::Value::NULL,
        Value::Int(v) => mysql_async::Value::Int(v),
        Value::UInt(v) => mysql_async::Value::UInt(v),
        Value::Float(v) => mysql_async::Value::Double(v),
        Value::Text(s) => mysql_async::Value::Bytes(s.into_bytes()),
        Value::Bytes(b) => mysql_async::Value::Bytes(b),
        Value::Markup(m) => mysql_async::Value::Bytes(m.into_string().into_bytes()),
    }
}

/// Convert a driver value to a result cell.
fn from_mysql(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        mysql_async::Value::Int(v) => Value::Int(v),
        mysql_async::Value::UInt(v) => Value::UInt(v),
        mysql_async::Value::Float(v) => Value::Float(f64::from(v)),
        mysql_async::Value::Double(v) => Value::Float(v),
        mysql_async::Value::Date(y, mo, d, h, mi, s, us) => {
            let mut text = format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, mo, d, h, mi, s);
            if us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            Value::Text(text)
        }
        mysql_async::Value::Time(neg, days, h, mi, s, us) => {
            let hours = days * 24 + u32::from(h);
            let sign = if neg { "-" } else { "" };
            let mut text = format!("{}{:02}:{:02}:{:02}", sign, hours, mi, s);
            if us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            Value::Text(text)
        }
    }
}
