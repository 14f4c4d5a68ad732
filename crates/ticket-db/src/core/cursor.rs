//! Query cursor over a shared session.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;

use super::traits::SharedSession;
use super::value::{Row, Value};

/// Executes statements and buffers their results.
///
/// Parameters are normalised before binding: [`Value::Markup`] is sent as
/// plain text, so callers can pass rich text transparently. Results are
/// buffered, so [`Cursor::fetchall`] always returns a concrete `Vec`.
pub struct Cursor {
    session: SharedSession,
    silent: bool,
    description: Arc<[String]>,
    rows: std::vec::IntoIter<Row>,
    rowcount: u64,
    lastrowid: Option<u64>,
}

impl Cursor {
    /// Create a cursor that logs server warnings.
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            silent: false,
            description: Arc::from(Vec::new()),
            rows: Vec::new().into_iter(),
            rowcount: 0,
            lastrowid: None,
        }
    }

    /// Create a cursor that does not report server warnings.
    pub fn silent(session: SharedSession) -> Self {
        Self {
            silent: true,
            ..Self::new(session)
        }
    }

    /// Execute a statement with positional `?` parameters.
    pub async fn execute(&mut self, sql: &str, params: Vec<Value>) -> Result<()> {
        let params = normalize_params(params);
        let outcome = {
            let mut session = self.session.lock().await;
            session.query(sql, params).await?
        };

        if outcome.warnings > 0 && !self.silent {
            warn!("{} warning(s) raised by: {}", outcome.warnings, first_line(sql));
        }

        self.description = outcome.columns;
        self.rowcount = if outcome.rows.is_empty() {
            outcome.affected_rows
        } else {
            outcome.rows.len() as u64
        };
        self.lastrowid = outcome.last_insert_id;
        self.rows = outcome.rows.into_iter();
        Ok(())
    }

    /// Execute a statement once per parameter set.
    pub async fn executemany(&mut self, sql: &str, param_sets: Vec<Vec<Value>>) -> Result<()> {
        let mut total = 0;
        for params in param_sets {
            self.execute(sql, params).await?;
            total += self.rowcount;
        }
        self.rowcount = total;
        debug!("executemany affected {} row(s)", total);
        Ok(())
    }

    /// Next row of the current result.
    pub fn fetchone(&mut self) -> Option<Row> {
        self.rows.next()
    }

    /// All remaining rows of the current result.
    pub fn fetchall(&mut self) -> Vec<Row> {
        self.rows.by_ref().collect()
    }

    /// Column names of the current result.
    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// Rows returned or affected by the last statement.
    pub fn rowcount(&self) -> u64 {
        self.rowcount
    }

    /// Id generated by the last statement, `None` if it generated none.
    pub fn lastrowid(&self) -> Option<u64> {
        self.lastrowid
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetchone()
    }
}

/// Bind rich text as its plain string.
pub fn normalize_params(params: Vec<Value>) -> Vec<Value> {
    params.into_iter().map(Value::into_plain).collect()
}

fn first_line(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or_default()
}
