//! In-memory MySQL stand-in for unit tests.
//!
//! Answers the statements the connection and connector issue with just
//! enough behavior to check their logic: tables and columns, server
//! variables, table status, indexes, auto-increment ids and a statement log.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::traits::{QueryOutcome, Session, SessionFactory, SharedSession};
use crate::core::value::Value;
use crate::drivers::mysql::ConnectOptions;
use crate::error::{DbError, Result};

#[derive(Debug, Clone)]
pub(crate) struct FakeTable {
    pub name: String,
    pub columns: Vec<(String, bool)>,
    pub engine: String,
    pub collation: Option<String>,
    /// (key name, column name) in index order.
    pub indexes: Vec<(String, String)>,
}

#[derive(Debug)]
struct FakeState {
    schema: String,
    variables: BTreeMap<String, String>,
    tables: Vec<FakeTable>,
    log: Vec<(String, Vec<Value>)>,
    next_insert_id: u64,
    connect_charsets: Vec<String>,
    default_engine: String,
    default_collation: Option<String>,
    invalid_on_rollback: bool,
    commits: usize,
    rollbacks: usize,
    pings: usize,
    closes: usize,
}

/// Shared in-memory server; every session opened from it sees the same state.
#[derive(Clone)]
pub(crate) struct FakeServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeServer {
    pub fn new(schema: &str) -> Self {
        let variables = [
            ("character_set_database", "utf8"),
            ("collation_database", "utf8_bin"),
            ("default_storage_engine", "InnoDB"),
            ("default_tmp_storage_engine", "InnoDB"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            state: Arc::new(Mutex::new(FakeState {
                schema: schema.to_string(),
                variables,
                tables: Vec::new(),
                log: Vec::new(),
                next_insert_id: 0,
                connect_charsets: Vec::new(),
                default_engine: "InnoDB".to_string(),
                default_collation: Some("utf8_bin".to_string()),
                invalid_on_rollback: false,
                commits: 0,
                rollbacks: 0,
                pings: 0,
                closes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            state: self.state.clone(),
            closed: false,
        }
    }

    pub fn shared_session(&self) -> SharedSession {
        let session: Box<dyn Session> = Box::new(self.session());
        Arc::new(tokio::sync::Mutex::new(session))
    }

    /// Every statement run so far with its parameters.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.lock().log.clone()
    }

    /// Statements run so far, whitespace collapsed.
    pub fn sql_log(&self) -> Vec<String> {
        self.lock().log.iter().map(|(sql, _)| collapse(sql)).collect()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Add a table; `columns` pairs a name with its auto-increment flag.
    pub fn create_table(&self, name: &str, columns: &[(&str, bool)]) {
        let mut state = self.lock();
        let table = FakeTable {
            name: name.to_string(),
            columns: columns.iter().map(|(c, a)| (c.to_string(), *a)).collect(),
            engine: state.default_engine.clone(),
            collation: state.default_collation.clone(),
            indexes: Vec::new(),
        };
        state.tables.retain(|t| t.name != name);
        state.tables.push(table);
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.lock().tables.iter().find(|t| t.name == name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn add_index(&self, table: &str, key: &str, columns: &[&str]) {
        let mut state = self.lock();
        if let Some(t) = state.tables.iter_mut().find(|t| t.name == table) {
            for column in columns {
                t.indexes.push((key.to_string(), column.to_string()));
            }
        }
    }

    pub fn set_table_status(&self, table: &str, engine: &str, collation: Option<&str>) {
        let mut state = self.lock();
        if let Some(t) = state.tables.iter_mut().find(|t| t.name == table) {
            t.engine = engine.to_string();
            t.collation = collation.map(str::to_string);
        }
    }

    /// Engine and collation given to tables created from now on.
    pub fn set_table_defaults(&self, engine: &str, collation: Option<&str>) {
        let mut state = self.lock();
        state.default_engine = engine.to_string();
        state.default_collation = collation.map(str::to_string);
    }

    pub fn set_variable(&self, name: &str, value: &str) {
        self.lock()
            .variables
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_variable(&self, name: &str) {
        self.lock().variables.remove(name);
    }

    /// Make ROLLBACK fail as if the server had invalidated the session.
    pub fn invalidate_on_rollback(&self) {
        self.lock().invalid_on_rollback = true;
    }

    /// Charsets requested by each session opened through the factory.
    pub fn connect_charsets(&self) -> Vec<String> {
        self.lock().connect_charsets.clone()
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    pub fn pings(&self) -> usize {
        self.lock().pings
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }
}

#[async_trait]
impl SessionFactory<ConnectOptions> for FakeServer {
    async fn connect(&self, opts: &ConnectOptions) -> Result<Box<dyn Session>> {
        self.lock().connect_charsets.push(opts.charset.clone());
        Ok(Box::new(self.session()))
    }
}

pub(crate) struct FakeSession {
    state: Arc<Mutex<FakeState>>,
    closed: bool,
}

impl FakeSession {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(DbError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn query(&mut self, sql: &str, params: Vec<Value>) -> Result<QueryOutcome> {
        self.check_open()?;
        let mut state = self.state.lock().unwrap();
        state.log.push((sql.to_string(), params.clone()));
        Ok(respond(&mut state, sql, &params))
    }

    async fn ping(&mut self) -> Result<()> {
        self.check_open()?;
        self.state.lock().unwrap().pings += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        let mut state = self.state.lock().unwrap();
        if state.invalid_on_rollback {
            return Err(DbError::Driver(mysql_async::Error::Driver(
                mysql_async::DriverError::ConnectionClosed,
            )));
        }
        state.rollbacks += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.closed = true;
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }

    fn server_version(&self) -> Option<String> {
        Some("8.0.36".to_string())
    }
}

/// Log output captured by [`capture_logs`].
#[derive(Clone, Default)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's log events into a buffer until the guard drops.
pub(crate) fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}

fn collapse(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All backtick-quoted identifiers, in order.
fn quoted_idents(sql: &str) -> Vec<String> {
    let mut idents = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '`' {
            continue;
        }
        let mut ident = String::new();
        while let Some(c) = chars.next() {
            if c == '`' {
                if chars.peek() == Some(&'`') {
                    chars.next();
                    ident.push('`');
                } else {
                    break;
                }
            } else {
                ident.push(c);
            }
        }
        idents.push(ident);
    }
    idents
}

fn text(v: &str) -> Value {
    Value::Text(v.to_string())
}

fn param_text(params: &[Value], idx: usize) -> String {
    params
        .get(idx)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn respond(state: &mut FakeState, sql: &str, params: &[Value]) -> QueryOutcome {
    let flat = collapse(sql);
    let upper = flat.to_uppercase();

    if upper.starts_with("SHOW VARIABLES WHERE VARIABLE_NAME='CHARACTER_SET_DATABASE'") {
        let rows = state
            .variables
            .get("character_set_database")
            .map(|charset| vec![text("character_set_database"), Value::Text(charset.clone())])
            .into_iter()
            .collect();
        return QueryOutcome::with_rows(&["Variable_name", "Value"], rows);
    }

    if upper.starts_with("SHOW VARIABLES WHERE VARIABLE_NAME IN") {
        let rows = state
            .variables
            .iter()
            .filter(|(name, _)| flat.contains(&format!("'{}'", name)))
            .map(|(name, value)| vec![Value::Text(name.clone()), Value::Text(value.clone())])
            .collect();
        return QueryOutcome::with_rows(&["Variable_name", "Value"], rows);
    }

    if upper.starts_with("SHOW TABLE STATUS") {
        let wanted: Vec<&str> = params.iter().filter_map(Value::as_str).collect();
        let rows = state
            .tables
            .iter()
            .filter(|t| wanted.contains(&t.name.as_str()))
            .map(|t| {
                vec![
                    Value::Text(t.name.clone()),
                    Value::Text(t.engine.clone()),
                    t.collation.clone().into(),
                ]
            })
            .collect();
        return QueryOutcome::with_rows(&["Name", "Engine", "Collation"], rows);
    }

    if upper.starts_with("SHOW INDEX FROM") {
        let table = quoted_idents(&flat).into_iter().next().unwrap_or_default();
        let rows = state
            .tables
            .iter()
            .filter(|t| t.name == table)
            .flat_map(|t| {
                t.indexes.iter().map(move |(key, column)| {
                    vec![
                        Value::Text(t.name.clone()),
                        Value::Text(key.clone()),
                        Value::Text(column.clone()),
                    ]
                })
            })
            .collect();
        return QueryOutcome::with_rows(&["Table", "Key_name", "Column_name"], rows);
    }

    if upper.contains("FROM INFORMATION_SCHEMA.TABLES AS T") {
        let schema = param_text(params, 0);
        let rows = if schema == state.schema {
            state
                .tables
                .iter()
                .map(|t| {
                    let has_autoinc = t.columns.iter().any(|(_, a)| *a);
                    vec![Value::Text(t.name.clone()), Value::Int(has_autoinc as i64)]
                })
                .collect()
        } else {
            Vec::new()
        };
        return QueryOutcome::with_rows(&["table_name", "has_autoinc"], rows);
    }

    if upper.starts_with("SELECT EXISTS") {
        let schema = param_text(params, 0);
        let table = param_text(params, 1);
        let exists = schema == state.schema && state.tables.iter().any(|t| t.name == table);
        return QueryOutcome::with_rows(&["exists"], vec![vec![Value::Int(exists as i64)]]);
    }

    if upper.starts_with("SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES") {
        let schema = param_text(params, 0);
        let rows = if schema == state.schema {
            state
                .tables
                .iter()
                .map(|t| vec![Value::Text(t.name.clone())])
                .collect()
        } else {
            Vec::new()
        };
        return QueryOutcome::with_rows(&["table_name"], rows);
    }

    if upper.starts_with("SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS") {
        let schema = param_text(params, 0);
        let table = param_text(params, 1);
        let rows = state
            .tables
            .iter()
            .filter(|t| schema == state.schema && t.name == table)
            .flat_map(|t| t.columns.iter().map(|(c, _)| vec![Value::Text(c.clone())]))
            .collect();
        return QueryOutcome::with_rows(&["column_name"], rows);
    }

    if upper.starts_with("CREATE TABLE") {
        let mut lines = sql.lines();
        let name = lines
            .next()
            .map(quoted_idents)
            .and_then(|idents| idents.into_iter().next())
            .unwrap_or_default();
        let columns = lines
            .map(str::trim)
            .filter(|line| line.starts_with('`'))
            .filter_map(|line| {
                quoted_idents(line)
                    .into_iter()
                    .next()
                    .map(|c| (c, line.contains("AUTO_INCREMENT")))
            })
            .collect();
        let table = FakeTable {
            name: name.clone(),
            columns,
            engine: state.default_engine.clone(),
            collation: state.default_collation.clone(),
            indexes: Vec::new(),
        };
        state.tables.retain(|t| t.name != name);
        state.tables.push(table);
        return QueryOutcome::default();
    }

    if upper.starts_with("DROP TABLE IF EXISTS") {
        let name = quoted_idents(&flat).into_iter().next().unwrap_or_default();
        let before = state.tables.len();
        state.tables.retain(|t| t.name != name);
        let warnings = if state.tables.len() == before { 1 } else { 0 };
        return QueryOutcome {
            warnings,
            ..QueryOutcome::default()
        };
    }

    if upper.starts_with("ALTER TABLE") {
        let idents = quoted_idents(&flat);
        let table = idents.first().cloned().unwrap_or_default();
        if let Some(t) = state.tables.iter_mut().find(|t| t.name == table) {
            if upper.contains("DROP PRIMARY KEY") {
                t.indexes.retain(|(key, _)| key != "PRIMARY");
            } else if upper.contains("DROP KEY") {
                let key = idents.get(1).cloned().unwrap_or_default();
                t.indexes.retain(|(k, _)| *k != key);
            } else if upper.contains("DROP COLUMN") {
                let column = idents.get(1).cloned().unwrap_or_default();
                t.columns.retain(|(c, _)| *c != column);
                t.indexes.retain(|(_, c)| *c != column);
            }
        }
        return QueryOutcome::default();
    }

    if upper.starts_with("INSERT") {
        state.next_insert_id += 1;
        return QueryOutcome {
            affected_rows: 1,
            last_insert_id: Some(state.next_insert_id),
            ..QueryOutcome::default()
        };
    }

    QueryOutcome::default()
}
