//! Connect options for MySQL sessions.
//!
//! Built from parsed URI components and query parameters. Unknown
//! parameters are logged and ignored.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::warn;

use crate::core::uri::ConnectionParams;
use crate::error::{DbError, Result};

/// Default MySQL TCP port.
pub const DEFAULT_PORT: u16 = 3306;

/// Charset requested before the database charset is known.
pub const DEFAULT_CHARSET: &str = "utf8";

/// Character sets accepted in the `charset` parameter.
const SUPPORTED_CHARSETS: &[&str] = &["utf8", "utf8mb4"];

/// Fully resolved options for opening one MySQL session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Database name.
    pub database: String,
    pub user: Option<String>,
    pub password: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Character set of the session.
    pub charset: String,
    /// Extra statement run when the session opens.
    pub init_command: Option<String>,
    /// Option file supplying defaults.
    pub read_default_file: Option<PathBuf>,
    /// Option file group read in addition to `[client]`.
    pub read_default_group: Option<String>,
    pub unix_socket: Option<String>,
    pub compress: bool,
    pub named_pipe: bool,
}

impl ConnectOptions {
    /// Build options from URI components.
    ///
    /// A leading `/` is stripped from the path to get the database name, a
    /// missing password becomes empty and `charset` is lowercased. Invalid
    /// charsets and unknown parameters are logged and ignored.
    pub fn from_params(params: &ConnectionParams) -> Self {
        let database = params
            .path
            .strip_prefix('/')
            .unwrap_or(&params.path)
            .to_string();

        let mut opts = Self {
            database,
            user: params.user.clone(),
            password: params.password.clone().unwrap_or_default(),
            host: params.host.clone(),
            port: params.port,
            charset: DEFAULT_CHARSET.to_string(),
            init_command: None,
            read_default_file: None,
            read_default_group: None,
            unix_socket: None,
            compress: false,
            named_pipe: false,
        };

        for (name, value) in &params.params {
            match name.as_str() {
                "read_default_group" => opts.read_default_group = Some(value.clone()),
                "init_command" => opts.init_command = Some(value.clone()),
                "read_default_file" => opts.read_default_file = Some(PathBuf::from(value)),
                "unix_socket" => opts.unix_socket = Some(value.clone()),
                "compress" => opts.compress = as_int(value, 0) != 0,
                "named_pipe" => opts.named_pipe = as_int(value, 0) != 0,
                "charset" => {
                    let value = value.to_lowercase();
                    if SUPPORTED_CHARSETS.contains(&value.as_str()) {
                        opts.charset = value;
                    } else {
                        warn!("Invalid connection string parameter '{}={}'", name, value);
                    }
                }
                _ => warn!("Invalid connection string parameter '{}'", name),
            }
        }

        opts
    }

    /// Same options with another session charset.
    pub fn with_charset(&self, charset: impl Into<String>) -> Self {
        Self {
            charset: charset.into(),
            ..self.clone()
        }
    }

    /// Port to connect to.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Host to connect to.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// Statements run on every new session.
    pub fn init_statements(&self) -> Vec<String> {
        let mut statements = vec![
            format!("SET NAMES {}", self.charset),
            "SET autocommit=0".to_string(),
        ];
        if let Some(cmd) = &self.init_command {
            statements.push(cmd.clone());
        }
        statements
    }

    /// Fill options not given in the URI from `read_default_file`.
    ///
    /// Reads the `[client]` group and then `read_default_group`, later
    /// values overriding earlier ones. Values from the URI always win.
    pub async fn load_option_file(&mut self) -> Result<()> {
        let Some(path) = self.read_default_file.clone() else {
            return Ok(());
        };
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            DbError::Config(format!(
                "Cannot read option file '{}': {}",
                path.display(),
                e
            ))
        })?;
        self.apply_option_file(&content);
        Ok(())
    }

    /// Apply the contents of an option file.
    pub fn apply_option_file(&mut self, content: &str) {
        let mut groups = vec!["client"];
        if let Some(group) = self.read_default_group.as_deref() {
            groups.push(group);
        }
        let values = parse_option_file(content, &groups);

        if self.user.is_none() {
            self.user = values.get("user").cloned();
        }
        if self.password.is_empty() {
            if let Some(password) = values.get("password") {
                self.password = password.clone();
            }
        }
        if self.host.is_none() {
            self.host = values.get("host").cloned();
        }
        if self.port.is_none() {
            self.port = values.get("port").and_then(|p| p.parse().ok());
        }
        if self.unix_socket.is_none() {
            self.unix_socket = values.get("socket").cloned();
        }
        if self.database.is_empty() {
            if let Some(database) = values.get("database") {
                self.database = database.clone();
            }
        }
    }
}

/// Parse an integer, falling back to `default`.
pub fn as_int(value: &str, default: i64) -> i64 {
    value.trim().parse().unwrap_or(default)
}

/// Collect `key=value` pairs from the given groups of a my.cnf-style file.
///
/// Groups are applied in order. Keys are normalized to lowercase with `-`
/// replaced by `_`; surrounding quotes are stripped from values.
pub fn parse_option_file(content: &str, groups: &[&str]) -> BTreeMap<String, String> {
    let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = Some(name.trim().to_lowercase());
            continue;
        }
        let Some(section) = current.as_ref() else {
            continue;
        };
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (line, ""),
        };
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        sections
            .entry(section.clone())
            .or_default()
            .push((key.to_lowercase().replace('-', "_"), value.to_string()));
    }

    let mut values = BTreeMap::new();
    for group in groups {
        if let Some(pairs) = sections.get(&group.to_lowercase()) {
            for (key, value) in pairs {
                values.insert(key.clone(), value.clone());
            }
        }
    }
    values
}
