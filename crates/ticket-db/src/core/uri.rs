//! Connection URI parsing.
//!
//! ```text
//! scheme://[user[:password]@]host[:port]/database[?param=value&...]
//! ```

use std::collections::BTreeMap;

use url::Url;

use crate::error::{DbError, Result};

/// Parsed components of a connection URI, without the scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    /// URI path, normally `/database`.
    pub path: String,
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Host name or address.
    pub host: Option<String>,
    /// TCP port.
    pub port: Option<u16>,
    /// Query parameters, sorted by name.
    pub params: BTreeMap<String, String>,
}

impl ConnectionParams {
    /// Create parameters for a database path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Database name: the last path segment.
    pub fn database(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// A connection URI split into its scheme and connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    /// URI scheme, used to pick a connector.
    pub scheme: String,
    /// Everything else.
    pub params: ConnectionParams,
}

impl ConnectionUri {
    /// Parse a connection URI.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Config` if the string is not a valid URI.
    /// Percent-encoded bytes that are not UTF-8 are replaced, not rejected.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| DbError::Config(format!("Invalid database URI '{}': {}", redact(uri), e)))?;

        let user = match url.username() {
            "" => None,
            name => Some(decode(name)?),
        };
        let password = url.password().map(decode).transpose()?;
        let host = url.host_str().filter(|h| !h.is_empty()).map(str::to_string);
        let params = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            scheme: url.scheme().to_string(),
            params: ConnectionParams {
                path: decode(url.path())?,
                user,
                password,
                host,
                port: url.port(),
                params,
            },
        })
    }
}

fn decode(s: &str) -> Result<String> {
    url::form_urlencoded::parse(format!("x={}", s.replace('+', "%2B").replace('&', "%26")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| DbError::Config(format!("Invalid percent-encoding in '{}'", s)))
}

/// Hide the password of a URI for log and error messages.
pub fn redact(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}
