//! Connection identity and derived connect parameters

use serde::{Deserialize, Serialize};

/// Application name reported to the server when the identity sets none
pub const DEFAULT_APPLICATION_NAME: &str = "pgkeeper";

/// Default PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Who to connect as and where.
///
/// An identity never changes once built. Use [`ConnectionIdentity::derive`] to
/// get a variant pointing at another database or user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionIdentity {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub dbname: String,
    #[serde(default)]
    pub application_name: Option<String>,
}

/// Fields to replace when deriving an identity. `None` keeps the original.
#[derive(Debug, Clone, Default)]
pub struct IdentityOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub application_name: Option<String>,
}

impl IdentityOverrides {
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }
}

impl ConnectionIdentity {
    /// Create an identity on the default port, without password or application name
    pub fn new(host: impl Into<String>, user: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: None,
            dbname: dbname.into(),
            application_name: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Build a new identity, replacing the fields set in `overrides`.
    pub fn derive(&self, overrides: IdentityOverrides) -> Self {
        Self {
            host: overrides.host.unwrap_or_else(|| self.host.clone()),
            port: overrides.port.unwrap_or(self.port),
            user: overrides.user.unwrap_or_else(|| self.user.clone()),
            password: overrides.password.or_else(|| self.password.clone()),
            dbname: overrides.dbname.unwrap_or_else(|| self.dbname.clone()),
            application_name: overrides
                .application_name
                .or_else(|| self.application_name.clone()),
        }
    }

    /// Parameters for the raw connect primitive.
    ///
    /// `dbname` selects another database on the same server. `None` keeps the
    /// identity's default database.
    pub fn connect_params(&self, dbname: Option<&str>) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            dbname: dbname.unwrap_or(&self.dbname).to_string(),
            application_name: self
                .application_name
                .clone()
                .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string()),
            decode: DecodeOptions::default(),
        }
    }
}

impl std::fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}

impl std::fmt::Debug for ConnectionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionIdentity")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("dbname", &self.dbname)
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// How result values are decoded on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Decode NUMERIC columns as `Value::Float64` instead of `Value::Decimal`
    pub numeric_as_float: bool,
}

impl Default for DecodeOptions {
    /// Monitoring queries feed metrics, so NUMERIC becomes a float by default.
    fn default() -> Self {
        Self {
            numeric_as_float: true,
        }
    }
}

/// Fully resolved parameters for one connect call
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub dbname: String,
    pub application_name: String,
    pub decode: DecodeOptions,
}

impl ConnectParams {
    pub fn with_decode(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("dbname", &self.dbname)
            .field("application_name", &self.application_name)
            .field("decode", &self.decode)
            .finish()
    }
}

#[cfg(test)]
mod tests;
