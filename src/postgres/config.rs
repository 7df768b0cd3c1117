use std::time::Duration;

use crate::error::SqlConnectError;
use crate::parameter::Parameter;

use super::PostgresConnect;

/// Options for connecting to a `PostgreSQL` (or `TimescaleDB`) server.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// SQL run once after every (re)connect, e.g. `SET search_path TO ...`.
    pub attach: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "postgres".to_string(),
            attach: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PostgresOptions {
    /// Read the options from a parameter bag.
    ///
    /// Keys (all optional): `host`, `port`, `usr`, `pwd`, `db`, `attach`,
    /// `connect_timeout_ms`.
    ///
    /// # Errors
    ///
    /// `ConfigError` when `port` is outside `1..=65535`.
    pub fn from_params(param: &Parameter) -> Result<Self, SqlConnectError> {
        let defaults = Self::default();
        let port: i64 = param.try_get("port", i64::from(defaults.port));
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| SqlConnectError::ConfigError(format!("postgres: invalid port {port}")))?;
        let timeout_ms: i64 = param.try_get("connect_timeout_ms", 10_000);
        let attach: String = param.try_get("attach", String::new());

        Ok(Self {
            host: param.try_get("host", defaults.host),
            port,
            user: param.try_get("usr", defaults.user),
            password: param.try_get("pwd", defaults.password),
            dbname: param.try_get("db", defaults.dbname),
            attach: (!attach.is_empty()).then_some(attach),
            connect_timeout: u64::try_from(timeout_ms)
                .map_or(defaults.connect_timeout, Duration::from_millis),
        })
    }

    pub(super) fn pg_config(&self) -> tokio_postgres::Config {
        let mut cfg = tokio_postgres::Config::new();
        cfg.host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.dbname)
            .connect_timeout(self.connect_timeout);
        cfg
    }
}

/// Fluent builder for `PostgreSQL` options.
#[derive(Debug, Clone, Default)]
pub struct PostgresOptionsBuilder {
    opts: PostgresOptions,
}

impl PostgresOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = user.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = password.into();
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.opts.dbname = dbname.into();
        self
    }

    #[must_use]
    pub fn attach(mut self, sql: impl Into<String>) -> Self {
        self.opts.attach = Some(sql.into());
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.opts.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn finish(self) -> PostgresOptions {
        self.opts
    }

    /// # Errors
    ///
    /// See [`PostgresConnect::open`].
    pub fn build(self) -> Result<PostgresConnect, SqlConnectError> {
        PostgresConnect::open(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let mut param = Parameter::new();
        param.set("host", "db.internal").unwrap();
        param.set("port", 6543).unwrap();
        let opts = PostgresOptions::from_params(&param).unwrap();
        assert_eq!(opts.host, "db.internal");
        assert_eq!(opts.port, 6543);
        assert_eq!(opts.user, "postgres");
        assert_eq!(opts.dbname, "postgres");
        assert!(opts.password.is_empty());
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let mut param = Parameter::new();
        param.set("port", 70_000).unwrap();
        assert!(matches!(
            PostgresOptions::from_params(&param),
            Err(SqlConnectError::ConfigError(_))
        ));
    }
}
