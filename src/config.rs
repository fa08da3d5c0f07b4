//! Database settings read from the environment.
//!
//! `.env` is loaded once in `main`; [`DbConfig`] is built from whatever the
//! process environment holds afterwards and handed to the prediction source
//! by reference.

use sqlx::postgres::PgConnectOptions;

use crate::error::{EvalError, Result};

const DB_USER: &str = "DB_USER";
const DB_PASSWORD: &str = "DB_PASSWORD";
const DB_HOST: &str = "DB_HOST";
const DB_PORT: &str = "DB_PORT";
const DB_NAME: &str = "DB_NAME";

/// Connection settings for the predictions database.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl DbConfig {
    /// Reads `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_PORT` and `DB_NAME`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Every missing or empty
    /// variable is reported in one error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();
        let mut get = |key: &'static str| match lookup(key).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(key);
                String::new()
            }
        };

        let user = get(DB_USER);
        let password = get(DB_PASSWORD);
        let host = get(DB_HOST);
        let port = get(DB_PORT);
        let database = get(DB_NAME);

        if !missing.is_empty() {
            return Err(EvalError::Configuration(format!(
                "missing environment variable(s): {}",
                missing.join(", ")
            )));
        }

        let port = port.trim().parse::<u16>().map_err(|e| {
            EvalError::Configuration(format!("{DB_PORT} must be a port number, got '{port}': {e}"))
        })?;

        Ok(Self {
            user,
            password,
            host,
            port,
            database,
        })
    }

    /// Connection options with each field set as given, so no character in
    /// the credentials needs escaping.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// `postgres://` URL for logs, password masked.
    pub fn display_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}
