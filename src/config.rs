//! Connection settings and export options.
//!
//! Both structs are built once by the caller and passed down explicitly;
//! nothing in the library reads the environment.

use std::fmt;

use crate::error::ValidationError;
use crate::export::ParquetCompression;

/// Rows per batch when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// File name used when exporting a single table or query without one.
pub const DEFAULT_OUTPUT_FILE: &str = "output.parquet";

/// Where and how to reach the PostgreSQL server.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: None,
            password: None,
            database: "postgres".to_string(),
        }
    }
}

impl PostgresSettings {
    /// Settings for `database` on `host:port`, without credentials.
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: None,
            password: None,
            database: database.into(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Same server and credentials, different database.
    #[must_use]
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    /// Build the client configuration for these settings.
    ///
    /// # Errors
    ///
    /// A user without a password is rejected with
    /// [`ValidationError::InvalidCredentials`].
    pub fn client_config(&self) -> Result<postgres::Config, ValidationError> {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database);
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => {
                config.user(user).password(password);
            }
            (Some(_), None) => {
                return Err(ValidationError::InvalidCredentials(
                    "POSTGRES_PASSWORD is not set.".to_string(),
                ))
            }
            (None, _) => {}
        }
        Ok(config)
    }

    /// `host:port/database`, safe to log.
    #[must_use]
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

/// Options for one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Rows per cursor fetch and per flushed batch.
    pub batch_size: usize,
    /// Parquet compression codec.
    pub compression: ParquetCompression,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            compression: ParquetCompression::default(),
        }
    }
}

impl ExportOptions {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }
}
