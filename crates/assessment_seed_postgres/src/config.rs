//! Database connection configuration.

use std::time::Duration;

use assessment_seed_core::SeedError;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const POOL_SIZE_VAR: &str = "DATABASE_POOL_SIZE";
pub const CONNECT_TIMEOUT_VAR: &str = "DATABASE_CONNECT_TIMEOUT_SECS";

#[derive(Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    /// Configuration for a single linear seed run.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 1,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn from_env() -> Result<Self, SeedError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. `DATABASE_URL` is required
    /// and must not be blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SeedError> {
        let database_url = lookup(DATABASE_URL_VAR)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                SeedError::Configuration(format!("{DATABASE_URL_VAR} not found in environment"))
            })?;

        let mut config = Self::new(database_url);
        if let Some(size) = lookup(POOL_SIZE_VAR) {
            config.max_connections = parse_var(POOL_SIZE_VAR, &size)?;
        }
        if let Some(secs) = lookup(CONNECT_TIMEOUT_VAR) {
            config.connect_timeout = Duration::from_secs(parse_var(CONNECT_TIMEOUT_VAR, &secs)?);
        }
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, SeedError> {
    raw.trim()
        .parse()
        .map_err(|_| SeedError::Configuration(format!("{name} has invalid value '{raw}'")))
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("database_url", &mask_database_url(&self.database_url))
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Mask the password in a database URL for logging.
pub fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let mut masked = parsed.clone();
            if parsed.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            masked.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
