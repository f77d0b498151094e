//! Mapping from sqlx errors to the seed error taxonomy.

use assessment_seed_core::SeedError;

const UNIQUE_VIOLATION: &str = "23505";
const INVALID_CATALOG_NAME: &str = "3D000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    Configuration,
    Connection,
    DuplicateKey,
    Store,
}

fn kind_of(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::Configuration(_) => ErrorKind::Configuration,
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ErrorKind::Connection,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => ErrorKind::DuplicateKey,
            // Class 08: connection exception. Class 28: invalid authorization.
            Some(code) if code.starts_with("08") || code.starts_with("28") => {
                ErrorKind::Connection
            }
            Some(INVALID_CATALOG_NAME) => ErrorKind::Connection,
            _ => ErrorKind::Store,
        },
        _ => ErrorKind::Store,
    }
}

/// Classify a sqlx error raised while doing `context`.
pub fn classify(err: sqlx::Error, context: &str) -> SeedError {
    match kind_of(&err) {
        ErrorKind::Configuration => SeedError::Configuration(format!("{context}: {err}")),
        ErrorKind::Connection => {
            SeedError::Connection(anyhow::Error::new(err).context(context.to_string()))
        }
        ErrorKind::DuplicateKey => SeedError::DuplicateKey(format!("{context}: {err}")),
        ErrorKind::Store => SeedError::store(context, err),
    }
}
