//! PostgreSQL implementation of the assessment seed store.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) so the crate
//! builds without a live database.

pub mod config;
pub mod errors;
pub mod schema;
pub mod store;

pub use config::{mask_database_url, DatabaseConfig, DATABASE_URL_VAR};
pub use errors::classify;
pub use schema::ensure_schema;
pub use store::PgSeedStore;
