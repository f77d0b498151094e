//! Assessment criteria seed loader.
//!
//! Library half of the `seed-assessment-criteria` binary: argument parsing,
//! logging setup, and the run that ties the bundled catalog to a Postgres
//! store.

pub mod app;
pub mod cli;
pub mod telemetry;
