//! Assessment seed core.
//!
//! Pure domain for seeding assessment templates and their criteria:
//! the versioned catalog, the lookup-or-create loader, and the storage
//! port traits it runs against. Implemented for Postgres by
//! `assessment_seed_postgres`; `memory` provides an in-process store.

pub mod catalog;
pub mod error;
pub mod loader;
pub mod memory;
pub mod ports;

pub use catalog::{Catalog, CatalogWarning, CriterionDef, TemplateDef};
pub use error::{CatalogViolation, SeedError};
pub use loader::{
    plan, run_seed, PlannedTemplate, SeedEvent, SeedObserver, SeedReport, Silent, TemplateReport,
};
pub use ports::{CriterionId, Inserted, SeedBatch, SeedStore, StoreCounts, TemplateId};
