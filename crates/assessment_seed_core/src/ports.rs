//! Storage port traits for the seed loader.
//! Implemented by assessment_seed_postgres. Loader logic depends only on these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{CriterionDef, TemplateDef};
use crate::error::SeedError;

pub type Result<T> = std::result::Result<T, SeedError>;

/// Store-generated identifier of an `assessment_templates` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub i32);

/// Store-generated identifier of an `assessment_criteria` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CriterionId(pub i32);

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for CriterionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of an insert guarded by the natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted<T> {
    Created(T),
    /// A row with the same natural key was already present.
    AlreadyExists,
}

/// Row totals across both seeded tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub templates: i64,
    pub criteria: i64,
}

/// Connection-level operations.
#[async_trait]
pub trait SeedStore: Send + Sync {
    /// Open a batch. Everything written through it becomes visible on
    /// `commit` and is discarded on `rollback` or drop.
    async fn begin(&self) -> Result<Box<dyn SeedBatch>>;

    async fn counts(&self) -> Result<StoreCounts>;

    /// Release the underlying connection(s). Idempotent.
    async fn close(&self);
}

/// Lookups and inserts for one template and its criteria.
#[async_trait]
pub trait SeedBatch: Send {
    async fn find_template(&mut self, code: &str) -> Result<Option<TemplateId>>;

    /// Template stored under `name`, whatever its code.
    async fn find_template_by_name(&mut self, name: &str) -> Result<Option<TemplateId>>;

    async fn insert_template(&mut self, template: &TemplateDef) -> Result<Inserted<TemplateId>>;

    async fn find_criterion(
        &mut self,
        template_id: TemplateId,
        criterion_code: &str,
    ) -> Result<Option<CriterionId>>;

    async fn insert_criterion(
        &mut self,
        template_id: TemplateId,
        criterion: &CriterionDef,
        display_order: i32,
    ) -> Result<Inserted<CriterionId>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
