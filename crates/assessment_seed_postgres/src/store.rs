//! Postgres implementation of the seed store port traits.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use assessment_seed_core::ports::Result;
use assessment_seed_core::{
    CriterionDef, CriterionId, Inserted, SeedBatch, SeedStore, StoreCounts, TemplateDef,
    TemplateId,
};

use crate::config::{mask_database_url, DatabaseConfig};
use crate::errors::classify;

/// Postgres-backed seed store. Owns its pool; call `close` when done.
pub struct PgSeedStore {
    pool: PgPool,
}

impl PgSeedStore {
    /// Open a pool and verify it with a round trip.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(
            target: "seed.postgres",
            "Connecting to database: {}",
            mask_database_url(&config.database_url)
        );

        let options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| classify(e, "parse DATABASE_URL"))?;

        let mut pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout);
        if let Some(idle_timeout) = config.idle_timeout {
            pool_options = pool_options.idle_timeout(idle_timeout);
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            debug!(target: "seed.postgres", "Failed to connect to database: {}", e);
            classify(e, "connect to database")
        })?;

        let store = Self { pool };
        if let Err(e) = store.ping().await {
            store.close().await;
            return Err(e);
        }

        info!(target: "seed.postgres", "Database connection established");
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "test connection"))
    }
}

#[async_trait]
impl SeedStore for PgSeedStore {
    async fn begin(&self) -> Result<Box<dyn SeedBatch>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify(e, "begin transaction"))?;
        Ok(Box::new(PgSeedBatch { tx }))
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let (templates, criteria) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT (SELECT COUNT(*) FROM assessment_templates),
                   (SELECT COUNT(*) FROM assessment_criteria)
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "count seeded rows"))?;
        Ok(StoreCounts {
            templates,
            criteria,
        })
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            info!(target: "seed.postgres", "Closing database connection pool");
            self.pool.close().await;
        }
    }
}

/// One transaction per template batch.
struct PgSeedBatch {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SeedBatch for PgSeedBatch {
    async fn find_template(&mut self, code: &str) -> Result<Option<TemplateId>> {
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM assessment_templates WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "select assessment_templates"))?;
        Ok(id.map(TemplateId))
    }

    async fn find_template_by_name(&mut self, name: &str) -> Result<Option<TemplateId>> {
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM assessment_templates WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "select assessment_templates by name"))?;
        Ok(id.map(TemplateId))
    }

    async fn insert_template(&mut self, template: &TemplateDef) -> Result<Inserted<TemplateId>> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO assessment_templates (code, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&template.code)
        .bind(&template.name)
        .bind(&template.description)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "insert assessment_templates"))?;

        Ok(match id {
            Some(id) => Inserted::Created(TemplateId(id)),
            None => {
                debug!(target: "seed.postgres", template = %template.code, "insert skipped by conflict");
                Inserted::AlreadyExists
            }
        })
    }

    async fn find_criterion(
        &mut self,
        template_id: TemplateId,
        criterion_code: &str,
    ) -> Result<Option<CriterionId>> {
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM assessment_criteria WHERE template_id = $1 AND criterion_code = $2",
        )
        .bind(template_id.0)
        .bind(criterion_code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "select assessment_criteria"))?;
        Ok(id.map(CriterionId))
    }

    async fn insert_criterion(
        &mut self,
        template_id: TemplateId,
        criterion: &CriterionDef,
        display_order: i32,
    ) -> Result<Inserted<CriterionId>> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO assessment_criteria
                (template_id, criterion_code, dimension, category, title,
                 description, assessment_question, weight, is_critical, display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(template_id.0)
        .bind(&criterion.code)
        .bind(&criterion.dimension)
        .bind(&criterion.category)
        .bind(&criterion.title)
        .bind(&criterion.description)
        .bind(&criterion.assessment_question)
        .bind(criterion.weight)
        .bind(criterion.critical)
        .bind(display_order)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "insert assessment_criteria"))?;

        Ok(match id {
            Some(id) => Inserted::Created(CriterionId(id)),
            None => Inserted::AlreadyExists,
        })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgSeedBatch { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| classify(e, "commit transaction"))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PgSeedBatch { tx } = *self;
        tx.rollback()
            .await
            .map_err(|e| classify(e, "rollback transaction"))
    }
}
