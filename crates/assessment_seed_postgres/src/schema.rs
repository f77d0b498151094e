//! Reference-data tables the seed writes to.
//!
//! The schema is normally owned by the application's migrations; this DDL
//! only creates what is missing so a fresh database can be seeded.

use sqlx::PgPool;
use tracing::info;

use assessment_seed_core::SeedError;

use crate::errors::classify;

const CREATE_TEMPLATES: &str = r#"
CREATE TABLE IF NOT EXISTS assessment_templates (
    id          SERIAL PRIMARY KEY,
    code        TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_CRITERIA: &str = r#"
CREATE TABLE IF NOT EXISTS assessment_criteria (
    id                  SERIAL PRIMARY KEY,
    template_id         INTEGER NOT NULL REFERENCES assessment_templates (id) ON DELETE CASCADE,
    criterion_code      TEXT NOT NULL,
    dimension           TEXT NOT NULL DEFAULT '',
    category            TEXT NOT NULL DEFAULT '',
    title               TEXT NOT NULL,
    description         TEXT NOT NULL DEFAULT '',
    assessment_question TEXT NOT NULL DEFAULT '',
    weight              NUMERIC(5, 2) NOT NULL DEFAULT 0,
    is_critical         BOOLEAN NOT NULL DEFAULT FALSE,
    display_order       INTEGER NOT NULL DEFAULT 0,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (template_id, criterion_code)
)
"#;

/// Create `assessment_templates` and `assessment_criteria` if absent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), SeedError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| classify(e, "begin schema transaction"))?;
    for (table, ddl) in [
        ("assessment_templates", CREATE_TEMPLATES),
        ("assessment_criteria", CREATE_CRITERIA),
    ] {
        sqlx::query(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(e, &format!("create table {table}")))?;
    }
    tx.commit()
        .await
        .map_err(|e| classify(e, "commit schema transaction"))?;

    info!(target: "seed.postgres", "assessment reference schema ensured");
    Ok(())
}
