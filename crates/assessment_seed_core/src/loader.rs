//! Lookup-or-create loader for the assessment catalog.
//!
//! Each template is applied in its own batch: the template row is resolved
//! (found by code, or inserted) before any of its criteria, and criteria are
//! inserted only when `(template_id, criterion_code)` is not already present.
//! Re-running against a seeded store is a no-op.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, TemplateDef};
use crate::error::SeedError;
use crate::ports::{Inserted, Result, SeedBatch, SeedStore, TemplateId};

/// Outcome for one template batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateReport {
    pub code: String,
    pub name: String,
    pub template_id: TemplateId,
    pub template_created: bool,
    pub criteria_inserted: usize,
    pub criteria_skipped: usize,
}

/// Report of what a seed run wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub templates: Vec<TemplateReport>,
}

impl SeedReport {
    pub fn templates_created(&self) -> usize {
        self.templates.iter().filter(|t| t.template_created).count()
    }

    pub fn templates_reused(&self) -> usize {
        self.templates.len() - self.templates_created()
    }

    pub fn criteria_inserted(&self) -> usize {
        self.templates.iter().map(|t| t.criteria_inserted).sum()
    }

    pub fn criteria_skipped(&self) -> usize {
        self.templates.iter().map(|t| t.criteria_skipped).sum()
    }

    /// True when the run wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.templates_created() == 0 && self.criteria_inserted() == 0
    }
}

impl std::fmt::Display for SeedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Templates: {} created, {} reused | Criteria: {} inserted, {} skipped",
            self.templates_created(),
            self.templates_reused(),
            self.criteria_inserted(),
            self.criteria_skipped(),
        )
    }
}

/// Progress notifications emitted while seeding.
#[derive(Debug)]
pub enum SeedEvent<'a> {
    TemplateStarted {
        template: &'a TemplateDef,
    },
    TemplateResolved {
        code: &'a str,
        template_id: TemplateId,
        created: bool,
    },
    TemplateCommitted {
        report: &'a TemplateReport,
    },
}

pub trait SeedObserver {
    fn on_event(&mut self, event: &SeedEvent<'_>);
}

impl<F> SeedObserver for F
where
    F: FnMut(&SeedEvent<'_>),
{
    fn on_event(&mut self, event: &SeedEvent<'_>) {
        self(event)
    }
}

/// Observer that ignores every event.
pub struct Silent;

impl SeedObserver for Silent {
    fn on_event(&mut self, _event: &SeedEvent<'_>) {}
}

/// One line of a dry-run plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedTemplate<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub criteria: usize,
}

/// What a run would touch, without a store.
pub fn plan(catalog: &Catalog) -> Vec<PlannedTemplate<'_>> {
    catalog
        .templates
        .iter()
        .map(|t| PlannedTemplate {
            code: &t.code,
            name: &t.name,
            criteria: t.criteria.len(),
        })
        .collect()
}

/// Seed every template in `catalog`, in order, one batch per template.
///
/// A failing batch is rolled back and aborts the run; batches committed
/// before it remain.
pub async fn run_seed(
    store: &dyn SeedStore,
    catalog: &Catalog,
    observer: &mut dyn SeedObserver,
) -> Result<SeedReport> {
    catalog.validate()?;

    let mut report = SeedReport::default();
    for template in &catalog.templates {
        observer.on_event(&SeedEvent::TemplateStarted { template });

        let mut batch = store.begin().await.map_err(|e| e.within(&template.code))?;
        match seed_template(batch.as_mut(), template, observer).await {
            Ok(template_report) => {
                batch
                    .commit()
                    .await
                    .map_err(|e| e.within(&template.code))?;
                info!(
                    target: "seed.loader",
                    template = %template.code,
                    inserted = template_report.criteria_inserted,
                    skipped = template_report.criteria_skipped,
                    "template committed"
                );
                observer.on_event(&SeedEvent::TemplateCommitted {
                    report: &template_report,
                });
                report.templates.push(template_report);
            }
            Err(err) => {
                if let Err(rollback_err) = batch.rollback().await {
                    warn!(
                        target: "seed.loader",
                        template = %template.code,
                        "rollback failed: {rollback_err}"
                    );
                }
                return Err(err);
            }
        }
    }

    Ok(report)
}

async fn seed_template(
    batch: &mut dyn SeedBatch,
    template: &TemplateDef,
    observer: &mut dyn SeedObserver,
) -> Result<TemplateReport> {
    let (template_id, created) = resolve_template(batch, template)
        .await
        .map_err(|e| e.within(&template.code))?;
    observer.on_event(&SeedEvent::TemplateResolved {
        code: &template.code,
        template_id,
        created,
    });

    let mut report = TemplateReport {
        code: template.code.clone(),
        name: template.name.clone(),
        template_id,
        template_created: created,
        criteria_inserted: 0,
        criteria_skipped: 0,
    };

    for (index, criterion) in template.criteria.iter().enumerate() {
        let item = format!("{}/{}", template.code, criterion.code);
        let display_order = i32::try_from(index + 1)
            .map_err(|e| SeedError::store("display order out of range", e).within(&item))?;

        let existing = batch
            .find_criterion(template_id, &criterion.code)
            .await
            .map_err(|e| e.within(&item))?;
        if existing.is_some() {
            debug!(target: "seed.loader", criterion = %item, "criterion already present");
            report.criteria_skipped += 1;
            continue;
        }

        match batch
            .insert_criterion(template_id, criterion, display_order)
            .await
        {
            Ok(Inserted::Created(id)) => {
                debug!(target: "seed.loader", criterion = %item, %id, "criterion inserted");
                report.criteria_inserted += 1;
            }
            Ok(Inserted::AlreadyExists) | Err(SeedError::DuplicateKey(_)) => {
                debug!(target: "seed.loader", criterion = %item, "criterion inserted concurrently");
                report.criteria_skipped += 1;
            }
            Err(e) => return Err(e.within(&item)),
        }
    }

    Ok(report)
}

async fn resolve_template(
    batch: &mut dyn SeedBatch,
    template: &TemplateDef,
) -> Result<(TemplateId, bool)> {
    if let Some(id) = batch.find_template(&template.code).await? {
        debug!(target: "seed.loader", template = %template.code, %id, "template exists");
        return Ok((id, false));
    }

    match batch.insert_template(template).await {
        Ok(Inserted::Created(id)) => {
            info!(target: "seed.loader", template = %template.code, %id, "template created");
            Ok((id, true))
        }
        Ok(Inserted::AlreadyExists) | Err(SeedError::DuplicateKey(_)) => {
            if let Some(id) = batch.find_template(&template.code).await? {
                return Ok((id, false));
            }
            // Only the name collided: the row exists under another code.
            let id = batch
                .find_template_by_name(&template.name)
                .await?
                .ok_or_else(|| {
                    SeedError::store(
                        "resolve template",
                        anyhow!("conflicting row for '{}' could not be read back", template.code),
                    )
                })?;
            warn!(
                target: "seed.loader",
                template = %template.code,
                name = %template.name,
                %id,
                "template name already stored under another code, reusing that row"
            );
            Ok((id, false))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemorySeedStore};

    fn template_a() -> Catalog {
        Catalog::from_yaml_str(
            r#"
version: 1
templates:
  - code: template_a
    name: Template A
    criteria:
      - code: CLARITY
        title: Clarity
      - code: EVIDENCE
        title: Evidence
"#,
        )
        .unwrap()
    }

    fn two_templates() -> Catalog {
        Catalog::from_yaml_str(
            r#"
version: 1
templates:
  - code: first
    name: First
    criteria:
      - code: F1
        title: One
  - code: second
    name: Second
    criteria:
      - code: S1
        title: One
      - code: S2
        title: Two
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn seeds_template_and_criteria_into_empty_store() {
        let store = MemorySeedStore::new();
        let report = run_seed(&store, &template_a(), &mut Silent).await.unwrap();

        let templates = store.templates().await;
        let criteria = store.criteria().await;
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "Template A");
        assert_eq!(criteria.len(), 2);
        assert!(criteria.iter().all(|c| c.template_id == templates[0].id));
        assert_eq!(criteria[0].title, "Clarity");
        assert_eq!(criteria[0].display_order, 1);
        assert_eq!(criteria[1].title, "Evidence");
        assert_eq!(criteria[1].display_order, 2);

        assert_eq!(report.templates_created(), 1);
        assert_eq!(report.criteria_inserted(), 2);
        assert!(!report.is_noop());
    }

    #[tokio::test]
    async fn second_run_is_noop() {
        let store = MemorySeedStore::new();
        let catalog = template_a();

        run_seed(&store, &catalog, &mut Silent).await.unwrap();
        let second = run_seed(&store, &catalog, &mut Silent).await.unwrap();

        assert!(second.is_noop());
        assert_eq!(second.templates_reused(), 1);
        assert_eq!(second.criteria_skipped(), 2);
        assert_eq!(store.templates().await.len(), 1);
        assert_eq!(store.criteria().await.len(), 2);
    }

    #[tokio::test]
    async fn bundled_catalog_is_idempotent() {
        let store = MemorySeedStore::new();
        let catalog = Catalog::bundled().unwrap();

        let first = run_seed(&store, &catalog, &mut Silent).await.unwrap();
        let after_first = store.counts_now().await;
        run_seed(&store, &catalog, &mut Silent).await.unwrap();

        assert_eq!(first.criteria_inserted(), 72);
        assert_eq!(after_first.templates, 4);
        assert_eq!(after_first.criteria, 72);
        assert_eq!(store.counts_now().await, after_first);
    }

    #[tokio::test]
    async fn criteria_reference_catalog_templates() {
        let store = MemorySeedStore::new();
        let catalog = Catalog::bundled().unwrap();
        run_seed(&store, &catalog, &mut Silent).await.unwrap();

        let templates = store.templates().await;
        for criterion in store.criteria().await {
            let owner = templates
                .iter()
                .find(|t| t.id == criterion.template_id)
                .expect("criterion references a stored template");
            let def = catalog.template(&owner.code).expect("owner is in catalog");
            assert!(def.criteria.iter().any(|c| c.code == criterion.criterion_code));
        }
    }

    #[tokio::test]
    async fn reuses_preexisting_template_and_fills_missing_criteria() {
        let store = MemorySeedStore::new();
        let existing = store.insert_template_row("template_a", "Template A").await;
        store
            .insert_criterion_row(existing, "CLARITY", "Clarity")
            .await;

        let report = run_seed(&store, &template_a(), &mut Silent).await.unwrap();

        assert_eq!(report.templates[0].template_id, existing);
        assert!(!report.templates[0].template_created);
        assert_eq!(report.templates[0].criteria_inserted, 1);
        assert_eq!(report.templates[0].criteria_skipped, 1);
        assert_eq!(store.criteria().await.len(), 2);
    }

    #[tokio::test]
    async fn template_name_taken_under_other_code_is_reused() {
        let store = MemorySeedStore::new();
        let legacy = store.insert_template_row("legacy_a", "Template A").await;

        let first = run_seed(&store, &template_a(), &mut Silent).await.unwrap();
        let second = run_seed(&store, &template_a(), &mut Silent).await.unwrap();

        assert_eq!(first.templates[0].template_id, legacy);
        assert!(!first.templates[0].template_created);
        assert_eq!(first.criteria_inserted(), 2);
        assert!(second.is_noop());

        let templates = store.templates().await;
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].code, "legacy_a");
        assert!(store.criteria().await.iter().all(|c| c.template_id == legacy));
    }

    #[tokio::test]
    async fn does_not_delete_undeclared_rows() {
        let store = MemorySeedStore::new();
        let stale = store.insert_template_row("retired", "Retired").await;
        store.insert_criterion_row(stale, "OLD-1", "Old").await;

        run_seed(&store, &template_a(), &mut Silent).await.unwrap();

        assert_eq!(store.templates().await.len(), 2);
        assert_eq!(store.criteria().await.len(), 3);
    }

    #[tokio::test]
    async fn failed_batch_rolls_back_and_reports_context() {
        let store = MemorySeedStore::new();
        store
            .inject(Fault::FailCriterionInsert {
                criterion_code: "S2".into(),
            })
            .await;

        let err = run_seed(&store, &two_templates(), &mut Silent)
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().starts_with("second/S2: "), "{err}");

        // First batch committed, second rolled back entirely.
        let templates = store.templates().await;
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].code, "first");
        assert_eq!(store.criteria().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_criterion_insert_is_skipped() {
        let store = MemorySeedStore::new();
        store
            .inject(Fault::DuplicateOnCriterionInsert {
                criterion_code: "EVIDENCE".into(),
            })
            .await;

        let report = run_seed(&store, &template_a(), &mut Silent).await.unwrap();

        assert_eq!(report.criteria_inserted(), 1);
        assert_eq!(report.criteria_skipped(), 1);
        assert_eq!(store.criteria().await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_template_insert_is_reused() {
        let store = MemorySeedStore::new();
        store
            .inject(Fault::ConflictOnTemplateInsert {
                code: "template_a".into(),
            })
            .await;

        let report = run_seed(&store, &template_a(), &mut Silent).await.unwrap();

        assert!(!report.templates[0].template_created);
        assert_eq!(report.criteria_inserted(), 2);
        assert_eq!(store.templates().await.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_store_is_connection_error() {
        let store = MemorySeedStore::new();
        store.inject(Fault::Unreachable).await;

        let err = run_seed(&store, &template_a(), &mut Silent)
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Connection(_)));
        assert_eq!(store.counts_now().await.templates, 0);
    }

    #[tokio::test]
    async fn invalid_catalog_is_rejected_before_any_batch() {
        let store = MemorySeedStore::new();
        let mut catalog = template_a();
        catalog.templates[0].criteria[1].code = "CLARITY".into();

        let err = run_seed(&store, &catalog, &mut Silent).await.unwrap_err();
        assert!(matches!(err, SeedError::InvalidCatalog(_)));
        assert_eq!(store.batches_opened().await, 0);
    }

    #[tokio::test]
    async fn observer_sees_events_in_order() {
        let store = MemorySeedStore::new();
        let mut seen = Vec::new();
        let mut observer = |event: &SeedEvent<'_>| {
            seen.push(match event {
                SeedEvent::TemplateStarted { template } => format!("start {}", template.code),
                SeedEvent::TemplateResolved { code, created, .. } => {
                    format!("resolved {code} created={created}")
                }
                SeedEvent::TemplateCommitted { report } => {
                    format!("committed {} +{}", report.code, report.criteria_inserted)
                }
            });
        };

        run_seed(&store, &template_a(), &mut observer).await.unwrap();

        assert_eq!(
            seen,
            vec![
                "start template_a",
                "resolved template_a created=true",
                "committed template_a +2",
            ]
        );
    }

    #[test]
    fn plan_lists_templates_in_order() {
        let catalog = two_templates();
        let planned = plan(&catalog);
        assert_eq!(
            planned,
            vec![
                PlannedTemplate {
                    code: "first",
                    name: "First",
                    criteria: 1
                },
                PlannedTemplate {
                    code: "second",
                    name: "Second",
                    criteria: 2
                },
            ]
        );
    }

    #[test]
    fn report_display() {
        let report = SeedReport {
            templates: vec![
                TemplateReport {
                    code: "a".into(),
                    name: "A".into(),
                    template_id: TemplateId(1),
                    template_created: true,
                    criteria_inserted: 3,
                    criteria_skipped: 0,
                },
                TemplateReport {
                    code: "b".into(),
                    name: "B".into(),
                    template_id: TemplateId(2),
                    template_created: false,
                    criteria_inserted: 0,
                    criteria_skipped: 4,
                },
            ],
        };
        assert_eq!(
            report.to_string(),
            "Templates: 1 created, 1 reused | Criteria: 3 inserted, 4 skipped"
        );
    }
}
