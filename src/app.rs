//! One seed run: configuration, catalog, connection, loader, summary.

use colored::Colorize;
use serde_json::json;
use tracing::{debug, info};

use assessment_seed_core::{
    plan, run_seed, Catalog, CatalogWarning, SeedError, SeedEvent, SeedReport, SeedStore,
    StoreCounts,
};
use assessment_seed_postgres::{ensure_schema, DatabaseConfig, PgSeedStore};

use crate::cli::{OutputFormat, SeedArgs};

/// What a successful run did.
#[derive(Debug)]
pub enum RunOutcome {
    DryRun,
    Seeded {
        report: SeedReport,
        counts: StoreCounts,
    },
}

/// Run the seed routine described by `args`.
///
/// Configuration and catalog problems are reported before any connection
/// is attempted. Once opened, the pool is closed on every exit path.
pub async fn run(args: &SeedArgs) -> Result<RunOutcome, SeedError> {
    dotenvy::dotenv().ok();

    let db_config = if args.dry_run {
        None
    } else {
        Some(DatabaseConfig::from_env()?)
    };

    let catalog = match &args.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::bundled()?,
    };
    catalog.validate()?;

    let out = Output::new(args.format, args.quiet);
    let warnings = catalog.warnings();
    for warning in &warnings {
        out.warning(warning);
    }

    let Some(db_config) = db_config else {
        out.plan(&catalog, &warnings);
        return Ok(RunOutcome::DryRun);
    };

    out.line("🌱 Starting assessment criteria seeding...\n");
    let store = PgSeedStore::connect(&db_config).await?;
    let result = seed(&store, &catalog, args.ensure_schema, &out).await;
    store.close().await;

    let (report, counts) = result?;
    info!(target: "seed.app", "{report}");
    out.summary(&catalog, &report, counts, &warnings);
    Ok(RunOutcome::Seeded { report, counts })
}

async fn seed(
    store: &PgSeedStore,
    catalog: &Catalog,
    create_schema: bool,
    out: &Output,
) -> Result<(SeedReport, StoreCounts), SeedError> {
    if create_schema {
        ensure_schema(store.pool()).await?;
        out.line(format!("{} Assessment tables ready\n", "✅".green()));
    }

    let mut observer = |event: &SeedEvent<'_>| out.event(event);
    let report = run_seed(store, catalog, &mut observer).await?;
    let counts = store.counts().await?;
    Ok((report, counts))
}

/// Print a failure the way the chosen format expects.
pub fn report_error(err: &SeedError, format: OutputFormat) {
    debug!(target: "seed.app", exit_code = err.exit_code(), "{err}");
    match format {
        OutputFormat::Json => {
            let violations: Vec<String> = match err {
                SeedError::InvalidCatalog(v) => v.iter().map(ToString::to_string).collect(),
                _ => Vec::new(),
            };
            println!(
                "{}",
                json!({
                    "error": err.to_string(),
                    "exit_code": err.exit_code(),
                    "violations": violations,
                })
            );
        }
        OutputFormat::Pretty => {
            eprintln!("{} Error seeding criteria: {err}", "❌".red().bold());
            if let SeedError::InvalidCatalog(violations) = err {
                for violation in violations {
                    eprintln!("   - {violation}");
                }
            }
        }
    }
}

struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    fn pretty(&self) -> bool {
        self.format == OutputFormat::Pretty
    }

    fn line(&self, text: impl std::fmt::Display) {
        if self.pretty() && !self.quiet {
            println!("{text}");
        }
    }

    fn warning(&self, warning: &CatalogWarning) {
        if self.pretty() {
            eprintln!("{}  {warning}", "⚠️".yellow());
        }
    }

    fn event(&self, event: &SeedEvent<'_>) {
        match event {
            SeedEvent::TemplateStarted { template } => self.line(format!(
                "📝 Seeding {} ({} criteria)...",
                template.name,
                template.criteria.len()
            )),
            SeedEvent::TemplateResolved { .. } => {}
            SeedEvent::TemplateCommitted { report } => {
                let template = if report.template_created {
                    "created"
                } else {
                    "found"
                };
                self.line(format!(
                    "{} {} seeded (template {template} as id {}, {} inserted, {} already present)\n",
                    "✅".green(),
                    report.name,
                    report.template_id,
                    report.criteria_inserted,
                    report.criteria_skipped,
                ));
            }
        }
    }

    fn plan(&self, catalog: &Catalog, warnings: &[CatalogWarning]) {
        let planned = plan(catalog);
        match self.format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "dry_run": true,
                    "templates": planned,
                    "criteria": catalog.criteria_count(),
                    "warnings": warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
                })
            ),
            OutputFormat::Pretty => {
                println!(
                    "🔍 Dry run: {} templates, {} criteria (no database changes)",
                    planned.len(),
                    catalog.criteria_count()
                );
                for template in planned {
                    println!(
                        "   - {} {} ({} criteria)",
                        template.code, template.name, template.criteria
                    );
                }
            }
        }
    }

    fn summary(
        &self,
        catalog: &Catalog,
        report: &SeedReport,
        counts: StoreCounts,
        warnings: &[CatalogWarning],
    ) {
        match self.format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "dry_run": false,
                    "report": report,
                    "counts": counts,
                    "warnings": warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
                })
            ),
            OutputFormat::Pretty => {
                println!("🎉 Seeding complete!");
                println!("📊 Total criteria in database: {}", counts.criteria);
                println!("   {report}");
                for template in &catalog.templates {
                    let missing = template
                        .expected_criteria
                        .map(|expected| expected.saturating_sub(template.criteria.len()))
                        .unwrap_or(0);
                    if missing > 0 {
                        println!(
                            "   - {}: {} (need to add {missing} more)",
                            template.name,
                            template.criteria.len()
                        );
                    } else {
                        println!("   - {}: {}", template.name, template.criteria.len());
                    }
                }
            }
        }
    }
}
