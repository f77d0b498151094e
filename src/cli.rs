use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "seed-assessment-criteria")]
#[command(version)]
#[command(about = "Ensure assessment templates and their criteria exist in the database")]
#[command(long_about = None)]
pub struct SeedArgs {
    /// Catalog file to seed instead of the bundled one
    #[arg(long, env = "SEED_CATALOG_PATH")]
    pub catalog: Option<PathBuf>,

    /// Validate the catalog and print the plan without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Create the assessment tables if they do not exist
    #[arg(long)]
    pub ensure_schema: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "pretty", value_enum)]
    pub format: OutputFormat,

    /// Suppress per-template progress lines
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}
