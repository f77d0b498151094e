//! Seed assessment templates and criteria
//!
//! Ensures every template in the bundled catalog exists, then inserts the
//! criteria that are not already present. Safe to run repeatedly.
//!
//! Usage:
//!   seed-assessment-criteria                  # seed the bundled catalog
//!   seed-assessment-criteria --dry-run        # validate and print the plan
//!   seed-assessment-criteria --ensure-schema  # create tables first
//!
//! Environment variables:
//!   DATABASE_URL                   - PostgreSQL connection string (required unless --dry-run)
//!   DATABASE_POOL_SIZE             - Pool size (default: 1)
//!   DATABASE_CONNECT_TIMEOUT_SECS  - Connect timeout (default: 10)
//!   SEED_CATALOG_PATH              - Catalog file overriding the bundled one
//!   RUST_LOG                       - Log filter (default: warn)
//!
//! Exit codes: 0 success, 1 configuration, 2 connection, 3 invalid catalog,
//! 4 unexpected store error.

use std::process::ExitCode;

use clap::Parser;

use assessment_seed::app;
use assessment_seed::cli::SeedArgs;
use assessment_seed::telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = SeedArgs::parse();
    telemetry::init();

    match app::run(&args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            app::report_error(&err, args.format);
            ExitCode::from(err.exit_code())
        }
    }
}
