use std::io::{self, Write};
use std::process::ExitCode;

use dbcheck::config::Settings;
use dbcheck::error::{AppError, Result};
use dbcheck::postgres::PostgresPool;
use dbcheck::telemetry::{init_tracing, LogFormat};
use dbcheck::verify::{write_failure, write_success, Verifier, VerifyError};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    init_tracing(LogFormat::from_env());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, category = %e.category(), "Database check failed");
            let mut stderr = io::stderr().lock();
            if let Err(write_err) = write_failure(&mut stderr, &e) {
                tracing::error!(error = %write_err, "Failed to print diagnostics");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;
    tracing::debug!(run_mode = %settings.run_mode, "Configuration loaded");

    let pool = PostgresPool::initialize(&settings.database, settings.run_mode)?;

    let mut stdout = io::stdout().lock();
    let verifier = Verifier::new(&pool, &settings.verify);
    let outcome = verifier.run(&mut stdout).await;

    pool.close().await;

    let report = outcome?;
    if !report.passed(settings.verify.strict) {
        return Err(AppError::MissingTables(report.missing_tables));
    }

    write_success(&mut stdout, &report).map_err(VerifyError::from)?;
    stdout.flush().map_err(VerifyError::from)?;

    tracing::info!(
        tables = report.found_tables.len(),
        write_confirmed = report.write_check.confirmed(),
        "Database check passed"
    );
    Ok(())
}
