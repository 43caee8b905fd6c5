//! Scheduled job: generate the current month's ledger and log a summary.

use dotenvy::dotenv;
use std::sync::Arc;
use studio_ledger::{
    config,
    core::{automation, clock::SystemClock, report},
    errors::Result,
    ledger::Ledger,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load billing settings
    let app_config = config::billing::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the tables exist
    let db = config::database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    config::database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Generate the current month
    let ledger = Ledger::new(db, app_config.billing, Arc::new(SystemClock));
    let month_ref = ledger.current_month()?;
    match ledger
        .ensure_month_generated(month_ref)
        .await
        .inspect_err(|e| error!("Ledger generation failed for {}: {}", month_ref, e))?
    {
        Some(generated) => info!("{}", automation::format_generation_summary(&generated)),
        None => info!("Ledger for {} was already generated", month_ref),
    }

    // 6. Report where the month stands
    let summary =
        report::generate_month_summary(ledger.database(), month_ref, ledger.today()).await?;
    info!("{}", report::format_month_summary(&summary));

    Ok(())
}
