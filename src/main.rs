use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use wagepipe::{fetch::KaggleCli, load::SqliteSink, pipeline, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) config & output ──────────────────────────────────────────
    let config = Config::load()?;
    let db_path = config.database_path();
    let mut sink = SqliteSink::deferred(&db_path);
    info!(data_dir = %config.data_dir.display(), db = %db_path.display(), "configured");

    // ─── 3) run ──────────────────────────────────────────────────────
    match pipeline::run(&config, KaggleCli::default(), &mut sink).await {
        Ok(table) => {
            info!(rows = table.num_rows(), "done");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "pipeline failed");
            std::process::exit(1);
        }
    }
}
