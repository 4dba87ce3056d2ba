mod cli;
mod config;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use sq_client::HttpExecutionClient;
use sq_core::window::CalendarResolver;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();
    let mut cfg = config::load_config(&args.config_path)
        .with_context(|| format!("failed to load config {}", args.config_path.display()))?;
    if let Some(path) = &args.query_path {
        cfg.query = config::load_query(path)
            .with_context(|| format!("failed to load query {}", path.display()))?;
    }

    let client = HttpExecutionClient::new(cfg.client.clone())
        .context("failed to build execution client")?;
    info!(url = %cfg.client.url, "connecting to event query service");

    let (outcome, spans) = sq_runner::run_traced(
        Arc::new(client),
        &cfg.query,
        cfg.executor.clone(),
        Arc::new(CalendarResolver::system()),
    )
    .await
    .context("decomposition run failed")?;

    for span in &spans {
        debug!(
            run_id = %span.run_id,
            depth = span.depth,
            attempt = span.attempt,
            status = ?span.status,
            rows = span.rows,
            duration_ms = span.duration_ms(),
            "attempt"
        );
    }

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for row in &outcome.rows {
        serde_json::to_writer(&mut out, row).context("failed to encode row")?;
        out.write_all(b"\n").context("failed to write row")?;
    }
    out.flush().context("failed to flush output")?;

    if !outcome.complete {
        eprintln!(
            "warning: result is incomplete ({} rows); raise max_depth or narrow the query",
            outcome.rows.len()
        );
    }
    Ok(())
}
