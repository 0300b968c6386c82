//! Bridge binary: newline-delimited JSON requests on stdin, one JSON
//! response per line on stdout. Logs go to stderr.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use stockbook_desktop::{AppState, bridge, commands};
use stockbook_events::EventBus;
use stockbook_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    stockbook_observability::init(config.log_format);

    let state = AppState::open(&config).context("failed to open data store")?;

    // Subscribe before anything is published.
    let sub = state.bus().subscribe();
    tokio::task::spawn_blocking(move || {
        while let Ok(env) = sub.recv() {
            tracing::info!(
                event_type = env.event_type(),
                aggregate_type = env.aggregate_type(),
                aggregate_id = %env.aggregate_id(),
                version = env.aggregate_version(),
                "domain event"
            );
        }
    });

    let corrected = commands::reconcile_all(&state)
        .await
        .context("startup reconciliation failed")?;
    if corrected > 0 {
        tracing::warn!(corrected, "repaired customer balances from stored orders");
    }

    tracing::info!(
        restock_policy = ?config.restock_policy,
        data_file = ?config.data_file,
        "bridge ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = bridge::handle_line(&state, &line).await;
        let mut out = serde_json::to_vec(&response).context("failed to encode response")?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
