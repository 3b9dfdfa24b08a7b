use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ConfigArgs, ServerConfig};
use crate::error::ServerError;

pub async fn run(args: ConfigArgs) -> Result<(), ServerError> {
    tracing::info!("queue-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    let store = super::open_store(&config.storage)?;
    for stats in collect_stats(&store).await? {
        tracing::info!(
            topic = %stats.topic,
            write_offset = stats.write_offset,
            read_cursor = stats.read_cursor,
            in_flight = stats.in_flight,
            "recovered topic"
        );
    }

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- API server (HTTP + WS) ---
    let api_store = store.clone();
    let api_port = config.api_port;
    let poll_interval = config.poll_interval();
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(async move {
        queue_api_server::run(api_port, api_store, poll_interval, api_token).await
    });

    tracing::info!(port = config.api_port, "api server (http+ws) listening");
    tracing::info!("server ready");

    // --- Ожидание Ctrl+C или падения API ---
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("shutting down...");
        }
        res = &mut api_handle => {
            let err = match res {
                Ok(Ok(())) => "api server stopped unexpectedly".to_string(),
                Ok(Err(e)) => e,
                Err(e) => format!("api task: {e}"),
            };
            return Err(ServerError::Api(err));
        }
    }

    token.cancel();

    // Drain: wait up to 5s for in-flight requests
    if tokio::time::timeout(Duration::from_secs(5), &mut api_handle).await.is_err() {
        tracing::warn!("api server did not stop in time, aborting");
        api_handle.abort();
    }

    store.flush().await?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn collect_stats(store: &queue_engine::Store) -> Result<Vec<queue_api::TopicStats>, ServerError> {
    let mut out = Vec::new();
    for topic in store.topics().await? {
        out.push(store.stats(&topic).await?);
    }
    Ok(out)
}
