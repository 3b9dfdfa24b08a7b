use crate::config::{ConfigArgs, ServerConfig};
use crate::error::ServerError;

pub async fn run(args: ConfigArgs) -> Result<(), ServerError> {
    let config = ServerConfig::load(&args.config)?;
    let store = super::open_store(&config.storage)?;

    tracing::warn!(backend = %config.storage.backend, "destroying all queue data");
    store.destroy().await?;
    tracing::info!("destroy complete");
    Ok(())
}
