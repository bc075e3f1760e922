use tracing_subscriber::EnvFilter;

use knowbest_server::api::{self, AppState};
use knowbest_server::config::ServerConfig;
use knowbest_server::store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("knowbest_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env();

    let store = Store::open(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "database ready");

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY unset; /api/ai/parse will report a configuration error");
    }

    let state = AppState::new(&config, store)?;
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
