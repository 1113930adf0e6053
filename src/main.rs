use std::sync::Arc;

use short_news::config::Config;
use short_news::routes::{self, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "short_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("SHORT_NEWS_CONFIG").unwrap_or_else(|_| "short_news.toml".to_string());
    let config = Config::load_or_default(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    let state = Arc::new(AppState::from_config(&config)?);
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Server starting on http://{}", config.server.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
