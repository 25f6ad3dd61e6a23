use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use registrar::api::router;
use registrar::config::AppConfig;
use registrar::db;
use registrar::identity::{HttpIdentityProvider, IdentityConfig, IdentityProvider, StaticIdentityProvider};
use registrar::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "registrar=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config.database_url, config.max_connections).await?;
    db::MIGRATOR.run(&pool).await?;

    let identity: Arc<dyn IdentityProvider> = match &config.identity_url {
        Some(base_url) => {
            info!("resolving sessions through {}", base_url);
            Arc::new(HttpIdentityProvider::new(IdentityConfig {
                base_url: base_url.clone(),
            })?)
        }
        None => {
            warn!("IDENTITY_URL not set, using in-memory sessions");
            Arc::new(StaticIdentityProvider::new())
        }
    };

    info!(
        "current term {} semester {}",
        config.current_term.academic_year, config.current_term.semester
    );
    let state = AppState::new(pool, identity, config.current_term.clone());

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
