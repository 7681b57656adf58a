use tracing_subscriber::EnvFilter;

use crewplan_api::{config, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("crewplan_api=info,tower_http=info")),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting CrewPlan API in {:?} mode", config.environment);

    let state = AppState::from_config(config).await?;
    if config.database.run_migrations {
        state.db.migrate().await?;
        tracing::info!("Database migrations applied");
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("CrewPlan API listening on http://{}", bind_addr);

    axum::serve(listener, routes::app(state)).await?;
    Ok(())
}
