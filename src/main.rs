use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use log::info;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use dineserver::api_router::configure_api_routes;
use dineserver::config::AppConfig;
use dineserver::llm::OpenAiClient;
use dineserver::shared::state::AppState;
use dineserver::shared::utils::create_conn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database_url)?;

    let llm_provider = Arc::new(OpenAiClient::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
    ));

    let app_state = Arc::new(AppState {
        conn: pool,
        config: config.clone(),
        llm_provider,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", configure_api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
