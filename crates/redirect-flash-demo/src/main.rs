mod pages;
mod session_layer;

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use redirect_flash::{Config, Redirector};
use session_layer::SessionRegistry;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub redirector: Redirector,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config_path =
        std::env::var("REDIRECT_CONFIG").unwrap_or_else(|_| "redirect.toml".to_string());
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {:#}, using defaults", e);
        Config::default()
    });

    let state = AppState {
        redirector: Redirector::new(&config).context("Invalid redirect settings")?,
    };
    let sessions = SessionRegistry::new(config.flash.clone());

    let app = Router::new()
        .route("/", get(pages::home))
        .route("/contact", get(pages::show_contact).post(pages::store_contact))
        .route("/thanks", get(pages::thanks))
        .layer(middleware::from_fn_with_state(
            sessions,
            session_layer::start_session,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
