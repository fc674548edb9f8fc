//! PokeClass
//!
//! Classroom points tracker that keeps every device of a session in sync
//! through one shared JSON document, plus a small reference store to host
//! those documents.

mod api;
mod classroom;
mod config;
mod console;
mod db;
mod errors;
mod models;
mod session;
mod sync;
mod transfer;

use std::sync::Arc;

use axum::{routing::get, Router};
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use classroom::Classroom;
use config::Config;
use db::{Preferences, Repository};
use session::{SessionManager, SessionSources};
use sync::{HttpGateway, SyncEngine, SyncSettings};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
}

#[derive(Parser, Debug)]
#[command(name = "pokeclass", version, about = "Classroom points with cross-device sync")]
struct Cli {
    /// Link the app was opened with; its `code` parameter selects the session
    #[arg(long)]
    link: Option<String>,

    /// Class to show first
    #[arg(long)]
    class: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reference document store
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging. The console owns stdout, so logs go to stderr.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Some(Command::Serve) => serve(config).await,
        None => run_console(config, cli.link, cli.class).await,
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting PokeClass document store");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    let pool = db::init_database(&config.db_path).await?;
    let state = AppState {
        repo: Arc::new(Repository::new(pool)),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_console(
    config: Config,
    link: Option<String>,
    class: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Document store: {}", config.store_url);

    // Local persistence is best effort; without it the classroom lives in memory.
    let prefs = match db::init_database(&config.db_path).await {
        Ok(pool) => Arc::new(Preferences::new(Repository::new(pool))),
        Err(e) => {
            tracing::warn!(
                "Could not open {:?}, nothing will be saved on this device: {}",
                config.db_path,
                e
            );
            Arc::new(Preferences::in_memory())
        }
    };

    let sources = SessionSources::new(
        link.as_deref(),
        &config.share_url,
        config.session_code.as_deref(),
    )?;

    let mut engine = SyncEngine::new(
        Arc::new(Classroom::new()),
        HttpGateway::new(&config.store_url),
        SessionManager::new(prefs.clone(), sources),
        prefs,
        SyncSettings::from_config(&config),
    );
    engine.start().await;

    let mut status = engine.subscribe_status();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            tracing::debug!("Sync status: {}", current.as_str());
        }
    });

    let class = match class {
        Some(class) => Some(class),
        None => engine.classroom().class_groups().await.into_iter().next(),
    };

    let result = console::run(&engine, class).await;
    engine.shutdown();
    status_task.abort();
    result?;

    Ok(())
}

/// Create the document store router.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let document_routes = Router::new().route(
        "/{key}",
        get(api::get_document)
            .put(api::put_document)
            .post(api::put_document),
    );

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(health_routes)
        .merge(document_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
