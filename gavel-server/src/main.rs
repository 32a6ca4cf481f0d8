use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::HeaderValue;
use clap::Parser;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

mod api;
mod auth;

use api::AppState;
use auth::jwt::JwtKeys;
use gavel_core::caselaw::CaseStore;
use gavel_core::caselaw::sqlite::SqliteCaseStore;
use gavel_core::config::Config;
use gavel_core::embedding::Embedder;
use gavel_core::embedding::local::LocalEmbedder;
use gavel_core::query::QueryEngine;
use gavel_core::users::UserStore;

#[derive(Parser)]
#[command(name = "gavel-server")]
struct Cli {
    /// Path to the configuration file
    #[arg(long = "config", default_value = "gavel.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let secret = config.auth.resolve_secret().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let jwt = JwtKeys::new(&secret, config.auth.token_expiry_minutes).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    // One model instance for the whole process; handlers share it.
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }));
    let model_name = embedder.model_name().to_string();

    let cases: Arc<dyn CaseStore> = Arc::new(
        SqliteCaseStore::open(
            Path::new(&config.storage.cases),
            embedder.model_name(),
            embedder.dimensions(),
        )
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }),
    );

    let users = UserStore::open(Path::new(&config.storage.accounts)).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let case_count = cases.info().map(|info| info.case_count).unwrap_or(0);
    if case_count == 0 {
        eprintln!(
            "warning: case corpus '{}' is empty; every query will get the no-precedent answer",
            config.storage.cases
        );
    }

    let engine = QueryEngine::new(
        Arc::clone(&embedder),
        Arc::clone(&cases),
        config.retrieval.top_k,
    );

    let state = Arc::new(AppState {
        embedder,
        engine,
        users,
        jwt,
        initial_points: config.accounts.initial_points,
    });

    let mut app = api::router(state);
    if !config.cors.allowed_origins.is_empty() {
        let origins: Vec<HeaderValue> = config
            .cors
            .allowed_origins
            .iter()
            .map(|origin| {
                origin.parse().unwrap_or_else(|e| {
                    eprintln!("Error: invalid cors origin '{origin}': {e}");
                    std::process::exit(1);
                })
            })
            .collect();
        app = app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to bind to {addr}: {e}");
            std::process::exit(1);
        });

    println!("gavel server started");
    println!("  address:  http://{addr}");
    println!("  model:    {model_name}");
    println!("  top_k:    {}", config.retrieval.top_k);
    println!("  accounts: {}", config.storage.accounts);
    println!("  corpus:   {} ({case_count} cases)", config.storage.cases);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    println!("\nShutting down...");
}
