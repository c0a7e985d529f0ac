//! Documentation of the TVT registration and payment-proof backend.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks JSON to this server only
//! - Server keeps no records in memory, everything lives in Redis
//! - One Redis connection manager per process, created before the listener binds
//! - Process refuses to start without `REDIS_URL`
//!
//!
//!
//! # Endpoints
//!
//! | Route                 | Body                                                                 | Response                      |
//! |-----------------------|----------------------------------------------------------------------|-------------------------------|
//! | `POST /register`      | `name`, `phone`                                                      | `{ success, user }`           |
//! | `GET /users`          |                                                                      | users, newest first           |
//! | `POST /payment-proof` | `name`, `phone`, `planTitle`, `amount`, `screenshotBase64`, `issueType?` | `{ success, payment }`    |
//! | `GET /payments`       |                                                                      | payments, newest first        |
//! | `GET /healthz`        |                                                                      | `{ status }`                  |
//!
//! Errors are always `{ "error": "<message>" }`, 400 for bad input and 500 for store failures.
//!
//!
//!
//! # Notes
//!
//! ## Payload size
//! Payment proofs embed the screenshot as base64 text, so JSON bodies are accepted up to 15 MB.
//!
//! ## Amount
//! `amount` is only checked for presence. `0` is a real amount (free plans, full
//! discounts) and must not be treated as missing.
//!
//!
//!
//! # Setup
//!
//! Environment.
//! ```sh
//! export REDIS_URL=redis://localhost:6379
//! export PORT=5000        # optional
//! export DB_NAME=tvt_db   # optional, key namespace
//! export RUST_LOG=info    # optional
//! ```
//!
//! Run.
//! ```sh
//! cargo run --bin tvt
//! ```
//!
//!
//!
//! # Checks
//!
//! The default test run uses an in-memory store. The Redis transactions (atomic upsert,
//! listing order) are only exercised by the `#[ignore]`d tests in `tests/redis_store.rs`,
//! so any change to `database.rs` must also pass them against a live instance.
//! ```sh
//! just check
//! ```
//!
//! Which is the same as.
//! ```sh
//! cargo test
//! REDIS_URL=redis://localhost:6379 cargo test -- --ignored
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
#[cfg(test)]
mod memory;
pub mod payment;
pub mod routes;
pub mod state;
pub mod user;
pub mod utils;

use config::Config;
use error::StartupError;
use routes::{
    health_handler, payment_proof_handler, payments_handler, register_handler, users_handler,
};
use state::State;

pub const MAX_BODY_BYTES: usize = 15 * 1024 * 1024;

pub async fn start_server() -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    run().await.inspect_err(|e| error!("{e}"))
}

async fn run() -> Result<(), StartupError> {
    info!("Loading config...");
    let config = Config::load()?;

    info!("Connecting to Redis...");
    let state = State::new(config).await?;
    info!("Redis connected");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/register", post(register_handler))
        .route("/users", get(users_handler))
        .route("/payment-proof", post(payment_proof_handler))
        .route("/payments", get(payments_handler))
        .route("/healthz", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
