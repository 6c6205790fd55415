//! Documentation of a live single-question poll.
//!
//! Participants log in with a display name, cast exactly one vote among `A`, `B` and `C`, and
//! watch the tally move in real time.
//!
//!
//!
//! # Components
//! - [`identity`]: turns a display name into a signed bearer credential
//! - [`tally`]: owns the counts and the set of credentials that already voted
//! - [`admission`]: the only writer, checks identity, then voted state, then option
//! - [`hub`]: pushes every committed tally to live observers
//! - [`query`]: plain read path for clients that poll
//!
//!
//!
//! # Endpoints
//!
//! ## `POST /login`
//! - Body `{ "name": "alice" }`
//! - `200 { message, credential, token, user }`, `token` mirrors `credential`
//! - `400` when the name is missing or blank
//!
//! ## `POST /vote`
//! - Header `Authorization: Bearer <credential>`, body `{ "option": "A" }`
//! - `200 { message, votes }`
//! - `401` no credential, `403` bad or expired credential, `403` already voted
//! - `400` unknown option or malformed body
//!
//! ## `GET /results`
//! - `200 { votes }`
//! - Open unless `POLL_RESULTS_REQUIRE_AUTH=true`
//!
//! ## `GET /ws`
//! - WebSocket, emits `{ "event": "voteUpdate", "votes": {..} }` on connect and per vote
//!
//! ## `GET /health`
//! - `200 { status, observers, votes }`
//!
//!
//!
//! # Notes
//!
//! ## Identity
//! Names are declared, not verified. Two logins as "alice" are two voting slots. The credential
//! carries its own id and expiry, so nothing about a login is kept on the server until it votes.
//!
//! ## Polling
//! Clients that cannot hold a socket can hit `GET /results` every 5 seconds. This is a degraded
//! mode, the socket is the source of live updates.
//!
//! ## Restarts
//! Everything is in memory. A restart clears the poll and, unless `POLL_TOKEN_SECRET` is set,
//! invalidates every credential.
//!
//!
//!
//! # Setup
//!
//! Run.
//! ```sh
//! RUST_LOG=info cargo run --bin poll-server
//! ```
//!
//! Swarm a running server.
//! ```sh
//! cargo run --bin tester -- swarm --voters 100 --option C
//! ```
//!
//! Generate docs in `target/doc/poll/index.html`.
//! ```sh
//! cargo doc
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod admission;
pub mod config;
pub mod error;
pub mod hub;
pub mod identity;
pub mod query;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod tally;

use config::Config;
use routes::{health_handler, login_handler, results_handler, vote_handler, ws_handler};
use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load().context("Environment misconfigured")?;

    info!("Initializing state...");
    let state = State::new(config);

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.frontend_url.clone())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/login", post(login_handler))
        .route("/vote", post(vote_handler))
        .route("/results", get(results_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
