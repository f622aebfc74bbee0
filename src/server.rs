use crate::config::Config;
use crate::error::ShortenerError;
use crate::handlers::{health_check, resolve_url, shorten_url, url_count, AppState, SharedState};
use crate::middleware::logging_middleware;
use crate::store::Namespaces;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the HTTP router over the given state.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        // Shortening
        .route("/api/v1/", post(shorten_url))
        .route("/api/v1", post(shorten_url))
        // Usage and health
        .route("/count/", get(url_count))
        .route("/count", get(url_count))
        .route("/health", get(health_check))
        // Everything else is a short identifier
        .route("/:id", get(resolve_url))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    logging_middleware,
                )),
        )
        .with_state(state)
}

pub struct Server {
    app: Router,
    addr: SocketAddr,
}

impl Server {
    /// Connect the stores and assemble the application.
    pub async fn new(config: Config) -> Result<Self, ShortenerError> {
        let addr = config.bind_addr()?;

        let namespaces = if config.in_memory {
            tracing::warn!("Using the in-memory store; state is lost on restart");
            Namespaces::in_memory()
        } else {
            Namespaces::connect(&config).await.map_err(ShortenerError::from)?
        };

        let state = Arc::new(AppState::new(config, namespaces));

        Ok(Self {
            app: create_app(state),
            addr,
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        tracing::info!("Shortener listening on {}", self.addr);
        tracing::info!("Health check available at /health");

        // Run server with graceful shutdown
        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
