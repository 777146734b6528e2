//! HTTP server setup and routing

use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::AppState;
use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;

/// Build the service router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/books/:book_id/chapters/:chapter_id/alignment",
            get(handlers::get_alignment)
                .put(handlers::put_alignment)
                .delete(handlers::remove_alignment),
        )
        .route(
            "/books/:book_id/chapters/:chapter_id/highlight",
            get(handlers::get_highlight),
        )
        .route(
            "/books/:book_id/chapters/:chapter_id/progress",
            get(handlers::get_chapter_progress).post(handlers::post_progress),
        )
        .route("/books/:book_id/progress", get(handlers::get_book_progress))
        .route("/books/:book_id/progress/latest", get(handlers::get_resume_point));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
///
/// Pending progress writes are flushed after the listener stops.
pub async fn run<F>(config: &Config, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let persisters = state.persisters.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    persisters.close_all().await;
    Ok(())
}
