pub mod handlers;
pub mod models;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{audio::player::PlaybackCoordinator, sources::Resolver};

/// Shared by every HTTP handler. Same coordinator the Discord commands drive.
pub struct ApiState {
    pub player: Arc<PlaybackCoordinator>,
    pub resolver: Arc<dyn Resolver>,
    /// Result count for `/api/search` when the request gives no `limit`.
    pub search_limit: usize,
}

/// HTTP control surface for queue and playback of any guild the bot is in.
///
/// Every player route takes the target guild as `?guild_id=`. Errors come back as
/// `{"error": "..."}`: 400 for bad input or invalid state, 502 when the resolver or the
/// voice transport failed.
pub fn router(state: Arc<ApiState>) -> Router {
    let api_routes = Router::new()
        .route("/queue", get(handlers::get_queue))
        .route("/queue/add", post(handlers::add_track))
        .route("/queue/skip", post(handlers::skip))
        .route("/queue/clear", post(handlers::clear_queue))
        .route("/playback", get(handlers::get_playback))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/resume", post(handlers::resume))
        .route("/playback/stop", post(handlers::stop))
        .route("/search", get(handlers::search));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the API on `addr` until `shutdown` is cancelled.
pub async fn serve(addr: &str, state: Arc<ApiState>, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 API HTTP escuchando en {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("🌐 API HTTP detenida");
    Ok(())
}
