use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Json,
};
use std::{num::IntErrorKind, sync::Arc};
use tracing::{debug, info};

use super::{models::*, ApiState};

const MAX_SEARCH_LIMIT: usize = 25;

/// GET /api/queue?guild_id=...
pub async fn get_queue(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<QueueResponse>, ApiError> {
    let guild_id = params.guild_id()?;
    let snapshot = state.player.queue_snapshot(guild_id).await;

    Ok(Json(QueueResponse {
        current: snapshot.current.as_ref().map(TrackView::from),
        tracks: snapshot.items.iter().map(TrackView::from).collect(),
    }))
}

/// POST /api/queue/add?guild_id=... with `{"url": "..."}`
pub async fn add_track(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
    body: Result<Json<AddTrackRequest>, JsonRejection>,
) -> Result<Json<AddTrackResponse>, ApiError> {
    let guild_id = params.guild_id()?;

    let url = body
        .ok()
        .and_then(|Json(body)| body.url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::bad_request("url field is required"))?;

    debug!("API add in guild {}: {}", guild_id, url);
    let track = state.resolver.resolve(&url).await?;
    let outcome = state.player.enqueue_and_maybe_play(guild_id, track).await?;

    info!("🌐 Track added via API in guild {}: {}", guild_id, outcome.track.title());
    Ok(Json(AddTrackResponse {
        added: true,
        started: outcome.started,
        track: TrackView::from(&outcome.track),
    }))
}

/// POST /api/queue/skip?guild_id=...
pub async fn skip(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SkipResponse>, ApiError> {
    let guild_id = params.guild_id()?;
    let next = state.player.skip(guild_id).await?;

    Ok(Json(SkipResponse {
        skipped: true,
        current: next.as_ref().map(TrackView::from),
    }))
}

/// POST /api/queue/clear?guild_id=...
pub async fn clear_queue(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild_id = params.guild_id()?;
    state.player.clear_queue(guild_id).await;

    Ok(Json(serde_json::json!({ "cleared": true })))
}

/// GET /api/playback?guild_id=...
pub async fn get_playback(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let guild_id = params.guild_id()?;
    let playback_state = state.player.playback_state(guild_id).await;
    let elapsed = state.player.elapsed_seconds(guild_id).await;

    Ok(Json(PlaybackResponse {
        state: playback_state.as_str(),
        elapsed,
    }))
}

/// POST /api/playback/pause?guild_id=...
pub async fn pause(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild_id = params.guild_id()?;
    state.player.pause(guild_id).await?;

    Ok(Json(serde_json::json!({ "paused": true })))
}

/// POST /api/playback/resume?guild_id=...
pub async fn resume(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild_id = params.guild_id()?;
    state.player.resume(guild_id).await?;

    Ok(Json(serde_json::json!({ "resumed": true })))
}

/// POST /api/playback/stop?guild_id=...
pub async fn stop(
    Query(params): Query<GuildQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild_id = params.guild_id()?;
    state.player.stop_and_leave(guild_id).await?;

    Ok(Json(serde_json::json!({ "stopped": true })))
}

/// Parses `limit` and clamps it to 1..=25. Out-of-range integers saturate.
fn parse_search_limit(raw: &str) -> Result<usize, ApiError> {
    let limit = match raw.trim().parse::<i64>() {
        Ok(limit) => limit,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
        Err(e) if *e.kind() == IntErrorKind::NegOverflow => i64::MIN,
        Err(_) => return Err(ApiError::bad_request("limit must be an integer")),
    };

    Ok(limit.clamp(1, MAX_SEARCH_LIMIT as i64) as usize)
}

/// GET /api/search?q=...&limit=...
pub async fn search(
    Query(params): Query<SearchQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("q query parameter is required"))?;

    let limit = match params.limit.as_deref() {
        None => state.search_limit,
        Some(raw) => parse_search_limit(raw)?,
    };

    let results = state.resolver.search(query, limit).await?;
    Ok(Json(SearchResponse { results }))
}
