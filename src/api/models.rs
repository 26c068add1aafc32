use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;

use crate::{
    audio::player::PlaybackError,
    sources::{ResolveError, SearchResult, SourceType, Track},
};

/// `?guild_id=` on every player route. Kept as a string so bad input gets our own message.
#[derive(Debug, Deserialize)]
pub struct GuildQuery {
    pub guild_id: Option<String>,
}

impl GuildQuery {
    pub fn guild_id(&self) -> Result<GuildId, ApiError> {
        let raw = self
            .guild_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("guild_id query parameter is required"))?;

        let id: u64 = raw
            .parse()
            .map_err(|_| ApiError::bad_request("guild_id must be an integer"))?;

        if id == 0 {
            return Err(ApiError::bad_request("guild_id must not be zero"));
        }

        Ok(GuildId::new(id))
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

/// Body of `POST /api/queue/add`.
#[derive(Debug, Default, Deserialize)]
pub struct AddTrackRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Track as exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackView {
    pub title: String,
    pub url: String,
    /// Seconds, 0 when unknown.
    pub duration: u64,
    pub source: SourceType,
    pub thumbnail: String,
}

impl From<&Track> for TrackView {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title().to_string(),
            url: track.url().to_string(),
            duration: track.duration_secs(),
            source: track.source(),
            thumbnail: track.thumbnail().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub current: Option<TrackView>,
    pub tracks: Vec<TrackView>,
}

#[derive(Debug, Serialize)]
pub struct AddTrackResponse {
    pub added: bool,
    pub started: bool,
    pub track: TrackView,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    pub skipped: bool,
    pub current: Option<TrackView>,
}

#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    pub state: &'static str,
    pub elapsed: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error returned by every handler, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PlaybackError> for ApiError {
    fn from(err: PlaybackError) -> Self {
        let status = if err.is_user_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        let status = if err.is_user_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}
