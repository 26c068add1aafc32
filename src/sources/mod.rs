//! # Sources
//!
//! Turns user queries into playable [`Track`]s.
//!
//! The playback core never talks to YouTube or SoundCloud itself: it only sees the
//! [`Resolver`] trait. [`youtube::YtDlpResolver`] is the production implementation,
//! backed by yt-dlp and (optionally) the YouTube Data API v3 for searches.

pub mod youtube;
pub mod youtube_api_v3;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use youtube::YtDlpResolver;

/// Where a track was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    YouTube,
    SoundCloud,
    /// Plain text query resolved through a YouTube search.
    Search,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::YouTube => "youtube",
            SourceType::SoundCloud => "soundcloud",
            SourceType::Search => "search",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved, playable item.
///
/// Tracks are immutable once the resolver hands them out; the queue and the
/// "now playing" slot only ever move or clone them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    url: String,
    stream_url: String,
    duration_secs: u64,
    source: SourceType,
    thumbnail: String,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        stream_url: impl Into<String>,
        source: SourceType,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            stream_url: stream_url.into(),
            duration_secs: 0,
            source,
            thumbnail: String::new(),
        }
    }

    pub fn with_duration(mut self, duration_secs: u64) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = thumbnail.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Canonical page URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Direct audio URL fed to the transport.
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn source(&self) -> SourceType {
        self.source
    }

    /// Empty when the source had no artwork.
    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }
}

/// One entry of a search listing. Not playable until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub duration: u64,
    pub thumbnail: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The query is a URL for a platform we do not handle.
    #[error("{0}")]
    Unsupported(String),

    #[error("No results found for: {0}")]
    NoResults(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Failed to run extractor: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ResolveError {
    /// Whether the failure is caused by the query itself rather than by the backend.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ResolveError::Unsupported(_) | ResolveError::NoResults(_))
    }
}

/// Resolves URLs and search strings into tracks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves a YouTube/SoundCloud URL or a plain search string.
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError>;

    /// Lists up to `limit` candidates for a free-text query.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ResolveError>;
}
