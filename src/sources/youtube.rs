use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{
    youtube_api_v3::YouTubeApiClient, ResolveError, Resolver, SearchResult, SourceType, Track,
};

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?(youtube\.com|youtu\.be)/").expect("valid youtube regex")
});
static SOUNDCLOUD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?soundcloud\.com/").expect("valid soundcloud regex")
});
static ANY_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("valid url regex"));

/// Subset of the `--dump-json` output we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    /// Direct media URL of the selected format.
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

/// Resolves queries by shelling out to yt-dlp.
///
/// Searches go through the YouTube Data API when a key is configured and fall back to
/// SoundCloud search through yt-dlp when it is not (or when the API call fails).
pub struct YtDlpResolver {
    binary: String,
    youtube_api: Option<YouTubeApiClient>,
    // Limitar invocaciones concurrentes de yt-dlp
    rate_limiter: Semaphore,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, youtube_api_key: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            youtube_api: youtube_api_key.map(YouTubeApiClient::new),
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Checks that the yt-dlp binary runs. Used by `--health-check`.
    pub async fn verify(&self) -> Result<String, ResolveError> {
        let version = self.run(&["--version"]).await?;
        Ok(version.trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> Result<String, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Extraction(e.to_string()))?;

        let output = Command::new(&self.binary).args(args).output().await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extraction(format!("yt-dlp error: {}", error.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn search_soundcloud(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ResolveError> {
        let target = format!("scsearch{limit}:{query}");
        let stdout = self
            .run(&[
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                &target,
            ])
            .await?;

        Ok(parse_search_results(&stdout))
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
        let (target, source) = classify(query)?;
        debug!("🔎 Resolving {} query: {}", source, query);

        let stdout = self
            .run(&[
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                &target,
            ])
            .await?;

        let info = first_entry(&stdout).ok_or_else(|| ResolveError::NoResults(query.to_string()))?;
        let track = info_to_track(info, query, source)?;

        info!("🎵 Resolved: {} ({}s)", track.title(), track.duration_secs());
        Ok(track)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ResolveError> {
        if let Some(api) = &self.youtube_api {
            match api.search(query, limit).await {
                Ok(results) => return Ok(results),
                Err(e) => warn!("YouTube API search failed, falling back to SoundCloud: {}", e),
            }
        }

        self.search_soundcloud(query, limit).await
    }
}

/// Maps a query to the yt-dlp target and the source it will be reported as.
fn classify(query: &str) -> Result<(String, SourceType), ResolveError> {
    if YOUTUBE_URL.is_match(query) {
        Ok((query.to_string(), SourceType::YouTube))
    } else if SOUNDCLOUD_URL.is_match(query) {
        Ok((query.to_string(), SourceType::SoundCloud))
    } else if ANY_URL.is_match(query) {
        Err(ResolveError::Unsupported(format!("Unsupported URL: {query}")))
    } else {
        Ok((format!("ytsearch1:{query}"), SourceType::Search))
    }
}

fn first_entry(stdout: &str) -> Option<YtDlpInfo> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
}

fn info_to_track(info: YtDlpInfo, query: &str, source: SourceType) -> Result<Track, ResolveError> {
    let stream_url = info
        .url
        .ok_or_else(|| ResolveError::Extraction(format!("no stream URL for {query}")))?;

    let mut track = Track::new(
        info.title,
        info.webpage_url.unwrap_or_else(|| query.to_string()),
        stream_url,
        source,
    )
    .with_duration(info.duration.map(|d| d.max(0.0) as u64).unwrap_or(0));

    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }

    Ok(track)
}

fn parse_search_results(stdout: &str) -> Vec<SearchResult> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
        .map(|info| SearchResult {
            title: info.title,
            url: info.webpage_url.unwrap_or_default(),
            duration: info.duration.map(|d| d.max(0.0) as u64).unwrap_or(0),
            thumbnail: info.thumbnail.unwrap_or_default(),
        })
        .collect()
}
