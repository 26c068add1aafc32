use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{ResolveError, SearchResult};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

/// Minimal YouTube Data API v3 client used for search listings.
pub struct YouTubeApiClient {
    api_key: String,
    client: reqwest::Client,
}

impl YouTubeApiClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { api_key, client }
    }

    /// Runs a video search, then fetches durations for the hits in one `videos` call.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ResolveError> {
        debug!("🔍 YouTube API v3 search: {}", query);

        let response = self
            .client
            .get(format!("{API_BASE}/search"))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", &limit.to_string()),
                ("key", &self.api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("❌ YouTube API error: {} - {}", status, body);
            return Err(ResolveError::Extraction(format!("YouTube API error: {status}")));
        }

        let listing: SearchResponse = response.json().await?;
        let hits: Vec<(String, Snippet)> = listing
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id.map(|id| (id, item.snippet)))
            .collect();

        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids = hits.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>().join(",");
        let details: VideosResponse = self
            .client
            .get(format!("{API_BASE}/videos"))
            .query(&[("part", "contentDetails"), ("id", &ids), ("key", &self.api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .map(|(id, snippet)| {
                let duration = details
                    .items
                    .iter()
                    .find(|video| video.id == id)
                    .map(|video| parse_duration(&video.content_details.duration))
                    .unwrap_or(0);
                let thumbnail = snippet
                    .thumbnails
                    .high
                    .or(snippet.thumbnails.medium)
                    .or(snippet.thumbnails.default)
                    .map(|t| t.url)
                    .unwrap_or_default();

                SearchResult {
                    title: snippet.title,
                    url: format!("https://www.youtube.com/watch?v={id}"),
                    duration,
                    thumbnail,
                }
            })
            .collect();

        info!("✅ YouTube API v3: {} results", results.len());
        Ok(results)
    }
}

/// Parses an ISO 8601 duration (`PT1H2M3S`) into seconds. Unknown input yields 0.
pub(crate) fn parse_duration(duration: &str) -> u64 {
    if !duration.starts_with("PT") {
        return 0;
    }

    let mut hours: u64 = 0;
    let mut minutes: u64 = 0;
    let mut seconds: u64 = 0;
    let mut current_num = String::new();

    for ch in duration[2..].chars() {
        match ch {
            'H' => {
                hours = current_num.parse().unwrap_or(0);
                current_num.clear();
            }
            'M' => {
                minutes = current_num.parse().unwrap_or(0);
                current_num.clear();
            }
            'S' => {
                seconds = current_num.parse().unwrap_or(0);
                current_num.clear();
            }
            _ if ch.is_ascii_digit() => current_num.push(ch),
            _ => return 0,
        }
    }

    hours
        .saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds)
}
