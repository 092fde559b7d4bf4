//! YouTube identifiers and the Data API duration lookup.

use crate::config::YoutubeConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_-]{6,}$").unwrap());

static EMBED_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/embed/([0-9A-Za-z_-]{6,})").unwrap());

static ISO_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)S)?$").unwrap()
});

/// Cached duration lookups kept by [`YoutubeDataApi`] before the cache is flushed.
const DURATION_CACHE_CAPACITY: usize = 128;

#[derive(thiserror::Error, Debug)]
pub enum DurationError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("YouTube Data API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub struct VideoId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, derive_more::Display)]
pub struct ClientVersion(String);

impl ClientVersion {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Continuation(pub String);

/// Resolve a video id from a bare id, a `youtu.be` link, a `watch?v=` URL or
/// an `/embed/` URL, in that order.
pub fn extract_video_id(url: &str) -> Option<VideoId> {
    if url.is_empty() {
        return None;
    }
    if VIDEO_ID_RE.is_match(url) {
        return Some(VideoId(url.to_string()));
    }

    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().unwrap_or_default();

    if host == "youtu.be" || host == "www.youtu.be" {
        let candidate = parsed.path().trim_start_matches('/');
        return (!candidate.is_empty()).then(|| VideoId(candidate.to_string()));
    }

    if host.contains("youtube.com") {
        if let Some((_, v)) = parsed
            .query_pairs()
            .find(|(key, value)| key == "v" && !value.is_empty())
        {
            return Some(VideoId(v.into_owned()));
        }

        return EMBED_PATH_RE
            .captures(parsed.path())
            .and_then(|cap| cap.get(1))
            .map(|m| VideoId(m.as_str().to_string()));
    }

    None
}

/// Parse an ISO-8601 `PT#H#M#S` duration into seconds.
///
/// Every component is optional; any other shape (days, fractions) or a total
/// that does not fit in `u64` is `None`.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let captures = ISO_DURATION_RE.captures(value)?;
    let component = |name: &str| -> Option<u64> {
        match captures.name(name) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let hours = component("hours")?;
    let minutes = component("minutes")?;
    let seconds = component("seconds")?;
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Total media duration lookup.
#[async_trait]
pub trait DurationService: Send + Sync {
    /// `Ok(None)` when the video is unknown or has no usable duration.
    async fn duration_seconds(
        &self,
        video_id: &VideoId,
        api_key: &ApiKey,
    ) -> Result<Option<u64>, DurationError>;
}

#[derive(Debug, Default, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Extract the duration of the first item of a `videos.list` response body.
pub fn parse_video_duration(body: &str) -> Result<Option<u64>, DurationError> {
    let response: VideoListResponse = serde_json::from_str(body)?;
    let Some(iso) = response
        .items
        .first()
        .and_then(|item| item.content_details.as_ref())
        .and_then(|details| details.duration.as_deref())
    else {
        return Ok(None);
    };

    let seconds = parse_iso8601_duration(iso);
    if seconds.is_none() {
        tracing::warn!("⚠️ Unsupported ISO-8601 duration: {}", iso);
    }
    Ok(seconds)
}

/// YouTube Data API v3 client for `videos.list?part=contentDetails`.
pub struct YoutubeDataApi {
    http_client: reqwest::Client,
    endpoint: String,
    cache: Mutex<HashMap<(VideoId, ApiKey), Option<u64>>>,
}

impl YoutubeDataApi {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DurationError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &YoutubeConfig) -> Result<Self, DurationError> {
        Self::new(
            config.api_endpoint.clone(),
            Duration::from_secs(config.api_timeout_seconds),
        )
    }

    fn cached(&self, video_id: &VideoId, api_key: &ApiKey) -> Option<Option<u64>> {
        self.cache
            .lock()
            .get(&(video_id.clone(), api_key.clone()))
            .copied()
    }

    fn remember(&self, video_id: &VideoId, api_key: &ApiKey, duration: Option<u64>) {
        let mut cache = self.cache.lock();
        if cache.len() >= DURATION_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert((video_id.clone(), api_key.clone()), duration);
    }
}

#[async_trait]
impl DurationService for YoutubeDataApi {
    async fn duration_seconds(
        &self,
        video_id: &VideoId,
        api_key: &ApiKey,
    ) -> Result<Option<u64>, DurationError> {
        if let Some(duration) = self.cached(video_id, api_key) {
            tracing::debug!("⏱️ Duration cache hit for {}", video_id);
            return Ok(duration);
        }

        let url = format!("{}/videos", self.endpoint);
        tracing::debug!("📡 Requesting video duration for {}", video_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("part", "contentDetails"),
                ("id", video_id.0.as_str()),
                ("key", api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("❌ Duration request failed: {}", e);
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("❌ YouTube Data API responded with {}", status);
            return Err(DurationError::Status(status));
        }

        let text = response.text().await?;
        let duration = parse_video_duration(&text)?;
        tracing::info!("⏱️ Video {} duration: {:?} seconds", video_id, duration);

        self.remember(video_id, api_key, duration);
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_creation_and_display() {
        let video_id = VideoId("dQw4w9WgXcQ".to_string());
        assert_eq!(video_id.0, "dQw4w9WgXcQ");
        assert_eq!(format!("{}", video_id), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_api_key_creation_and_display() {
        let api_key = ApiKey::new("test_api_key_123");
        assert_eq!(api_key.as_str(), "test_api_key_123");
        assert_eq!(format!("{}", api_key), "test_api_key_123");
    }

    #[test]
    fn test_continuation_serialization() {
        let continuation = Continuation("test_token".to_string());
        let serialized = serde_json::to_string(&continuation).unwrap();
        assert_eq!(serialized, "\"test_token\"");

        let deserialized: Continuation = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.0, "test_token");
    }

    #[test]
    fn test_extract_video_id_bare() {
        assert_eq!(
            extract_video_id("abcdEFG123"),
            Some(VideoId("abcdEFG123".to_string()))
        );
    }

    #[test]
    fn test_extract_video_id_short_link() {
        assert_eq!(
            extract_video_id("https://youtu.be/abcdEFG123"),
            Some(VideoId("abcdEFG123".to_string()))
        );
        assert_eq!(extract_video_id("https://youtu.be/"), None);
    }

    #[test]
    fn test_extract_video_id_watch_query() {
        assert_eq!(
            extract_video_id("https://youtube.com/watch?v=abcdEFG123"),
            Some(VideoId("abcdEFG123".to_string()))
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=abcdEFG123&t=5s"),
            Some(VideoId("abcdEFG123".to_string()))
        );
    }

    #[test]
    fn test_extract_video_id_embed() {
        assert_eq!(
            extract_video_id("https://youtube.com/embed/abcdEFG123"),
            Some(VideoId("abcdEFG123".to_string()))
        );
    }

    #[test]
    fn test_extract_video_id_not_found() {
        assert_eq!(extract_video_id("https://example.com/watch?v=abcdEFG123"), None);
        assert_eq!(extract_video_id("https://youtube.com/channel/UC123"), None);
        assert_eq!(extract_video_id("abc"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_parse_iso8601_duration() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT15M"), Some(900));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("PT2H"), Some(7200));
        assert_eq!(parse_iso8601_duration("PT"), Some(0));
        assert_eq!(parse_iso8601_duration("P1D"), None);
        assert_eq!(parse_iso8601_duration("P1DT2H"), None);
        assert_eq!(parse_iso8601_duration("1H"), None);
        assert_eq!(parse_iso8601_duration("PT5124095576030432H"), None);
        assert_eq!(parse_iso8601_duration("PT307445734561825861M"), None);
        assert_eq!(parse_iso8601_duration("PT99999999999999999999S"), None);
    }

    #[test]
    fn test_parse_video_duration() {
        let body = r#"{"items":[{"id":"abc","contentDetails":{"duration":"PT1H30M"}}]}"#;
        assert_eq!(parse_video_duration(body).unwrap(), Some(5400));

        assert_eq!(parse_video_duration(r#"{"items":[]}"#).unwrap(), None);
        assert_eq!(parse_video_duration(r#"{}"#).unwrap(), None);
        assert_eq!(
            parse_video_duration(r#"{"items":[{"contentDetails":{"duration":"P0D"}}]}"#).unwrap(),
            None
        );
        let overflowing = r#"{"items":[{"contentDetails":{"duration":"PT5124095576030432H"}}]}"#;
        assert_eq!(parse_video_duration(overflowing).unwrap(), None);
    }

    #[test]
    fn test_parse_video_duration_invalid_json() {
        match parse_video_duration("not json") {
            Err(DurationError::Parse(_)) => {}
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_duration_cache() {
        let api = YoutubeDataApi::new("https://example.invalid/", Duration::from_secs(1)).unwrap();
        let video_id = VideoId("abcdEFG123".to_string());
        let api_key = ApiKey::new("key");

        assert_eq!(api.cached(&video_id, &api_key), None);
        api.remember(&video_id, &api_key, Some(3600));
        assert_eq!(api.cached(&video_id, &api_key), Some(Some(3600)));
        assert_eq!(api.endpoint, "https://example.invalid");
    }
}
