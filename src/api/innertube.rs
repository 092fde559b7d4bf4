pub mod replay;

use crate::api::innertube::replay::GetLiveChatReplayResponse;
use crate::api::youtube::{extract_video_id, ApiKey, ClientVersion, Continuation, VideoId};
use crate::config::ChatConfig;
use crate::fetch::source::{ChatRequest, ChatSource, ChatStream, SourceError};
use crate::models::ChatEvent;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]INNERTUBE_API_KEY['"]:\s*['"](.+?)['"]"#).unwrap()
});

static CLIENT_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]INNERTUBE_CLIENT_VERSION['"]:\s*['"](.+?)['"]"#).unwrap()
});

static REPLAY_CONTINUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"['"]liveChatRenderer['"]:\s*\{\s*['"]continuations['"]:\s*\[\s*\{\s*['"]reloadContinuationData['"]:\s*\{\s*['"]continuation['"]:\s*['"](.+?)['"]"#,
    )
    .unwrap()
});

static CONTINUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]continuation['"]:\s*['"](.+?)['"]"#).unwrap());

pub fn extract_api_key(html: &str) -> Option<ApiKey> {
    API_KEY_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| ApiKey::new(m.as_str()))
}

pub fn extract_client_version(html: &str) -> Option<ClientVersion> {
    CLIENT_VERSION_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| ClientVersion::new(m.as_str()))
}

/// The chat replay continuation embedded in a watch page.
///
/// Prefers the token under `liveChatRenderer` and falls back to the first
/// `continuation` value in the page.
pub fn extract_continuation(html: &str) -> Option<Continuation> {
    REPLAY_CONTINUATION_RE
        .captures(html)
        .or_else(|| CONTINUATION_RE.captures(html))
        .and_then(|cap| cap.get(1))
        .map(|m| Continuation(m.as_str().to_string()))
}

/// State of one replay session.
#[derive(Debug, Clone)]
pub struct InnerTube {
    pub video_id: VideoId,
    pub api_key: ApiKey,
    pub client_version: ClientVersion,
    pub continuation: Option<Continuation>,
    pub http_client: reqwest::Client,
    base_url: String,
}

impl InnerTube {
    pub fn new(
        video_id: VideoId,
        api_key: ApiKey,
        client_version: ClientVersion,
        continuation: Continuation,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            video_id,
            api_key,
            client_version,
            continuation: Some(continuation),
            http_client,
            base_url: YOUTUBE_BASE_URL.to_string(),
        }
    }
}

/// Load the watch page for `url` and extract what a replay session needs.
pub async fn fetch_replay_page(
    http_client: &reqwest::Client,
    base_url: &str,
    url: &str,
) -> Result<InnerTube, SourceError> {
    let video_id = extract_video_id(url).ok_or_else(|| {
        tracing::error!("❌ video_id not found in URL: {}", url);
        SourceError::parsing(format!("no video id in {}", url))
    })?;
    let watch_url = format!("{}/watch?v={}", base_url, video_id);
    tracing::info!("🌐 Fetching watch page: {}", watch_url);

    let response = http_client
        .get(&watch_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("❌ Failed to fetch URL: {}", e);
            e
        })?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!("❌ Watch page responded with {}", status);
        return Err(SourceError::retrieval(format!("HTTP {} for {}", status, watch_url)));
    }

    let html = response.text().await?;
    tracing::debug!("📄 HTML response length: {} chars", html.len());

    let api_key = extract_api_key(&html).ok_or_else(|| {
        tracing::error!("❌ api_key not found in HTML");
        SourceError::parsing("INNERTUBE_API_KEY not found")
    })?;
    let client_version = extract_client_version(&html).ok_or_else(|| {
        tracing::error!("❌ client_version not found in HTML");
        SourceError::parsing("INNERTUBE_CLIENT_VERSION not found")
    })?;
    tracing::info!("📱 Extracted client_version: {}", client_version);

    let continuation = extract_continuation(&html).ok_or_else(|| {
        tracing::error!("❌ continuation not found in HTML");
        SourceError::parsing("chat replay continuation not found")
    })?;

    let mut inner_tube = InnerTube::new(
        video_id,
        api_key,
        client_version,
        continuation,
        http_client.clone(),
    );
    inner_tube.base_url = base_url.to_string();
    Ok(inner_tube)
}

/// Request one replay page.
///
/// `player_offset_ms` positions the first page; later pages follow their
/// continuation token alone.
pub async fn fetch_replay_chunk(
    inner_tube: &InnerTube,
    continuation: &Continuation,
    player_offset_ms: Option<u64>,
) -> Result<GetLiveChatReplayResponse, SourceError> {
    let url = format!(
        "{}/youtubei/v1/live_chat/get_live_chat_replay?key={}",
        inner_tube.base_url, inner_tube.api_key
    );

    let mut payload = serde_json::json!({
        "context": {
            "client": {
                "clientName": "WEB",
                "clientVersion": inner_tube.client_version.to_string()
            }
        },
        "continuation": continuation.to_string(),
    });
    if let Some(offset) = player_offset_ms {
        payload["currentPlayerState"] = serde_json::json!({
            "playerOffsetMs": offset.to_string()
        });
    }

    let response = inner_tube
        .http_client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("User-Agent", USER_AGENT)
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("❌ HTTP request failed: {}", e);
            e
        })?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!("❌ Replay request failed with status: {}", status);
        return Err(SourceError::retrieval(format!("HTTP {}", status)));
    }

    let response_text = response.text().await?;
    serde_json::from_str(&response_text).map_err(|e| {
        tracing::error!("❌ Failed to parse JSON response: {}", e);
        tracing::debug!(
            "🔍 Response text preview: {}",
            response_text.chars().take(200).collect::<String>()
        );
        SourceError::parsing(e.to_string())
    })
}

/// Cursor over replay pages that applies the request window and limit.
struct ReplayCursor {
    inner_tube: InnerTube,
    start: Option<f64>,
    end: Option<f64>,
    remaining: Option<usize>,
    buffered: VecDeque<ChatEvent>,
    first_page: bool,
}

impl ReplayCursor {
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, SourceError> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }

            if let Some(event) = self.buffered.pop_front() {
                if self.start.is_some_and(|start| event.timestamp_seconds < start) {
                    continue;
                }
                if self.end.is_some_and(|end| event.timestamp_seconds >= end) {
                    tracing::debug!("🏁 Reached end of window at {:.3}s", event.timestamp_seconds);
                    return Ok(None);
                }
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some(event));
            }

            let Some(continuation) = self.inner_tube.continuation.take() else {
                return Ok(None);
            };

            let offset_ms = if self.first_page {
                self.start.map(|start| (start * 1000.0) as u64)
            } else {
                None
            };
            self.first_page = false;

            let page = fetch_replay_chunk(&self.inner_tube, &continuation, offset_ms).await?;
            let events = page.events();
            let next = page.next_continuation();
            tracing::debug!("📄 Replay page with {} events", events.len());

            // Stop on a page that repeats its token without any events.
            if events.is_empty() && next.as_ref() == Some(&continuation) {
                return Ok(None);
            }
            self.buffered.extend(events);
            self.inner_tube.continuation = next;
        }
    }
}

/// Chat source backed by YouTube's live chat replay.
#[derive(Debug, Clone)]
pub struct ReplayChatSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl ReplayChatSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: YOUTUBE_BASE_URL.to_string(),
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self, SourceError> {
        Self::new(Duration::from_secs(config.request_timeout_seconds))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatSource for ReplayChatSource {
    async fn open(&self, request: &ChatRequest) -> Result<ChatStream, SourceError> {
        let start = request.start_seconds()?;
        let end = request.end_seconds()?;
        let inner_tube = fetch_replay_page(&self.http_client, &self.base_url, &request.url).await?;
        tracing::info!(
            video_id = %inner_tube.video_id,
            start = ?request.start,
            end = ?request.end,
            "✅ Opened chat replay session"
        );

        let cursor = ReplayCursor {
            inner_tube,
            start,
            end,
            remaining: request.limit,
            buffered: VecDeque::new(),
            first_page: true,
        };

        Ok(stream::try_unfold(cursor, |mut cursor| async move {
            let next = cursor.next_event().await?;
            Ok::<_, SourceError>(next.map(|event| (event, cursor)))
        })
        .boxed())
    }
}
