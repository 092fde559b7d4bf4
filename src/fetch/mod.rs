//! Chat retrieval: sequential streaming or segmented parallel fetch with a
//! sequential fallback.

pub mod segments;
pub mod source;

use crate::api::youtube::{extract_video_id, ApiKey, DurationError, DurationService};
use crate::config::{ChatConfig, YoutubeConfig};
use crate::models::{ChatEvent, FetchProgress, Segment};
use futures_util::TryStreamExt;
use segments::{build_segments, format_seconds};
use source::{ChatRequest, ChatSource, SourceError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Progress observer, called with the cumulative count and last timestamp.
pub type ProgressCallback<'a> = &'a (dyn Fn(FetchProgress) + Sync);

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Chat information could not be parsed. Check the URL.")]
    Parsing(#[source] SourceError),

    #[error("Failed to retrieve chat messages.")]
    Retrieval(#[source] SourceError),
}

impl From<SourceError> for FetchError {
    fn from(error: SourceError) -> Self {
        if error.is_parsing() {
            Self::Parsing(error)
        } else {
            Self::Retrieval(error)
        }
    }
}

/// Why a parallel fetch was not attempted or was abandoned.
#[derive(thiserror::Error, Debug)]
pub enum ParallelFallback {
    #[error("parallel fetch is not configured")]
    NotConfigured,

    #[error("no video id in {url}")]
    NoVideoId { url: String },

    #[error("duration lookup failed: {0}")]
    DurationLookup(#[from] DurationError),

    #[error("video duration is unavailable")]
    DurationUnavailable,

    #[error("duration {duration}s does not exceed one segment of {segment}s")]
    TooShort { duration: u64, segment: u64 },

    #[error("segment {segment:?} failed: {source}")]
    SegmentFailed {
        segment: Segment,
        #[source]
        source: SourceError,
    },

    #[error("segment task aborted: {0}")]
    TaskAborted(#[from] JoinError),
}

/// A resolved parallel fetch, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelPlan {
    pub url: String,
    pub segments: Vec<Segment>,
    pub max_workers: usize,
    pub message_limit: Option<usize>,
}

/// API key set, more than one worker and a non-zero segment length.
pub fn can_parallel_fetch(config: &YoutubeConfig) -> bool {
    config.api_key().is_some()
        && config.parallel_segments > 1
        && config.segment_duration_seconds > 0
}

fn report(progress: Option<ProgressCallback<'_>>, processed: usize, last_timestamp: Option<f64>) {
    if let Some(callback) = progress {
        callback(FetchProgress {
            processed,
            last_timestamp,
        });
    }
}

pub struct ChatFetchCoordinator {
    source: Arc<dyn ChatSource>,
    durations: Arc<dyn DurationService>,
}

impl ChatFetchCoordinator {
    pub fn new(source: Arc<dyn ChatSource>, durations: Arc<dyn DurationService>) -> Self {
        Self { source, durations }
    }

    /// Fetch every chat event for `url` in ascending timestamp order.
    ///
    /// Tries the segmented parallel plan when `youtube` allows it and falls
    /// back to a single sequential stream otherwise.
    pub async fn fetch(
        &self,
        url: &str,
        chat: &ChatConfig,
        youtube: Option<&YoutubeConfig>,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<ChatEvent>, FetchError> {
        if let Some(youtube) = youtube {
            let attempt = match self.plan_parallel(url, chat, youtube).await {
                Ok(plan) => self.execute_parallel(plan, progress).await,
                Err(fallback) => Err(fallback),
            };

            match attempt {
                Ok(events) => return Ok(events),
                Err(ParallelFallback::NotConfigured) => {
                    tracing::debug!("Parallel fetch not configured, streaming sequentially");
                }
                Err(fallback) => {
                    tracing::warn!(
                        "⚠️ Parallel fetch unavailable ({}), falling back to sequential",
                        fallback
                    );
                }
            }
        }

        self.fetch_sequential(url, chat, progress).await
    }

    /// Resolve the video, look up its duration and partition it.
    pub async fn plan_parallel(
        &self,
        url: &str,
        chat: &ChatConfig,
        youtube: &YoutubeConfig,
    ) -> Result<ParallelPlan, ParallelFallback> {
        if !can_parallel_fetch(youtube) {
            return Err(ParallelFallback::NotConfigured);
        }
        let api_key = youtube
            .api_key()
            .map(ApiKey::new)
            .ok_or(ParallelFallback::NotConfigured)?;

        let video_id = extract_video_id(url).ok_or_else(|| ParallelFallback::NoVideoId {
            url: url.to_string(),
        })?;

        let duration = self
            .durations
            .duration_seconds(&video_id, &api_key)
            .await?
            .filter(|duration| *duration > 0)
            .ok_or(ParallelFallback::DurationUnavailable)?;

        let segment = youtube.segment_duration_seconds;
        if duration <= segment {
            return Err(ParallelFallback::TooShort { duration, segment });
        }

        let segments = build_segments(duration, segment);
        tracing::info!(
            video_id = %video_id,
            duration,
            segments = segments.len(),
            workers = youtube.parallel_segments,
            "🧩 Planned parallel chat fetch"
        );

        Ok(ParallelPlan {
            url: url.to_string(),
            segments,
            max_workers: youtube.parallel_segments,
            message_limit: chat.effective_limit(),
        })
    }

    /// Fetch every segment of `plan` on a bounded pool.
    ///
    /// Segments are merged in completion order, then stably sorted by
    /// timestamp and truncated to the plan's message limit. The first failing
    /// segment aborts the remaining ones.
    pub async fn execute_parallel(
        &self,
        plan: ParallelPlan,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<ChatEvent>, ParallelFallback> {
        let semaphore = Arc::new(Semaphore::new(plan.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for segment in plan.segments.iter().copied() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let request = ChatRequest::new(plan.url.clone()).with_window(
                Some(format_seconds(segment.start_seconds)),
                segment.end_seconds.map(format_seconds),
            );

            tasks.spawn(async move {
                let result = fetch_segment(source.as_ref(), &semaphore, &request).await;
                (segment, result)
            });
        }

        let mut events = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (segment, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.abort_all();
                    return Err(ParallelFallback::TaskAborted(e));
                }
            };

            let segment_events = match result {
                Ok(segment_events) => segment_events,
                Err(source) => {
                    tracing::error!("❌ Segment {:?} failed: {}", segment, source);
                    tasks.abort_all();
                    return Err(ParallelFallback::SegmentFailed { segment, source });
                }
            };

            tracing::debug!(
                start = segment.start_seconds,
                end = ?segment.end_seconds,
                count = segment_events.len(),
                "📥 Segment fetched"
            );

            let last_timestamp = segment_events.last().map(|e| e.timestamp_seconds);
            events.extend(segment_events);
            report(progress, events.len(), last_timestamp);
        }

        events.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));
        if let Some(limit) = plan.message_limit {
            events.truncate(limit);
        }

        tracing::info!("✅ Parallel fetch finished with {} events", events.len());
        Ok(events)
    }

    /// Stream the whole chat in source order, reporting every `chunk_size`
    /// events and once more for the remainder.
    pub async fn fetch_sequential(
        &self,
        url: &str,
        chat: &ChatConfig,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<ChatEvent>, FetchError> {
        let chunk_size = chat.chunk_size.max(1);
        let request = ChatRequest::new(url).with_limit(chat.effective_limit());

        tracing::info!("📡 Fetching chat sequentially from {}", url);
        let mut stream = self.source.open(&request).await.map_err(|e| {
            tracing::error!("❌ Failed to open chat source: {}", e);
            FetchError::from(e)
        })?;

        let mut events = Vec::new();
        let mut chunk = Vec::with_capacity(chunk_size);
        let mut last_timestamp = None;

        while let Some(event) = stream.try_next().await.map_err(|e| {
            tracing::error!(
                "❌ Chat stream failed after {} events: {}",
                events.len() + chunk.len(),
                e
            );
            FetchError::from(e)
        })? {
            last_timestamp = Some(event.timestamp_seconds);
            chunk.push(event);
            if chunk.len() >= chunk_size {
                events.append(&mut chunk);
                report(progress, events.len(), last_timestamp);
            }
        }

        if !chunk.is_empty() {
            events.append(&mut chunk);
            report(progress, events.len(), last_timestamp);
        }

        tracing::info!("✅ Sequential fetch finished with {} events", events.len());
        Ok(events)
    }
}

async fn fetch_segment(
    source: &dyn ChatSource,
    semaphore: &Semaphore,
    request: &ChatRequest,
) -> Result<Vec<ChatEvent>, SourceError> {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| SourceError::retrieval("worker pool closed"))?;
    source.open(request).await?.try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::youtube::VideoId;
    use crate::fetch::source::MemoryChatSource;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FixedDuration(Option<u64>);

    #[async_trait]
    impl DurationService for FixedDuration {
        async fn duration_seconds(
            &self,
            _video_id: &VideoId,
            _api_key: &ApiKey,
        ) -> Result<Option<u64>, DurationError> {
            Ok(self.0)
        }
    }

    fn youtube(parallel: usize, segment: u64) -> YoutubeConfig {
        YoutubeConfig {
            api_key: Some("key".to_string()),
            segment_duration_seconds: segment,
            parallel_segments: parallel,
            ..YoutubeConfig::default()
        }
    }

    fn events(count: usize, step: f64) -> Vec<ChatEvent> {
        (0..count)
            .map(|i| ChatEvent::new(i as f64 * step, format!("m{}", i), false))
            .collect()
    }

    fn coordinator(events: Vec<ChatEvent>, duration: Option<u64>) -> ChatFetchCoordinator {
        ChatFetchCoordinator::new(
            Arc::new(MemoryChatSource::new(events)),
            Arc::new(FixedDuration(duration)),
        )
    }

    #[test]
    fn test_can_parallel_fetch() {
        assert!(can_parallel_fetch(&youtube(2, 900)));
        assert!(!can_parallel_fetch(&youtube(1, 900)));
        assert!(!can_parallel_fetch(&youtube(4, 0)));

        let mut blank_key = youtube(4, 900);
        blank_key.api_key = Some("  ".to_string());
        assert!(!can_parallel_fetch(&blank_key));
    }

    #[tokio::test]
    async fn test_plan_parallel_partitions_duration() {
        let coordinator = coordinator(Vec::new(), Some(2000));
        let plan = coordinator
            .plan_parallel("abcdEFG123", &ChatConfig::default(), &youtube(3, 900))
            .await
            .unwrap();

        assert_eq!(plan.segments.len(), 3);
        assert_eq!(plan.segments[2], Segment::new(1800, Some(2000)));
        assert_eq!(plan.max_workers, 3);
        assert_eq!(plan.message_limit, None);
    }

    #[tokio::test]
    async fn test_plan_parallel_rejects_short_video() {
        let coordinator = coordinator(Vec::new(), Some(900));
        let err = coordinator
            .plan_parallel("abcdEFG123", &ChatConfig::default(), &youtube(3, 900))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParallelFallback::TooShort {
                duration: 900,
                segment: 900
            }
        ));
    }

    #[tokio::test]
    async fn test_plan_parallel_requires_video_id() {
        let coordinator = coordinator(Vec::new(), Some(2000));
        let err = coordinator
            .plan_parallel("https://example.com/live", &ChatConfig::default(), &youtube(3, 900))
            .await
            .unwrap_err();
        assert!(matches!(err, ParallelFallback::NoVideoId { .. }));
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let all = events(500, 4.0);
        let coordinator = coordinator(all.clone(), Some(2000));

        let parallel = coordinator
            .fetch("abcdEFG123", &ChatConfig::default(), Some(&youtube(3, 300)), None)
            .await
            .unwrap();
        let sequential = coordinator
            .fetch("abcdEFG123", &ChatConfig::default(), None, None)
            .await
            .unwrap();

        assert_eq!(parallel, all);
        assert_eq!(sequential, all);
    }

    #[tokio::test]
    async fn test_parallel_progress_per_segment() {
        let coordinator = coordinator(events(100, 10.0), Some(1000));
        let reports = Mutex::new(Vec::new());
        let record = |p: FetchProgress| reports.lock().push(p);

        let fetched = coordinator
            .fetch("abcdEFG123", &ChatConfig::default(), Some(&youtube(2, 250)), Some(&record))
            .await
            .unwrap();

        let reports = reports.into_inner();
        assert_eq!(fetched.len(), 100);
        assert_eq!(reports.len(), 4);
        let counts: Vec<usize> = reports.iter().map(|p| p.processed).collect();
        assert_eq!(counts.last(), Some(&100));
        assert!(counts.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_sequential_progress_chunks() {
        let coordinator = coordinator(events(25, 1.0), None);
        let chat = ChatConfig {
            chunk_size: 10,
            ..ChatConfig::default()
        };
        let reports = Mutex::new(Vec::new());
        let record = |p: FetchProgress| reports.lock().push(p);

        coordinator
            .fetch_sequential("abcdEFG123", &chat, Some(&record))
            .await
            .unwrap();

        assert_eq!(
            reports.into_inner(),
            vec![
                FetchProgress {
                    processed: 10,
                    last_timestamp: Some(9.0)
                },
                FetchProgress {
                    processed: 20,
                    last_timestamp: Some(19.0)
                },
                FetchProgress {
                    processed: 25,
                    last_timestamp: Some(24.0)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_sequential_exact_multiple_has_no_extra_report() {
        let coordinator = coordinator(events(20, 1.0), None);
        let chat = ChatConfig {
            chunk_size: 10,
            ..ChatConfig::default()
        };
        let reports = Mutex::new(Vec::new());
        let record = |p: FetchProgress| reports.lock().push(p.processed);

        coordinator
            .fetch_sequential("abcdEFG123", &chat, Some(&record))
            .await
            .unwrap();
        assert_eq!(reports.into_inner(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_message_limit_applies_to_both_paths() {
        let coordinator = coordinator(events(500, 4.0), Some(2000));
        let chat = ChatConfig {
            message_limit: Some(42),
            ..ChatConfig::default()
        };

        let parallel = coordinator
            .fetch("abcdEFG123", &chat, Some(&youtube(4, 300)), None)
            .await
            .unwrap();
        let sequential = coordinator.fetch("abcdEFG123", &chat, None, None).await.unwrap();

        assert_eq!(parallel.len(), 42);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_fetch_error_classification() {
        let parsing = FetchError::from(SourceError::parsing("bad"));
        assert!(matches!(parsing, FetchError::Parsing(_)));
        assert_eq!(
            parsing.to_string(),
            "Chat information could not be parsed. Check the URL."
        );

        let retrieval = FetchError::from(SourceError::retrieval("HTTP 500"));
        assert_eq!(retrieval.to_string(), "Failed to retrieve chat messages.");
        assert!(std::error::Error::source(&retrieval).is_some());
    }
}
