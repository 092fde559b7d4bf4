//! The chat source seam: anything that can yield chat events for a URL and
//! an optional time window.

use crate::fetch::segments::parse_time_label;
use crate::models::ChatEvent;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

/// Errors raised by a chat source.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// The response or file could not be understood
    #[error("Failed to parse chat data: {reason}")]
    Parsing { reason: String },

    /// The chat could not be retrieved
    #[error("Failed to retrieve chat: {reason}")]
    Retrieval { reason: String },

    /// Network operation failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error when reading files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn parsing(reason: impl Into<String>) -> Self {
        Self::Parsing {
            reason: reason.into(),
        }
    }

    pub fn retrieval(reason: impl Into<String>) -> Self {
        Self::Retrieval {
            reason: reason.into(),
        }
    }

    /// Whether this is a parsing failure as opposed to a retrieval failure.
    pub fn is_parsing(&self) -> bool {
        matches!(self, Self::Parsing { .. })
    }
}

/// Chat events in non-decreasing timestamp order.
pub type ChatStream = BoxStream<'static, Result<ChatEvent, SourceError>>;

/// What to fetch: a URL plus an optional `H:MM:SS` window and message limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub url: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<usize>,
}

impl ChatRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_window(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn start_seconds(&self) -> Result<Option<f64>, SourceError> {
        parse_label(self.start.as_deref())
    }

    pub fn end_seconds(&self) -> Result<Option<f64>, SourceError> {
        parse_label(self.end.as_deref())
    }

    /// Keep the events inside `[start, end)`, up to `limit` of them.
    pub fn apply_window<I>(&self, events: I) -> Result<Vec<ChatEvent>, SourceError>
    where
        I: IntoIterator<Item = ChatEvent>,
    {
        let start = self.start_seconds()?;
        let end = self.end_seconds()?;
        let limit = self.limit.unwrap_or(usize::MAX);

        Ok(events
            .into_iter()
            .filter(|event| start.map_or(true, |start| event.timestamp_seconds >= start))
            .filter(|event| end.map_or(true, |end| event.timestamp_seconds < end))
            .take(limit)
            .collect())
    }
}

fn parse_label(label: Option<&str>) -> Result<Option<f64>, SourceError> {
    label
        .map(|label| {
            parse_time_label(label)
                .ok_or_else(|| SourceError::parsing(format!("invalid time label {:?}", label)))
        })
        .transpose()
}

/// A provider of chat events.
///
/// Every call to [`ChatSource::open`] starts an independent session, so
/// concurrent segment fetches never share one.
#[async_trait]
pub trait ChatSource: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ChatStream, SourceError>;
}

/// Chat source over events already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryChatSource {
    events: Vec<ChatEvent>,
}

impl MemoryChatSource {
    /// Events are sorted by timestamp on construction.
    pub fn new(mut events: Vec<ChatEvent>) -> Self {
        events.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));
        Self { events }
    }
}

#[async_trait]
impl ChatSource for MemoryChatSource {
    async fn open(&self, request: &ChatRequest) -> Result<ChatStream, SourceError> {
        let events = request.apply_window(self.events.iter().cloned())?;
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    fn events() -> Vec<ChatEvent> {
        [5.0, 0.0, 10.0, 9.99, 20.0]
            .iter()
            .map(|&t| ChatEvent::new(t, "msg", false))
            .collect()
    }

    fn timestamps(events: &[ChatEvent]) -> Vec<f64> {
        events.iter().map(|e| e.timestamp_seconds).collect()
    }

    #[test]
    fn test_window_is_half_open() {
        let request = ChatRequest::new("url")
            .with_window(Some("0:00:05".to_string()), Some("0:00:10".to_string()));
        let windowed = request.apply_window(MemoryChatSource::new(events()).events).unwrap();
        assert_eq!(timestamps(&windowed), vec![5.0, 9.99]);
    }

    #[test]
    fn test_limit_applies_after_window() {
        let request = ChatRequest::new("url")
            .with_window(Some("0:00:05".to_string()), None)
            .with_limit(Some(2));
        let windowed = request.apply_window(MemoryChatSource::new(events()).events).unwrap();
        assert_eq!(timestamps(&windowed), vec![5.0, 9.99]);
    }

    #[test]
    fn test_invalid_label_is_parsing_error() {
        let request = ChatRequest::new("url").with_window(Some("soon".to_string()), None);
        let err = request.apply_window(events()).unwrap_err();
        assert!(err.is_parsing());
    }

    #[test]
    fn test_memory_source_streams_sorted_events() {
        let source = MemoryChatSource::new(events());
        let collected: Vec<ChatEvent> = tokio_test::block_on(async {
            source
                .open(&ChatRequest::new("url"))
                .await
                .unwrap()
                .try_collect()
                .await
                .unwrap()
        });
        assert_eq!(timestamps(&collected), vec![0.0, 5.0, 9.99, 10.0, 20.0]);
    }

    #[test]
    fn test_source_error_display() {
        assert_eq!(
            SourceError::retrieval("HTTP 404").to_string(),
            "Failed to retrieve chat: HTTP 404"
        );
        assert!(!SourceError::retrieval("x").is_parsing());
    }
}
