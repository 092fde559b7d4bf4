//! NDJSON (Newline Delimited JSON) chat event files.
//!
//! One [`ChatEvent`] object per line. Blank lines are skipped; a malformed
//! line fails the whole read with its 1-based line number.

use crate::fetch::source::{ChatRequest, ChatSource, ChatStream, SourceError};
use crate::models::ChatEvent;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NdjsonError {
    /// I/O error when reading or writing files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error at line {line}: {source}")]
    JsonParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl From<NdjsonError> for SourceError {
    fn from(error: NdjsonError) -> Self {
        match error {
            NdjsonError::Io(e) => SourceError::Io(e),
            other => SourceError::parsing(other.to_string()),
        }
    }
}

/// Parse events from any buffered reader.
pub fn parse_events<R: BufRead>(reader: R) -> Result<Vec<ChatEvent>, NdjsonError> {
    let mut events = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;

        if line.trim().is_empty() {
            continue;
        }

        let event = serde_json::from_str(&line).map_err(|e| NdjsonError::JsonParse {
            line: line_number + 1,
            source: e,
        })?;
        events.push(event);
    }

    Ok(events)
}

pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<ChatEvent>, NdjsonError> {
    let file = File::open(path.as_ref())?;
    let events = parse_events(BufReader::new(file))?;
    tracing::debug!(
        "📂 Read {} events from {}",
        events.len(),
        path.as_ref().display()
    );
    Ok(events)
}

/// Write `events` one per line.
pub fn write_events<W: Write>(writer: W, events: &[ChatEvent]) -> Result<(), NdjsonError> {
    let mut writer = BufWriter::new(writer);
    for event in events {
        serde_json::to_writer(&mut writer, event).map_err(NdjsonError::Serialize)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Chat source over a previously saved NDJSON file.
///
/// The request URL is ignored; the window and limit are honored.
#[derive(Debug, Clone)]
pub struct NdjsonChatSource {
    path: PathBuf,
}

impl NdjsonChatSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChatSource for NdjsonChatSource {
    async fn open(&self, request: &ChatRequest) -> Result<ChatStream, SourceError> {
        let path = self.path.clone();
        let mut events = tokio::task::spawn_blocking(move || read_events(path))
            .await
            .map_err(|e| SourceError::retrieval(format!("reader task failed: {}", e)))??;

        events.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));
        let events = request.apply_window(events)?;
        tracing::info!(
            "📂 Loaded {} events from {}",
            events.len(),
            self.path.display()
        );
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::Cursor;

    #[test]
    fn test_parse_events_skips_blank_lines() {
        let input = concat!(
            r#"{"timestamp_seconds":1.5,"text":"hi","is_member":false}"#,
            "\n\n   \n",
            r#"{"timestamp_seconds":2.0,"text":"草","is_member":true}"#,
            "\n"
        );
        let events = parse_events(Cursor::new(input)).unwrap();
        assert_eq!(
            events,
            vec![
                ChatEvent::new(1.5, "hi", false),
                ChatEvent::new(2.0, "草", true)
            ]
        );
    }

    #[test]
    fn test_parse_events_reports_line_number() {
        let input = concat!(
            r#"{"timestamp_seconds":1.5,"text":"hi","is_member":false}"#,
            "\n\n",
            "{not json}\n"
        );
        match parse_events(Cursor::new(input)) {
            Err(NdjsonError::JsonParse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected JsonParse error, got {:?}", other),
        }
    }

    #[test]
    fn test_ndjson_error_chain() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error = NdjsonError::JsonParse {
            line: 42,
            source: json_error,
        };
        assert!(error.to_string().contains("line 42"));
        assert!(error.source().is_some());

        let source_error = SourceError::from(error);
        assert!(source_error.is_parsing());
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.ndjson");
        let events = vec![
            ChatEvent::new(0.25, "first", false),
            ChatEvent::new(3.0, "line\nbreak", true),
        ];

        write_events(File::create(&path).unwrap(), &events).unwrap();
        assert_eq!(read_events(&path).unwrap(), events);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_events("definitely/not/here.ndjson").unwrap_err();
        assert!(matches!(err, NdjsonError::Io(_)));
        assert!(!SourceError::from(err).is_parsing());
    }
}
