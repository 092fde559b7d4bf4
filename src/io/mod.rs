//! File formats for saved chat data.

pub mod ndjson;

pub use ndjson::{parse_events, read_events, write_events, NdjsonChatSource, NdjsonError};
