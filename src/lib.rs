pub mod analytics;
pub mod api;
pub mod config;
pub mod fetch;
pub mod io;
pub mod models;
pub mod utils;

// Re-export the main error types for convenience
pub use api::youtube::DurationError;
pub use fetch::source::SourceError;
pub use fetch::{FetchError, ParallelFallback};
pub use io::NdjsonError;

// Re-export the fetch and analysis entry points
pub use analytics::{analyze, analyze_total_and_keyword, format_report, AnalysisResult};
pub use api::innertube::ReplayChatSource;
pub use api::youtube::YoutubeDataApi;
pub use config::{AppConfig, ConfigManager};
pub use fetch::ChatFetchCoordinator;
pub use models::{ChatEvent, FetchProgress, RateSeries, Segment, Spike};
