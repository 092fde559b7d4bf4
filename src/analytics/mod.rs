pub mod pipeline;
pub mod rate_aggregator;
pub mod report;
pub mod spike_detector;

pub use pipeline::*;
pub use rate_aggregator::RateAggregator;
pub use report::{build_jump_url, format_report, AnalysisReport, SpikeReport};
pub use spike_detector::SpikeDetector;
