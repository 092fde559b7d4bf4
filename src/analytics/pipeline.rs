//! Analysis entry points: events in, rate series and spikes out.

use crate::analytics::rate_aggregator::RateAggregator;
use crate::analytics::spike_detector::SpikeDetector;
use crate::config::{CpsConfig, SpikeConfig};
use crate::models::{ChatEvent, RateSeries, Spike};
use serde::{Deserialize, Serialize};

/// 解析結果（時系列 + スパイク）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub series: RateSeries,
    pub spikes: Vec<Spike>,
}

/// 全体解析とキーワード解析の組
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub total: AnalysisResult,
    pub keyword: Option<AnalysisResult>,
}

fn normalize_keyword(keyword: Option<&str>) -> Option<&str> {
    keyword.map(str::trim).filter(|k| !k.is_empty())
}

/// Aggregate `events` and detect spikes.
///
/// Spikes are detected over `smoothed_keyword` when a keyword is given and
/// over `smoothed_total` otherwise.
pub fn analyze(
    events: &[ChatEvent],
    keyword: Option<&str>,
    cps_config: &CpsConfig,
    spike_config: &SpikeConfig,
) -> AnalysisResult {
    let keyword = normalize_keyword(keyword);
    let aggregator = RateAggregator::from_config(cps_config);
    let detector = SpikeDetector::from_config(spike_config);

    let series = aggregator.analyze(events, keyword);
    let target = if keyword.is_some() {
        &series.smoothed_keyword
    } else {
        &series.smoothed_total
    };
    let spikes = detector.detect(&series.time_axis, target);

    tracing::info!(
        events = events.len(),
        buckets = series.len(),
        spikes = spikes.len(),
        keyword = keyword.unwrap_or(""),
        "📊 Analysis finished"
    );

    AnalysisResult { series, spikes }
}

/// Run the total analysis and, when a keyword is set, the keyword analysis
/// over the same events.
pub fn analyze_total_and_keyword(
    events: &[ChatEvent],
    keyword: Option<&str>,
    cps_config: &CpsConfig,
    spike_config: &SpikeConfig,
) -> AnalysisOutcome {
    let total = analyze(events, None, cps_config, spike_config);
    let keyword = normalize_keyword(keyword)
        .map(|keyword| analyze(events, Some(keyword), cps_config, spike_config));
    AnalysisOutcome { total, keyword }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cps(bucket: f64) -> CpsConfig {
        CpsConfig {
            bucket_size_seconds: bucket,
            smoothing_window_seconds: bucket,
            smoothing_average_window: 1,
        }
    }

    fn spike_config() -> SpikeConfig {
        SpikeConfig {
            min_prominence: 1.0,
            min_gap_seconds: 5.0,
            pre_start_buffer_seconds: 0.0,
        }
    }

    /// One event per second for a minute, plus a burst of "kusa" at 30s.
    fn burst_events() -> Vec<ChatEvent> {
        let mut events: Vec<ChatEvent> = (0..60)
            .map(|s| ChatEvent::new(s as f64 + 0.5, "hello", false))
            .collect();
        for i in 0..20 {
            events.push(ChatEvent::new(30.0 + i as f64 * 0.01, "KUSA", i % 2 == 0));
        }
        events.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));
        events
    }

    #[test]
    fn test_analyze_empty_events() {
        let result = analyze(&[], Some("kusa"), &cps(1.0), &spike_config());
        assert_eq!(result, AnalysisResult::default());
    }

    #[test]
    fn test_analyze_detects_burst_on_total() {
        let result = analyze(&burst_events(), None, &cps(1.0), &spike_config());

        assert_eq!(result.series.len(), 60);
        assert_eq!(result.spikes.len(), 1);
        assert_eq!(result.spikes[0].peak_time, 30.0);
        assert_eq!(result.spikes[0].peak_value, 21.0);
    }

    #[test]
    fn test_analyze_uses_keyword_series_when_keyword_set() {
        let result = analyze(&burst_events(), Some("kusa"), &cps(1.0), &spike_config());

        assert_eq!(result.spikes.len(), 1);
        assert_eq!(result.spikes[0].peak_value, 20.0);
        assert_eq!(result.series.keyword.iter().sum::<f64>(), 20.0);
    }

    #[test]
    fn test_total_and_keyword_outcome() {
        let events = burst_events();

        let outcome = analyze_total_and_keyword(&events, Some("kusa"), &cps(1.0), &spike_config());
        assert_eq!(outcome.total.spikes[0].peak_value, 21.0);
        assert_eq!(outcome.keyword.unwrap().spikes[0].peak_value, 20.0);

        let outcome = analyze_total_and_keyword(&events, Some("  "), &cps(1.0), &spike_config());
        assert!(outcome.keyword.is_none());
    }
}
