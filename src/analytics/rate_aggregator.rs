//! Message-rate aggregation.
//!
//! Chat events are grouped into fixed-width time buckets and turned into raw
//! and smoothed count series. Only buckets that received at least one event
//! are materialized, so the resulting time axis can have gaps.

use crate::config::CpsConfig;
use crate::models::{ChatEvent, RateSeries};
use std::collections::BTreeMap;

/// バケットごとの集計値
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BucketCounts {
    total: u64,
    member: u64,
    keyword: u64,
}

/// メッセージ数集計器
#[derive(Debug, Clone, PartialEq)]
pub struct RateAggregator {
    bucket_size_seconds: f64,
    sum_window: usize,
    average_window: usize,
}

impl RateAggregator {
    /// `bucket_size_seconds` must be positive.
    pub fn new(
        bucket_size_seconds: f64,
        smoothing_window_seconds: f64,
        smoothing_average_window: usize,
    ) -> Self {
        let sum_window = (smoothing_window_seconds / bucket_size_seconds).floor();
        let sum_window = if sum_window.is_finite() && sum_window >= 1.0 {
            sum_window as usize
        } else {
            1
        };

        Self {
            bucket_size_seconds,
            sum_window,
            average_window: smoothing_average_window.max(1),
        }
    }

    pub fn from_config(config: &CpsConfig) -> Self {
        Self::new(
            config.bucket_size_seconds,
            config.smoothing_window_seconds,
            config.smoothing_average_window,
        )
    }

    pub fn bucket_size_seconds(&self) -> f64 {
        self.bucket_size_seconds
    }

    /// Window length (in buckets) of the first smoothing stage.
    pub fn sum_window(&self) -> usize {
        self.sum_window
    }

    /// Window length (in samples) of the second smoothing stage.
    pub fn average_window(&self) -> usize {
        self.average_window
    }

    /// Bucket index an event with the given timestamp falls into.
    pub fn bucket_index(&self, timestamp_seconds: f64) -> i64 {
        (timestamp_seconds / self.bucket_size_seconds).floor() as i64
    }

    /// 集計して時系列を作る
    ///
    /// An empty keyword (`Some("")`) is treated the same as no keyword: the
    /// keyword series stays all zero.
    pub fn analyze(&self, events: &[ChatEvent], keyword: Option<&str>) -> RateSeries {
        if events.is_empty() {
            return RateSeries::default();
        }

        let buckets = self.accumulate_counts(events, keyword);

        let mut series = RateSeries::default();
        for (index, counts) in &buckets {
            series
                .time_axis
                .push(*index as f64 * self.bucket_size_seconds);
            series.total.push(counts.total as f64);
            series.member.push(counts.member as f64);
            series.keyword.push(counts.keyword as f64);
        }

        series.smoothed_total = self.smooth(&series.total);
        series.smoothed_keyword = self.smooth(&series.keyword);
        series
    }

    fn accumulate_counts(
        &self,
        events: &[ChatEvent],
        keyword: Option<&str>,
    ) -> BTreeMap<i64, BucketCounts> {
        let keyword = keyword
            .filter(|k| !k.is_empty())
            .map(|k| k.to_lowercase());

        let mut buckets: BTreeMap<i64, BucketCounts> = BTreeMap::new();
        for event in events {
            let bucket = buckets
                .entry(self.bucket_index(event.timestamp_seconds))
                .or_default();
            bucket.total += 1;
            if event.is_member {
                bucket.member += 1;
            }
            if let Some(keyword) = keyword.as_deref() {
                if event.text.to_lowercase().contains(keyword) {
                    bucket.keyword += 1;
                }
            }
        }
        buckets
    }

    /// Box-sum over `sum_window` buckets followed by a box-average over
    /// `average_window` samples.
    pub fn smooth(&self, series: &[f64]) -> Vec<f64> {
        if series.is_empty() {
            return Vec::new();
        }
        let summed = box_sum(series, self.sum_window);
        box_average(&summed, self.average_window)
    }
}

/// Centered moving sum with zero padding outside the series.
///
/// For window `w` the output at `i` covers `i - w/2 ..= i + (w-1)/2`.
/// The output always has the same length as the input. Runs in linear time
/// over prefix sums, whatever the window.
pub fn box_sum(series: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let n = series.len();
    let behind = window / 2;
    let ahead = (window - 1) / 2;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut running = 0.0;
    for value in series {
        running += value;
        prefix.push(running);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(behind);
            let hi = (i + ahead).min(n - 1);
            prefix[hi + 1] - prefix[lo]
        })
        .collect()
}

/// Centered moving average with zero padding (the divisor is always `window`).
pub fn box_average(series: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    box_sum(series, window)
        .into_iter()
        .map(|sum| sum / window as f64)
        .collect()
}
