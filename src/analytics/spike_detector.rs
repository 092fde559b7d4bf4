//! Threshold based spike detection over a smoothed rate series.

use crate::config::SpikeConfig;
use crate::models::Spike;

/// Lower bound for the standard deviation used in the threshold.
const MIN_STD: f64 = 1e-6;

/// スパイク検出器
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeDetector {
    min_prominence: f64,
    min_gap_seconds: f64,
    pre_start_buffer_seconds: f64,
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new(2.0, 10.0, 0.0)
    }
}

impl SpikeDetector {
    pub fn new(min_prominence: f64, min_gap_seconds: f64, pre_start_buffer_seconds: f64) -> Self {
        Self {
            min_prominence,
            min_gap_seconds,
            pre_start_buffer_seconds: pre_start_buffer_seconds.max(0.0),
        }
    }

    pub fn from_config(config: &SpikeConfig) -> Self {
        Self::new(
            config.min_prominence,
            config.min_gap_seconds,
            config.pre_start_buffer_seconds,
        )
    }

    /// Detection threshold for a series: `mean + prominence * max(std, 1e-6)`.
    pub fn threshold(&self, series: &[f64]) -> f64 {
        let (mean, std) = mean_and_std(series);
        mean + self.min_prominence * std.max(MIN_STD)
    }

    /// スパイクを検出する
    ///
    /// `time_axis` and `series` are parallel sequences. Spikes come back in
    /// ascending peak time. An interval whose peak is closer than
    /// `min_gap_seconds` to the previously accepted peak is dropped.
    pub fn detect(&self, time_axis: &[f64], series: &[f64]) -> Vec<Spike> {
        debug_assert_eq!(time_axis.len(), series.len());
        let len = time_axis.len().min(series.len());
        let series = &series[..len];
        let time_axis = &time_axis[..len];

        if series.is_empty() {
            return Vec::new();
        }

        let buffer_buckets = self.buffer_buckets(estimate_bucket_interval(time_axis));
        let threshold = self.threshold(series);

        let mut spikes = Vec::new();
        let mut last_peak_time = f64::NEG_INFINITY;
        let mut in_spike = false;
        let mut start_idx = 0;

        for (idx, &value) in series.iter().enumerate() {
            if value >= threshold && !in_spike {
                in_spike = true;
                start_idx = if buffer_buckets > 0 {
                    find_rising_start(series, idx, buffer_buckets)
                } else {
                    idx
                };
            } else if value < threshold && in_spike {
                if let Some(spike) =
                    self.close_interval(time_axis, series, start_idx, idx, last_peak_time)
                {
                    last_peak_time = spike.peak_time;
                    spikes.push(spike);
                }
                in_spike = false;
            }
        }

        if in_spike {
            if let Some(spike) =
                self.close_interval(time_axis, series, start_idx, len, last_peak_time)
            {
                spikes.push(spike);
            }
        }

        tracing::debug!(
            samples = len,
            threshold = threshold,
            spikes = spikes.len(),
            "📈 Spike detection finished"
        );

        spikes
    }

    fn buffer_buckets(&self, bucket_interval: f64) -> usize {
        if self.pre_start_buffer_seconds <= 0.0 {
            return 0;
        }
        let buckets =
            (self.pre_start_buffer_seconds / bucket_interval.max(MIN_STD)).round_ties_even();
        buckets.max(1.0) as usize
    }

    /// Reduce `[start, end)` to a spike, or `None` when the gap rule rejects it.
    fn close_interval(
        &self,
        time_axis: &[f64],
        series: &[f64],
        start: usize,
        end: usize,
        last_peak_time: f64,
    ) -> Option<Spike> {
        let peak_idx = start + argmax(&series[start..end]);
        let peak_time = time_axis[peak_idx];
        if peak_time - last_peak_time >= self.min_gap_seconds {
            Some(Spike {
                start_time: time_axis[start],
                peak_time,
                peak_value: series[peak_idx],
            })
        } else {
            tracing::trace!(
                peak_time = peak_time,
                last_peak_time = last_peak_time,
                "Spike rejected by minimum gap"
            );
            None
        }
    }
}

/// Median of the strictly positive steps of `time_axis`, or `1.0` when there
/// are none.
pub fn estimate_bucket_interval(time_axis: &[f64]) -> f64 {
    if time_axis.len() < 2 {
        return 1.0;
    }
    let mut diffs: Vec<f64> = time_axis
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|diff| *diff > 0.0)
        .collect();
    if diffs.is_empty() {
        return 1.0;
    }
    diffs.sort_by(f64::total_cmp);
    let mid = diffs.len() / 2;
    if diffs.len() % 2 == 0 {
        (diffs[mid - 1] + diffs[mid]) / 2.0
    } else {
        diffs[mid]
    }
}

/// Population mean and standard deviation.
fn mean_and_std(series: &[f64]) -> (f64, f64) {
    if series.is_empty() {
        return (0.0, 0.0);
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = idx;
        }
    }
    best
}

/// Walk back from the crossing point while the series keeps rising towards
/// it, at most `buffer_buckets` steps.
fn find_rising_start(series: &[f64], idx: usize, buffer_buckets: usize) -> usize {
    let lower_bound = idx.saturating_sub(buffer_buckets);
    let mut cursor = idx;
    while cursor > lower_bound && series[cursor - 1] <= series[cursor] {
        cursor -= 1;
    }
    cursor
}
