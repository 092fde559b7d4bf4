//! Presentation of analysis results: ranked spikes with jump URLs.

use crate::analytics::pipeline::AnalysisResult;
use crate::api::youtube::extract_video_id;
use crate::models::{RateSeries, Spike};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// ジャンプURL付きのスパイク
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeReport {
    pub start_time: f64,
    pub peak_time: f64,
    pub peak_value: f64,
    pub jump_url: String,
}

/// 表示用の解析レポート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<RateSeries>,
    /// `peak_value` の降順
    pub spikes: Vec<SpikeReport>,
}

impl AnalysisReport {
    pub fn without_series(mut self) -> Self {
        self.series = None;
        self
    }
}

/// Rank spikes by peak value (highest first) and attach a jump URL to each.
pub fn format_report(url: &str, result: &AnalysisResult) -> AnalysisReport {
    let mut spikes: Vec<&Spike> = result.spikes.iter().collect();
    spikes.sort_by(|a, b| b.peak_value.total_cmp(&a.peak_value));

    AnalysisReport {
        series: Some(result.series.clone()),
        spikes: spikes
            .into_iter()
            .map(|spike| SpikeReport {
                start_time: spike.start_time,
                peak_time: spike.peak_time,
                peak_value: spike.peak_value,
                jump_url: build_jump_url(url, spike.start_time),
            })
            .collect(),
    }
}

/// `url` with its `t` query parameter set to `<whole seconds>s`.
///
/// Other query parameters keep their order; an existing `t` is replaced in
/// place. A bare video id is expanded to a watch URL first, and a URL without
/// a scheme keeps its original shape.
pub fn build_jump_url(url: &str, timestamp_seconds: f64) -> String {
    let offset = format!("{}s", timestamp_seconds.max(0.0).trunc() as u64);

    if let Ok(mut parsed) = Url::parse(url) {
        set_offset(&mut parsed, offset);
        return parsed.to_string();
    }

    if let Some(video_id) = extract_video_id(url) {
        return format!("https://www.youtube.com/watch?v={}&t={}", video_id, offset);
    }

    match Url::parse(&format!("https://{}", url)) {
        Ok(mut parsed) => {
            set_offset(&mut parsed, offset);
            let rewritten = parsed.to_string();
            match rewritten.strip_prefix("https://") {
                Some(schemeless) => schemeless.to_string(),
                None => rewritten.clone(),
            }
        }
        Err(_) => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{}{}t={}", url, separator, offset)
        }
    }
}

fn set_offset(parsed: &mut Url, offset: String) {
    let mut pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    match pairs.iter_mut().find(|(key, _)| key == "t") {
        Some(pair) => pair.1 = offset,
        None => pairs.push(("t".to_string(), offset)),
    }
    parsed.query_pairs_mut().clear().extend_pairs(&pairs);
}
