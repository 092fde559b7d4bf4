use serde::{Deserialize, Serialize};

/// チャットイベント
///
/// Chat Sourceからのみ生成され、以降は変更されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// 動画先頭からの経過秒数
    pub timestamp_seconds: f64,
    /// メッセージ本文
    pub text: String,
    /// 投稿者がバッジを持っているか
    pub is_member: bool,
}

impl ChatEvent {
    pub fn new(timestamp_seconds: f64, text: impl Into<String>, is_member: bool) -> Self {
        Self {
            timestamp_seconds,
            text: text.into(),
            is_member,
        }
    }
}

/// 並列取得用の時間区間 `[start, end)`
///
/// `end_seconds` が `None` の場合は配信の終わりまで。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_seconds: u64,
    pub end_seconds: Option<u64>,
}

impl Segment {
    pub fn new(start_seconds: u64, end_seconds: Option<u64>) -> Self {
        Self {
            start_seconds,
            end_seconds,
        }
    }

    /// 区間の長さ（終端なしの場合は `None`）
    pub fn len_seconds(&self) -> Option<u64> {
        self.end_seconds
            .map(|end| end.saturating_sub(self.start_seconds))
    }
}

/// メッセージ数の時系列
///
/// 全ての系列は同じ長さを持つ。`time_axis` は狭義単調増加だが等間隔とは限らない:
/// イベントが一件もないバケットは出力されないため、無音区間は `time_axis` の
/// 飛びとして現れ、値0のサンプルにはならない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSeries {
    pub time_axis: Vec<f64>,
    pub total: Vec<f64>,
    pub member: Vec<f64>,
    pub keyword: Vec<f64>,
    pub smoothed_total: Vec<f64>,
    pub smoothed_keyword: Vec<f64>,
}

impl RateSeries {
    pub fn len(&self) -> usize {
        self.time_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_axis.is_empty()
    }
}

/// 検出されたスパイク
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    /// 立ち上がり開始時刻（秒）
    pub start_time: f64,
    /// ピーク時刻（秒）
    pub peak_time: f64,
    /// ピーク時の平滑化値
    pub peak_value: f64,
}

/// 取得進捗
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FetchProgress {
    /// これまでに取得したイベント数（累積）
    pub processed: usize,
    /// 直近に取得したイベントのタイムスタンプ
    ///
    /// 並列取得中は区間の完了順に報告されるため単調とは限らない。
    pub last_timestamp: Option<f64>,
}
