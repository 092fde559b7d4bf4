//! アプリケーション設定管理モジュール
//!
//! TOML設定ファイルの読み込み・保存、環境変数による上書き、値の検証を提供します。

use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// チャット取得設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// HTTPリクエストのタイムアウト（秒）
    pub request_timeout_seconds: u64,
    /// 取得メッセージ数の上限（未設定なら無制限）
    pub message_limit: Option<usize>,
    /// 逐次取得時に進捗を報告する単位
    pub chunk_size: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 10,
            message_limit: None,
            chunk_size: 1000,
        }
    }
}

impl ChatConfig {
    /// `message_limit = 0` means no limit.
    pub fn effective_limit(&self) -> Option<usize> {
        self.message_limit.filter(|limit| *limit > 0)
    }
}

/// YouTube Data API / 並列取得設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// YouTube Data API v3 キー（並列取得に必須）
    pub api_key: Option<String>,
    /// 並列取得の区間長（秒）。0で並列取得無効
    pub segment_duration_seconds: u64,
    /// 同時に取得する区間数
    pub parallel_segments: usize,
    /// Data API呼び出しのタイムアウト（秒）
    pub api_timeout_seconds: u64,
    /// Data APIのベースURL
    pub api_endpoint: String,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            segment_duration_seconds: 900,
            parallel_segments: 1,
            api_timeout_seconds: 10,
            api_endpoint: "https://www.googleapis.com/youtube/v3".to_string(),
        }
    }
}

impl YoutubeConfig {
    /// The API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// メッセージ数集計設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpsConfig {
    pub bucket_size_seconds: f64,
    pub smoothing_window_seconds: f64,
    pub smoothing_average_window: usize,
}

impl Default for CpsConfig {
    fn default() -> Self {
        Self {
            bucket_size_seconds: 5.0,
            smoothing_window_seconds: 30.0,
            smoothing_average_window: 6,
        }
    }
}

/// スパイク検出設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    pub min_prominence: f64,
    pub min_gap_seconds: f64,
    pub pre_start_buffer_seconds: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            min_prominence: 2.0,
            min_gap_seconds: 10.0,
            pre_start_buffer_seconds: 10.0,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub youtube: YoutubeConfig,
    pub cps: CpsConfig,
    pub spike: SpikeConfig,
}

impl AppConfig {
    /// 環境変数で設定を上書き
    ///
    /// `lookup` returns the raw value of an environment variable.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup("YOUTUBE_API_KEY") {
            self.youtube.api_key = Some(api_key);
        }
        override_parsed(
            &lookup,
            "YOUTUBE_SEGMENT_DURATION_SECONDS",
            &mut self.youtube.segment_duration_seconds,
        )?;
        override_parsed(
            &lookup,
            "YOUTUBE_PARALLEL_SEGMENTS",
            &mut self.youtube.parallel_segments,
        )?;
        override_parsed(
            &lookup,
            "YOUTUBE_API_TIMEOUT",
            &mut self.youtube.api_timeout_seconds,
        )?;
        override_parsed(
            &lookup,
            "CHATDOWNLOADER_REQUEST_TIMEOUT",
            &mut self.chat.request_timeout_seconds,
        )?;
        override_parsed(
            &lookup,
            "CPS_BUCKET_SIZE_SECONDS",
            &mut self.cps.bucket_size_seconds,
        )?;
        override_parsed(
            &lookup,
            "CPS_SMOOTHING_WINDOW_SECONDS",
            &mut self.cps.smoothing_window_seconds,
        )?;
        override_parsed(
            &lookup,
            "CPS_SMOOTHING_AVERAGE_WINDOW",
            &mut self.cps.smoothing_average_window,
        )?;
        override_parsed(
            &lookup,
            "SPIKE_MIN_PROMINENCE",
            &mut self.spike.min_prominence,
        )?;
        override_parsed(
            &lookup,
            "SPIKE_MIN_GAP_SECONDS",
            &mut self.spike.min_gap_seconds,
        )?;
        override_parsed(
            &lookup,
            "SPIKE_PRE_START_BUFFER_SECONDS",
            &mut self.spike.pre_start_buffer_seconds,
        )?;
        Ok(())
    }

    /// 設定値を検証
    pub fn validate(&self) -> Result<()> {
        let cps = &self.cps;
        ensure!(
            cps.bucket_size_seconds.is_finite() && cps.bucket_size_seconds > 0.0,
            "cps.bucket_size_seconds must be greater than 0 (got {})",
            cps.bucket_size_seconds
        );
        ensure!(
            cps.smoothing_window_seconds >= 0.0,
            "cps.smoothing_window_seconds must not be negative (got {})",
            cps.smoothing_window_seconds
        );
        ensure!(
            cps.smoothing_average_window >= 1,
            "cps.smoothing_average_window must be at least 1"
        );

        let spike = &self.spike;
        ensure!(
            spike.min_prominence >= 0.0,
            "spike.min_prominence must not be negative (got {})",
            spike.min_prominence
        );
        ensure!(
            spike.min_gap_seconds >= 0.0,
            "spike.min_gap_seconds must not be negative (got {})",
            spike.min_gap_seconds
        );
        ensure!(
            spike.pre_start_buffer_seconds >= 0.0,
            "spike.pre_start_buffer_seconds must not be negative (got {})",
            spike.pre_start_buffer_seconds
        );

        ensure!(
            self.youtube.parallel_segments >= 1,
            "youtube.parallel_segments must be at least 1"
        );
        ensure!(self.chat.chunk_size >= 1, "chat.chunk_size must be at least 1");
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
        debug!("Config override from environment: {}", key);
    }
    Ok(())
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDGディレクトリの設定ファイルを使う設定マネージャーを作成
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: Self::default_config_path()?,
        })
    }

    /// 指定したパスの設定ファイルを使う
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    fn default_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("dev", "sifyfy", "kirinuki")
            .context("Failed to get project directories")?;

        let config_file = project_dirs.config_dir().join("config.toml");
        debug!("Config file path: {}", config_file.display());

        Ok(config_file)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 設定ファイルが存在するかチェック
    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }

    /// ファイルのみから設定を読み込み（環境変数は適用しない）
    pub fn load_file(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config: AppConfig = toml::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })?;

        info!(
            "✅ Configuration loaded from: {}",
            self.config_path.display()
        );

        Ok(config)
    }

    /// 設定を読み込み（ファイル → 環境変数 → 検証）
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = self.load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", self.config_path.display()))?;
        Ok(config)
    }

    /// 設定を保存
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let config_content =
            toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.config_path, config_content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;

        info!("💾 Configuration saved to: {}", self.config_path.display());

        Ok(())
    }
}
