// ログ・表示用ユーティリティ

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログ初期化
///
/// `RUST_LOG` があればそれを優先し、なければ `default_level` を使う。
/// 出力は stderr（stdout は JSON 出力専用）。
pub fn init_logging(default_level: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    subscriber.try_init()?;

    Ok(())
}

/// 進捗表示用の短いラベル（`processed=1200 last=0:12:34`）
pub fn describe_progress(progress: &crate::models::FetchProgress) -> String {
    match progress.last_timestamp {
        Some(ts) => format!(
            "processed={} last={}",
            progress.processed,
            crate::fetch::segments::format_seconds(ts.max(0.0) as u64)
        ),
        None => format!("processed={}", progress.processed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchProgress;

    #[test]
    fn test_describe_progress() {
        let progress = FetchProgress {
            processed: 1200,
            last_timestamp: Some(754.9),
        };
        assert_eq!(describe_progress(&progress), "processed=1200 last=0:12:34");

        let progress = FetchProgress {
            processed: 0,
            last_timestamp: None,
        };
        assert_eq!(describe_progress(&progress), "processed=0");
    }
}
