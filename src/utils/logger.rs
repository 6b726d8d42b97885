use crate::domain::ports::ProgressReporter;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// RUST_LOG 優先，其次 --verbose，再來是設定檔的 level
fn default_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    let fallback = match (verbose, level) {
        (true, _) => "popcraft=debug,info".to_string(),
        (false, Some(level)) => format!("popcraft={}", level.to_lowercase()),
        (false, None) => "popcraft=info".to_string(),
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// 開啟日誌檔（啟動時清空），失敗時回傳 None 並只輸出到終端
fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && std::fs::create_dir_all(parent).is_err() {
            return None;
        }
    }
    File::create(path).ok()
}

pub fn init_cli_logger(
    verbose: bool,
    level: Option<&str>,
    format: LogFormat,
    log_file: Option<&Path>,
) {
    let console = match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json()
            .boxed(),
    };

    // 檔案日誌不使用 ANSI 色碼
    let file_layer = log_file.and_then(open_log_file).map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(default_filter(verbose, level))
        .with(console)
        .with(file_layer)
        .init();
}

/// 以日誌回報進度，每 10% 一行
#[derive(Debug, Default)]
pub struct LogProgress {
    last_step: AtomicU8,
}

impl ProgressReporter for LogProgress {
    fn progress(&self, label: &str, percent: u8) {
        let step = percent.min(100) / 10;
        if percent == 0 {
            self.last_step.store(0, Ordering::Relaxed);
            return;
        }
        if self.last_step.swap(step, Ordering::Relaxed) != step {
            tracing::info!("⏳ {}: {}%", label, percent.min(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_progress_tracks_steps() {
        let progress = LogProgress::default();
        progress.progress("x", 0);
        progress.progress("x", 15);
        assert_eq!(progress.last_step.load(Ordering::Relaxed), 1);
        progress.progress("x", 200);
        assert_eq!(progress.last_step.load(Ordering::Relaxed), 10);
        progress.progress("x", 0);
        assert_eq!(progress.last_step.load(Ordering::Relaxed), 0);
    }
}
