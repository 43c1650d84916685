use chrono::{NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_SUFFIX: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub process: String,
    pub logs_dir: PathBuf,
    pub retention_days: u64,
}

impl LogOptions {
    pub fn new(process: impl Into<String>, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            process: process.into(),
            logs_dir: logs_dir.into(),
            retention_days: 14,
        }
    }

    fn file_prefix(&self) -> String {
        format!("chatloom.{}", self.process)
    }
}

/// Message content never lands in logs verbatim; log this instead.
pub fn redact_text(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!(
        "[redacted len={} hash={}]",
        trimmed.len(),
        short_hash(trimmed)
    )
}

pub fn short_hash(input: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Installs a compact console layer plus a daily-rolling JSON file layer,
/// sweeping out log files older than the retention window first. The
/// returned guard must be held for the process lifetime or buffered log
/// lines are lost.
pub fn init_logging(options: &LogOptions) -> anyhow::Result<WorkerGuard> {
    fs::create_dir_all(&options.logs_dir)?;
    let prefix = options.file_prefix();
    remove_expired_logs(&options.logs_dir, &prefix, options.retention_days)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(&prefix)
        .filename_suffix(LOG_SUFFIX)
        .build(&options.logs_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_ansi(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_current_span(false)
                .with_span_list(false),
        )
        .try_init()
        .ok();

    Ok(guard)
}

fn remove_expired_logs(logs_dir: &Path, prefix: &str, retention_days: u64) -> anyhow::Result<()> {
    let cutoff = Utc::now().date_naive() - chrono::Duration::days(retention_days as i64);
    for entry in fs::read_dir(logs_dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let expired = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| log_file_date(name, prefix))
            .map_or(false, |date| date < cutoff);
        if expired {
            let _ = fs::remove_file(path);
        }
    }
    Ok(())
}

/// Extracts the rotation date from a `<prefix>.YYYY-MM-DD.jsonl` file name.
/// Anything else (foreign files, other processes' logs) yields `None` and is
/// left alone by the sweep.
fn log_file_date(name: &str, prefix: &str) -> Option<NaiveDate> {
    let date_part = name
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(LOG_SUFFIX)?
        .strip_suffix('.')?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub fn canonical_logs_dir_from_root(root: &Path) -> PathBuf {
    root.join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_text_masks_content() {
        let raw = "tell me a secret";
        let redacted = redact_text(raw);
        assert!(redacted.contains("[redacted len="));
        assert!(!redacted.contains("secret"));
        assert_eq!(redact_text("   "), "");
    }

    #[test]
    fn rotated_file_names_parse_to_their_date() {
        let date = log_file_date("chatloom.core.2026-08-01.jsonl", "chatloom.core");
        assert_eq!(
            date,
            NaiveDate::from_ymd_opt(2026, 8, 1)
        );
    }

    #[test]
    fn foreign_files_are_not_sweep_candidates() {
        assert!(log_file_date("chatloom.core.2026-08-01.jsonl", "chatloom.tui").is_none());
        assert!(log_file_date("chatloom.core.2026-08-01.log", "chatloom.core").is_none());
        assert!(log_file_date("chatloom.core.not-a-date.jsonl", "chatloom.core").is_none());
        assert!(log_file_date("notes.txt", "chatloom.core").is_none());
    }

    #[test]
    fn canonical_logs_dir_joins_logs_folder() {
        let root = PathBuf::from("/tmp/chatloom");
        let logs = canonical_logs_dir_from_root(&root);
        assert_eq!(logs, PathBuf::from("/tmp/chatloom").join("logs"));
    }
}
