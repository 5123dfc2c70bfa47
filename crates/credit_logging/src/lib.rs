//! Shared logging setup for the credit pipeline binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "credit=info,credit_api=info,credit_worker=info,tower_http=info";
const VERBOSE_LOG_FILTER: &str =
    "credit=debug,credit_api=debug,credit_worker=debug,credit_store=debug,tower_http=debug";
const MAX_LOG_FILES: usize = 5;

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "CREDIT_HOME";

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug output on stderr regardless of `RUST_LOG`.
    pub verbose: bool,
}

/// Install a tracing subscriber writing to stderr and to a daily log file
/// under [`logs_dir`].
///
/// The file filter comes from `RUST_LOG` when set. If the log directory
/// cannot be created only stderr is used. Keep the returned guard alive for
/// the life of the process or buffered file output is lost.
pub fn init_logging(config: LogConfig<'_>) -> Result<Option<WorkerGuard>> {
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        file_filter.clone()
    };

    let mut guard = None;
    let file_layer = match ensure_logs_dir().and_then(|dir| file_appender(&dir, config.app_name)) {
        Ok(appender) => {
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter),
            )
        }
        Err(err) => {
            eprintln!("Warning: file logging disabled: {err:#}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Daily `<app>.<date>.log` files in `dir`, keeping the newest few.
fn file_appender(dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Home directory of the service: `$CREDIT_HOME` or `~/.credit_engine`.
pub fn credit_home() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        if !override_path.trim().is_empty() {
            return Ok(PathBuf::from(override_path));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".credit_engine"))
        .context("Could not determine home directory; set CREDIT_HOME")
}

/// `~/.credit_engine/logs`
pub fn logs_dir() -> Result<PathBuf> {
    Ok(credit_home()?.join("logs"))
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir()?;
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "credit".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn app_names_become_file_names() {
        assert_eq!(sanitize_name("credit serve"), "credit_serve");
        assert_eq!(sanitize_name("../x"), "___x");
        assert_eq!(sanitize_name(""), "credit");
    }

    #[test]
    fn file_appender_writes_into_the_log_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut appender = file_appender(tmp.path(), "credit serve").unwrap();
        appender.write_all(b"ready\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
        assert!(names[0].starts_with("credit_serve."), "{names:?}");
        assert!(names[0].ends_with(".log"), "{names:?}");
    }
}
