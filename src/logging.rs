//! Logging setup for the `ddmlp` binary and embedding applications.
//!
//! Installs a global tracing subscriber writing to the console and to a per-launch
//! log file under `.ddmlp/logs`. At most [`MAX_LOG_FILES`] files are kept.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, fmt::writer::BoxMakeWriter, prelude::*};

use crate::app_dirs;
use crate::timestamp::now_local_or_utc;

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "ddmlp";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// No platform-specific data directory could be resolved.
    #[error("No suitable data directory available for logs")]
    NoDataDir,
    /// Failed to create or access the log directory.
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to enumerate existing log files for pruning.
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to remove an obsolete log file.
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to format a timestamp for the log filename.
    #[error("Failed to format log filename time: {0}")]
    FormatTime(time::error::Format),
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
    /// Failed to create the initial log file for this launch.
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Options for [`init_with`].
#[derive(Clone, Debug)]
pub struct LogOptions {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or `ddmlp=debug`.
    pub default_filter: String,
    /// Also write a per-launch log file under `.ddmlp/logs`.
    pub file: bool,
    /// Stream receiving console log lines.
    pub console: Console,
}

/// Console stream for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Console {
    #[default]
    Stdout,
    /// Keeps stdout free for program output.
    Stderr,
}

impl Console {
    fn writer(self) -> BoxMakeWriter {
        match self {
            Self::Stdout => BoxMakeWriter::new(std::io::stdout),
            Self::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            file: true,
            console: Console::Stdout,
        }
    }
}

/// Initialize tracing with [`LogOptions::default`].
pub fn init() -> Result<(), LoggingError> {
    init_with(LogOptions::default())
}

/// Initialize tracing to write to the console and, optionally, a per-launch log file.
///
/// Subsequent calls are no-ops. Library users that install their own
/// subscriber should skip this; the façade only emits `tracing` events.
pub fn init_with(options: LogOptions) -> Result<(), LoggingError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let timer = build_timer();
    let env_filter = build_env_filter(&options.default_filter);
    let console_layer = fmt::layer()
        .with_target(false)
        .with_timer(timer.clone())
        .with_writer(options.console.writer());

    let (file_layer, log_path) = if options.file {
        let log_dir = log_directory()?;
        let log_file_name = format_log_file_name(now_local_or_utc())?;
        let log_path = log_dir.join(&log_file_name);
        ensure_file_exists(&log_path)?;

        let file_appender = rolling::never(&log_dir, log_file_name);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        prune_old_logs(&log_dir, MAX_LOG_FILES)?;
        let _ = LOG_GUARD.set(guard);
        let layer = fmt::layer()
            .with_ansi(false)
            .with_thread_ids(true)
            .with_timer(timer)
            .with_writer(file_writer);
        (Some(layer), Some(log_path))
    } else {
        (None, None)
    };

    let subscriber = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = INITIALIZED.set(());

    match log_path {
        Some(path) => tracing::info!("Logging initialized; log file at {}", path.display()),
        None => tracing::debug!("Logging initialized without a log file"),
    }
    Ok(())
}

fn log_directory() -> Result<PathBuf, LoggingError> {
    app_dirs::logs_dir().map_err(map_app_dir_error)
}

fn ensure_file_exists(path: &Path) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.to_path_buf(),
            source,
        })
}

fn prune_old_logs(dir: &Path, max_files: usize) -> Result<(), LoggingError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|source| LoggingError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("log"))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|(modified, _)| *modified);
    while entries.len() > max_files {
        if let Some((_, path)) = entries.first() {
            fs::remove_file(path).map_err(|source| LoggingError::RemoveFile {
                path: path.to_path_buf(),
                source,
            })?;
        }
        entries.remove(0);
    }
    Ok(())
}

fn format_log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let name = now.format(NAME_FORMAT).map_err(LoggingError::FormatTime)?;
    Ok(format!("{LOG_FILE_PREFIX}_{name}.log"))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn build_env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> LoggingError {
    match error {
        app_dirs::AppDirError::NoBaseDir => LoggingError::NoDataDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            LoggingError::CreateDir { path, source }
        }
    }
}
