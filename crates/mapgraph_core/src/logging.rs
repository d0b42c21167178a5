//! Logging bootstrap for hosts embedding the graph core.
//!
//! # Responsibility
//! - Install one size-rotated file logger per process.
//! - Keep graph events metadata-only (`event=... module=... status=...`).
//!
//! # Invariants
//! - A second `init_logging` with the same level and directory is a no-op;
//!   any other second call is rejected and the first logger stays active.
//! - Initialization never panics.
//! - Core operations log through `log` macros only and work without any
//!   logger installed.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "mapgraph";

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    level: LevelFilter,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

/// Settings for [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LevelFilter,
    /// Absolute directory receiving `mapgraph*.log` files.
    pub log_dir: PathBuf,
    /// Size at which the active file is rotated.
    pub max_file_bytes: u64,
    /// Rotated files kept on disk.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: std::env::temp_dir().join("mapgraph-logs"),
            max_file_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

impl LoggingConfig {
    /// Default settings writing into `log_dir`.
    pub fn in_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), String> {
        if !self.log_dir.is_absolute() {
            return Err(format!(
                "log_dir must be an absolute path, got `{}`",
                self.log_dir.display()
            ));
        }
        if self.max_file_bytes == 0 || self.max_files == 0 {
            return Err("log rotation limits must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Starts file logging for the process.
///
/// # Errors
/// - `log_dir` is relative or cannot be created.
/// - A rotation limit is zero.
/// - Logging is already active with another level or directory.
/// - The logger backend fails to start.
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    config.check()?;
    let active = ACTIVE.get_or_try_init(|| start(config))?;
    matches_active(active, config.level, &config.log_dir)
}

fn start(config: &LoggingConfig) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&config.log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            config.log_dir.display()
        )
    })?;

    let handle = Logger::with(LogSpecification::builder().default(config.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(config.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(config.max_file_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.max_files),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    info!(
        "event=core_init module=core status=ok level={} log_dir={} version={}",
        config.level,
        config.log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(ActiveLogger {
        level: config.level,
        log_dir: config.log_dir.clone(),
        _handle: handle,
    })
}

fn matches_active(active: &ActiveLogger, level: LevelFilter, log_dir: &Path) -> Result<(), String> {
    if active.log_dir != log_dir {
        return Err(format!(
            "logging already writes to `{}`; refusing to switch to `{}`",
            active.log_dir.display(),
            log_dir.display()
        ));
    }
    if active.level != level {
        return Err(format!(
            "logging already runs at `{}`; refusing to switch to `{}`",
            active.level, level
        ));
    }
    Ok(())
}

/// `(level, log_dir)` of the active logger, or `None` before init.
pub fn logging_status() -> Option<(LevelFilter, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.log_dir.clone()))
}

/// `Debug` for debug builds, `Info` for release builds.
pub fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, LoggingConfig};
    use log::LevelFilter;

    #[test]
    fn relative_dir_is_rejected() {
        let error = init_logging(&LoggingConfig::in_dir("logs/dev"))
            .expect_err("relative paths must be rejected");
        assert!(error.contains("absolute"));
    }

    #[test]
    fn zero_rotation_limits_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LoggingConfig {
            max_files: 0,
            ..LoggingConfig::in_dir(dir.path())
        };
        let error = init_logging(&config).expect_err("zero file count must fail");
        assert!(error.contains("greater than zero"));
    }

    #[test]
    fn init_logging_is_idempotent_for_same_config_and_rejects_conflicts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let other = tempfile::tempdir().expect("tempdir");
        let config = LoggingConfig {
            level: LevelFilter::Info,
            ..LoggingConfig::in_dir(dir.path())
        };

        init_logging(&config).expect("first init should succeed");
        init_logging(&config).expect("same config should be idempotent");

        let level_error = init_logging(&LoggingConfig {
            level: LevelFilter::Trace,
            ..config.clone()
        })
        .expect_err("level conflict should fail");
        assert!(level_error.contains("refusing to switch"));

        let dir_error = init_logging(&LoggingConfig {
            log_dir: other.path().to_path_buf(),
            ..config.clone()
        })
        .expect_err("directory conflict should fail");
        assert!(dir_error.contains("refusing to switch"));

        let (active_level, active_dir) = logging_status().expect("logging should be active");
        assert_eq!(active_level, LevelFilter::Info);
        assert_eq!(active_dir, dir.path());
    }
}
