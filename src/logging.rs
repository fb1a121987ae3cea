use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::models::AppSettings;

/// Default file prefix for dmgee logs.
pub const LOG_PREFIX: &str = "dmgee";

/// Where log files go: the settings' log directory, relative paths resolved
/// against the config directory.
pub fn resolve_log_dir(settings: &AppSettings, config_dir: &Utf8Path) -> Utf8PathBuf {
    let dir = Utf8PathBuf::from(settings.log_dir.trim());
    if dir.as_str().is_empty() {
        config_dir.join("logs")
    } else if dir.is_relative() {
        config_dir.join(dir)
    } else {
        dir
    }
}

fn create_log_dir(log_dir: &str) -> Result<()> {
    let log_path = Utf8PathBuf::from(log_dir);
    if !log_path.exists() {
        fs::create_dir_all(&log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}

/// `RUST_LOG` if set, otherwise `debug` or `info`.
fn env_filter(debug_mode: bool) -> EnvFilter {
    let default_level = if debug_mode { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Setup logging with a daily rotating file appender.
///
/// # Arguments
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_prefix` - Prefix for log files (e.g., "dmgee")
/// * `debug_mode` - If true, use debug level; otherwise use info level
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    setup_logging_with_console(log_dir, log_prefix, debug_mode, false)
}

/// Setup logging with optional console output.
///
/// Console output goes to stderr so that it never mixes with command output
/// on stdout.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging_with_console(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    create_log_dir(log_dir)?;

    let file_appender = rolling::daily(log_dir, log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        log_dir,
        log_prefix,
        debug_mode,
        console_output
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    #[allow(unused_variables)]
    fn test_setup_logging() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let log_dir = log_dir.to_str().unwrap();

        // Another test may already own the global subscriber, so only the
        // directory is checked
        let result = setup_logging(log_dir, "test", false);

        assert!(Utf8PathBuf::from(log_dir).exists());
    }

    #[test]
    fn test_resolve_log_dir() {
        let config_dir = Utf8Path::new("/home/user/.config/dmgee");
        let mut settings = AppSettings::default();

        assert_eq!(
            resolve_log_dir(&settings, config_dir),
            Utf8PathBuf::from("/home/user/.config/dmgee/logs")
        );

        settings.log_dir = "/var/log/dmgee".to_string();
        assert_eq!(
            resolve_log_dir(&settings, config_dir),
            Utf8PathBuf::from("/var/log/dmgee")
        );

        settings.log_dir = "  ".to_string();
        assert_eq!(
            resolve_log_dir(&settings, config_dir),
            Utf8PathBuf::from("/home/user/.config/dmgee/logs")
        );
    }

    #[test]
    fn test_create_log_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("nested/logs");
        let log_dir = log_dir.to_str().unwrap();

        create_log_dir(log_dir).unwrap();
        create_log_dir(log_dir).unwrap();

        assert!(Utf8PathBuf::from(log_dir).exists());
    }
}
