//! Console and rotating file log output

use std::fs;
use std::io;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    Directory(#[from] io::Error),

    #[error("Failed to open log file: {0}")]
    File(#[from] InitError),

    #[error("Global subscriber already installed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Console filter: `RUST_LOG` when set, otherwise info (debug with `verbose`)
pub fn console_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Console output: the message and its fields, no timestamp or level
pub fn console_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_ansi(false)
}

/// Install the global subscriber
///
/// Everything at debug and above goes to the rotating file under
/// `config.directory`; the console gets [`console_filter`]. Keep the
/// returned guard alive until exit or buffered file lines are lost.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard, LoggingError> {
    fs::create_dir_all(&config.directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.file_prefix.as_str())
        .filename_suffix("log")
        .max_log_files(config.max_files)
        .build(&config.directory)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(true)
        .with_filter(LevelFilter::DEBUG);

    let console = console_layer(io::stderr).with_filter(console_filter(config.verbose));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console)
        .try_init()?;

    tracing::debug!(
        directory = %config.directory.display(),
        max_files = config.max_files,
        verbose = config.verbose,
        "Logging initialized"
    );

    Ok(guard)
}
