//! Structured logging for the quill command
//!
//! Documents go to stdout, so console logs always go to stderr. Settings come
//! from [`LoggingConfig`], which already folds in `RUST_LOG`, `LOG_FORMAT`,
//! `LOG_OUTPUT` and `LOG_DIR`.

use anyhow::Context;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line events
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    /// Daily-rotated files under the log directory
    File,
    Both,
}

impl LogOutput {
    pub fn parse(value: &str) -> Self {
        match value {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stderr,
        }
    }
}

fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    }
}

fn file_appender(config: &LoggingConfig) -> anyhow::Result<RollingFileAppender> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("creating log directory {}", config.directory))?;
    Ok(RollingFileAppender::new(Rotation::DAILY, &config.directory, "quill.log"))
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let format = LogFormat::parse(&config.format);
    let output = LogOutput::parse(&config.output);

    let env_filter = EnvFilter::try_new(&config.level)
        .or_else(|_| EnvFilter::try_new("warn"))
        .context("building log filter")?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match output {
        LogOutput::Stderr => registry.with(console_layer(format)).try_init()?,
        LogOutput::File => {
            let file_layer = fmt::layer()
                .with_writer(file_appender(config)?)
                .with_ansi(false);
            registry.with(file_layer).try_init()?
        }
        LogOutput::Both => {
            let file_layer = fmt::layer()
                .with_writer(file_appender(config)?)
                .with_ansi(false)
                .boxed();
            registry
                .with(console_layer(format))
                .with(file_layer)
                .try_init()?
        }
    }

    tracing::debug!(format = ?format, output = ?output, level = %config.level, "logging initialized");
    Ok(())
}
