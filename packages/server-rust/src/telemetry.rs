//! `tracing-subscriber` setup for binaries.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `--log-filter` nor `RUST_LOG` is given.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Builds the filter: an explicit directive wins, then `RUST_LOG`, then
/// [`DEFAULT_LOG_FILTER`].
///
/// # Errors
///
/// Returns an error if `directive` is not a valid filter.
pub fn env_filter(directive: Option<&str>) -> anyhow::Result<EnvFilter> {
    match directive {
        Some(directive) => Ok(EnvFilter::try_new(directive)?),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))),
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout stays free for
/// the response envelope.
///
/// # Errors
///
/// Returns an error for an invalid filter or if a global subscriber is
/// already installed.
pub fn init_tracing(format: LogFormat, directive: Option<&str>) -> anyhow::Result<()> {
    let filter = env_filter(directive)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
