//! Logging via tracing-subscriber.
//!
//! The subscriber is installed before configuration is read so startup can
//! log at `info`; [`LogHandle::set_level`] swaps in the configured level once
//! it is known. Lines go to stderr without colour codes, which the platform
//! forwards verbatim to the function's log stream.

use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use crate::error::RuntimeError;

/// Level used until the configured one is applied.
pub const BOOTSTRAP_LEVEL: &str = "info";

/// Changes the active filter of the installed subscriber.
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: &str, prefer_level: bool) -> Result<(), RuntimeError> {
        let filter = filter(level, prefer_level)?;
        self.filter
            .reload(filter)
            .map_err(|e| RuntimeError::Logger(format!("failed to apply log level '{level}': {e}")))
    }
}

/// Install the global subscriber writing to stderr.
///
/// If `prefer_level` is `true`, `level` wins and `RUST_LOG` is the fallback;
/// otherwise `RUST_LOG` wins and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<LogHandle, RuntimeError> {
    let (subscriber, handle) = build(level, prefer_level, std::io::stderr)?;
    subscriber
        .try_init()
        .map_err(|e| RuntimeError::Logger(format!("failed to set subscriber: {e}")))?;
    Ok(handle)
}

/// Validate a level string before it reaches the filter.
pub fn parse_level(level: &str) -> Result<LevelFilter, RuntimeError> {
    if level.is_empty() {
        return Err(RuntimeError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| RuntimeError::Logger(format!("unrecognised log level: '{level}'")))
}

fn build<W>(
    level: &str,
    prefer_level: bool,
    writer: W,
) -> Result<(impl Subscriber + Send + Sync + use<W>, LogHandle), RuntimeError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(filter(level, prefer_level)?);
    let subscriber = tracing_subscriber::registry().with(filter).with(plain_lines(writer));
    Ok((subscriber, LogHandle { filter: handle }))
}

fn plain_lines<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer().with_writer(writer).with_ansi(false)
}

fn filter(level: &str, prefer_level: bool) -> Result<EnvFilter, RuntimeError> {
    if prefer_level {
        match EnvFilter::try_new(level) {
            Ok(filter) => Ok(filter),
            Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
                RuntimeError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            }),
        }
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| RuntimeError::Logger(format!("invalid log level '{level}': {e}")))
    }
}
