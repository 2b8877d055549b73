//! Startup between a loaded config and the first fetch.
//!
//! Every failure here is an initialization failure: it is posted once to
//! `init/error` and returned so the process can exit.

use std::time::Duration;

use tracing::info;

use crate::client::RuntimeClient;
use crate::config::{self, RuntimeConfig};
use crate::context::ContextBuilder;
use crate::error::RuntimeError;
use crate::handler::{self, ModuleRegistry};
use crate::logger::{self, LogHandle};
use crate::reporter::ErrorReporter;
use crate::runtime::Runtime;

/// Connect, apply the configured log level and resolve the handler.
///
/// `log` is the handle of the already installed subscriber, if any; the level
/// is validated either way.
pub fn start(
    config: &RuntimeConfig,
    registry: &ModuleRegistry,
    log: Option<&LogHandle>,
) -> Result<Runtime<RuntimeClient>, RuntimeError> {
    let client = RuntimeClient::new(config.base_url(), config.connect_timeout)?;

    let applied = logger::parse_level(&config.log_level).and_then(|_| match log {
        Some(handle) => handle.set_level(&config.log_level, false),
        None => Ok(()),
    });
    if let Err(e) = applied {
        ErrorReporter::new(&client).init_failed(&e);
        return Err(e);
    }

    info!(
        handler = %config.handler,
        runtime_api = %config.runtime_api,
        function = %config.function.function_name,
        memory_mb = config.function.memory_limit_mb,
        "config loaded"
    );

    let descriptor = match handler::resolve(registry, &config.handler) {
        Ok(d) => d,
        Err(e) => {
            ErrorReporter::new(&client).init_failed(&e);
            return Err(e);
        }
    };

    Ok(Runtime::new(client, descriptor, ContextBuilder::new(config.function.clone())))
}

/// Post an initialization failure that happened before a config existed.
///
/// Nothing is sent when the endpoint address itself is unknown.
pub fn report_without_config(err: &RuntimeError, runtime_api: Option<&str>) {
    let Some(api) = runtime_api else {
        return;
    };
    let base = config::runtime_url(api, &config::default_api_version());
    let timeout = Duration::from_millis(config::default_connect_timeout_ms());
    if let Ok(client) = RuntimeClient::new(base, timeout) {
        ErrorReporter::new(&client).init_failed(err);
    }
}
