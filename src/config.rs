//! Configuration loading from the process environment.
//!
//! Required variables come from the platform (`AWS_LAMBDA_RUNTIME_API`,
//! `_HANDLER`); function metadata is optional. An optional TOML overlay
//! named by `CUSTOM_RUNTIME_CONFIG` tunes the runtime itself, and
//! `CUSTOM_RUNTIME_LOG_LEVEL` overrides its log level.

use std::{collections::HashMap, env, fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::RuntimeError;

pub const ENV_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
pub const ENV_HANDLER: &str = "_HANDLER";
pub const ENV_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
pub const ENV_FUNCTION_VERSION: &str = "AWS_LAMBDA_FUNCTION_VERSION";
pub const ENV_LOG_GROUP: &str = "AWS_LAMBDA_LOG_GROUP_NAME";
pub const ENV_LOG_STREAM: &str = "AWS_LAMBDA_LOG_STREAM_NAME";
pub const ENV_MEMORY_SIZE: &str = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE";
pub const ENV_CONFIG_FILE: &str = "CUSTOM_RUNTIME_CONFIG";
pub const ENV_LOG_LEVEL: &str = "CUSTOM_RUNTIME_LOG_LEVEL";

/// Static function metadata surfaced read-only through the execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSettings {
    pub function_name: String,
    pub function_version: String,
    pub log_group: String,
    pub log_stream: String,
    pub memory_limit_mb: u32,
}

/// Fully-resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// `host:port` of the control endpoint.
    pub runtime_api: String,
    /// Handler reference, `<module>.<entry>`.
    pub handler: String,
    pub function: FunctionSettings,
    pub log_level: String,
    /// Path segment between the address and `/runtime/`.
    pub api_version: String,
    /// Connection establishment only; long-poll reads never time out.
    pub connect_timeout: Duration,
}

impl RuntimeConfig {
    /// `http://{runtime_api}/{api_version}/runtime/`
    pub fn base_url(&self) -> String {
        runtime_url(&self.runtime_api, &self.api_version)
    }
}

/// Endpoint base for an address and API version.
pub fn runtime_url(runtime_api: &str, api_version: &str) -> String {
    format!("http://{runtime_api}/{api_version}/runtime/")
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawFile {
    #[serde(default)]
    runtime: RawRuntime,
}

#[derive(Deserialize)]
struct RawRuntime {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_connect_timeout_ms")]
    connect_timeout_ms: u64,
}

impl Default for RawRuntime {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_version: default_api_version(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
pub fn default_api_version() -> String { "2018-06-01".to_string() }
pub fn default_connect_timeout_ms() -> u64 { 2_000 }
fn default_memory_mb() -> u32 { 128 }

/// Load config from the process environment.
pub fn load() -> Result<RuntimeConfig, RuntimeError> {
    let vars: HashMap<String, String> = env::vars().collect();
    let file = vars.get(ENV_CONFIG_FILE).cloned();
    load_from(&vars, file.as_deref().map(Path::new))
}

/// Internal loader; accepts an explicit variable map and overlay path.
/// Tests pass maps directly instead of mutating env vars.
pub fn load_from(
    vars: &HashMap<String, String>,
    file: Option<&Path>,
) -> Result<RuntimeConfig, RuntimeError> {
    let raw = match file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| RuntimeError::Config(format!("cannot read {}: {e}", path.display())))?;
            toml::from_str::<RawFile>(&text)
                .map_err(|e| RuntimeError::Config(format!("parse error in {}: {e}", path.display())))?
        }
        None => RawFile::default(),
    };

    let runtime_api = required(vars, ENV_RUNTIME_API)?;
    let handler = required(vars, ENV_HANDLER)?;

    let memory_limit_mb = match vars.get(ENV_MEMORY_SIZE).filter(|v| !v.is_empty()) {
        Some(v) => v.trim().parse::<u32>().map_err(|e| {
            RuntimeError::Config(format!("{ENV_MEMORY_SIZE} must be a whole number of MB, got {v:?}: {e}"))
        })?,
        None => default_memory_mb(),
    };

    let optional = |key: &str, default: &str| {
        vars.get(key).cloned().unwrap_or_else(|| default.to_string())
    };

    let r = raw.runtime;
    Ok(RuntimeConfig {
        runtime_api,
        handler,
        function: FunctionSettings {
            function_name: optional(ENV_FUNCTION_NAME, ""),
            function_version: optional(ENV_FUNCTION_VERSION, "$LATEST"),
            log_group: optional(ENV_LOG_GROUP, ""),
            log_stream: optional(ENV_LOG_STREAM, ""),
            memory_limit_mb,
        },
        log_level: vars.get(ENV_LOG_LEVEL).cloned().unwrap_or(r.log_level),
        api_version: r.api_version,
        connect_timeout: Duration::from_millis(r.connect_timeout_ms),
    })
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, RuntimeError> {
    match vars.get(key) {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(RuntimeError::Config(format!("required environment variable {key} is not set"))),
    }
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl FunctionSettings {
    pub fn test_default() -> Self {
        Self {
            function_name: "test-fn".into(),
            function_version: "$LATEST".into(),
            log_group: "/aws/lambda/test-fn".into(),
            log_stream: "2026/10/18/[$LATEST]abc".into(),
            memory_limit_mb: 256,
        }
    }
}
