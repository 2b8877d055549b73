//! Per-invocation execution context handed to handlers.
//!
//! Static fields come from [`FunctionSettings`]; request id, ARN, trace id
//! and the remaining-time snapshot come from the [`Invocation`]. The context
//! is read-only to the handler and dropped with the invocation.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::info;

use crate::config::FunctionSettings;
use crate::invocation::Invocation;

/// Accessor the runtime does not implement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} is not supported by this runtime")]
pub struct Unsupported(pub &'static str);

/// Caller identity supplied by mobile SDK invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub identity_id: String,
    pub identity_pool_id: String,
}

/// Client application metadata supplied by mobile SDK invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub installation_id: String,
    pub app_title: String,
}

/// Logging capability scoped to one invocation.
#[derive(Debug, Clone)]
pub struct InvocationLogger {
    request_id: String,
    trace_id: Option<String>,
}

impl InvocationLogger {
    pub fn log(&self, message: impl fmt::Display) {
        info!(
            target: "handler",
            request_id = %self.request_id,
            trace_id = self.trace_id.as_deref().unwrap_or(""),
            "{message}"
        );
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    request_id: String,
    function_name: String,
    function_version: String,
    log_group: String,
    log_stream: String,
    invoked_function_arn: String,
    trace_id: Option<String>,
    remaining_time_ms: i64,
    memory_limit_mb: u32,
    logger: InvocationLogger,
}

impl ExecutionContext {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function_version(&self) -> &str {
        &self.function_version
    }

    pub fn log_group_name(&self) -> &str {
        &self.log_group
    }

    pub fn log_stream_name(&self) -> &str {
        &self.log_stream
    }

    pub fn invoked_function_arn(&self) -> &str {
        &self.invoked_function_arn
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Milliseconds left when the context was built. Negative once the
    /// deadline has passed; never recomputed.
    pub fn remaining_time_ms(&self) -> i64 {
        self.remaining_time_ms
    }

    pub fn memory_limit_mb(&self) -> u32 {
        self.memory_limit_mb
    }

    pub fn logger(&self) -> &InvocationLogger {
        &self.logger
    }

    pub fn identity(&self) -> Result<ClientIdentity, Unsupported> {
        Err(Unsupported("identity"))
    }

    pub fn client_context(&self) -> Result<ClientContext, Unsupported> {
        Err(Unsupported("client context"))
    }
}

/// Builds a fresh [`ExecutionContext`] for each invocation.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    settings: FunctionSettings,
}

impl ContextBuilder {
    pub fn new(settings: FunctionSettings) -> Self {
        Self { settings }
    }

    pub fn build(&self, invocation: &Invocation) -> ExecutionContext {
        self.build_at(invocation, now_ms())
    }

    /// Build with an explicit wall-clock reading (ms since the Unix epoch).
    pub fn build_at(&self, invocation: &Invocation, now_ms: i64) -> ExecutionContext {
        let s = &self.settings;
        ExecutionContext {
            request_id: invocation.request_id.clone(),
            function_name: s.function_name.clone(),
            function_version: s.function_version.clone(),
            log_group: s.log_group.clone(),
            log_stream: s.log_stream.clone(),
            invoked_function_arn: invocation.function_arn.clone(),
            trace_id: invocation.trace_id.clone(),
            remaining_time_ms: invocation.deadline_ms.saturating_sub(now_ms),
            memory_limit_mb: s.memory_limit_mb,
            logger: InvocationLogger {
                request_id: invocation.request_id.clone(),
                trace_id: invocation.trace_id.clone(),
            },
        }
    }
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
