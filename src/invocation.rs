//! One unit of work fetched from `invocation/next`.

use reqwest::header::{CONTENT_TYPE, HeaderMap};

use crate::error::RuntimeError;

pub const HEADER_REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
pub const HEADER_DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";
pub const HEADER_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const HEADER_TRACE_ID: &str = "Lambda-Runtime-Trace-Id";

/// Immutable invocation record; dropped once its outcome is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub request_id: String,
    /// Absolute deadline, milliseconds since the Unix epoch.
    pub deadline_ms: i64,
    pub function_arn: String,
    pub trace_id: Option<String>,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Invocation {
    /// Build an invocation from the `next` response headers and body.
    ///
    /// Request id, deadline and function ARN are mandatory; without them the
    /// outcome cannot be addressed, so their absence is a protocol error.
    pub fn from_headers(headers: &HeaderMap, body: Vec<u8>) -> Result<Self, RuntimeError> {
        let request_id = required(headers, HEADER_REQUEST_ID)?;
        let deadline = required(headers, HEADER_DEADLINE_MS)?;
        let deadline_ms = deadline.trim().parse::<i64>().map_err(|e| {
            RuntimeError::Protocol(format!("{HEADER_DEADLINE_MS} is not an integer ({deadline:?}): {e}"))
        })?;
        let function_arn = required(headers, HEADER_FUNCTION_ARN)?;

        Ok(Self {
            request_id,
            deadline_ms,
            function_arn,
            trace_id: header(headers, HEADER_TRACE_ID),
            content_type: header(headers, CONTENT_TYPE.as_str()).unwrap_or_default(),
            body,
        })
    }

    /// The declared content type mentions JSON.
    pub fn is_json(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("json")
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn required(headers: &HeaderMap, name: &str) -> Result<String, RuntimeError> {
    header(headers, name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RuntimeError::Protocol(format!("missing required header {name}")))
}
