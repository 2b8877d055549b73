//! Error reporting for both failure tiers.
//!
//! Initialization failures go to `init/error` once, before the loop starts;
//! invocation failures go to `invocation/{id}/error` and the loop carries on.
//! Only `{errorMessage, errorType}` crosses the wire; the full error is
//! logged locally.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::client::ControlPlane;
use crate::error::RuntimeError;

/// Wire shape of an error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_message: String,
    pub error_type: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { error_message: message.into(), error_type: kind.into() }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RuntimeError> {
        serde_json::to_vec(self).map_err(|e| RuntimeError::Serialization(e.to_string()))
    }
}

impl From<&RuntimeError> for ErrorPayload {
    fn from(e: &RuntimeError) -> Self {
        Self::new(e.to_string(), e.kind())
    }
}

/// Delivers failure reports; delivery failures are logged, never escalated.
pub struct ErrorReporter<'a, C: ControlPlane> {
    plane: &'a C,
}

impl<'a, C: ControlPlane> ErrorReporter<'a, C> {
    pub fn new(plane: &'a C) -> Self {
        Self { plane }
    }

    /// Report a failure that happened before the first fetch.
    pub fn init_failed(&self, err: &RuntimeError) {
        error!(error = %err, kind = err.kind(), "initialization failed");
        if let Err(e) = self.plane.post_init_error(&ErrorPayload::from(err)) {
            warn!(error = %e, "could not deliver init error report");
        }
    }

    /// Report a failure of the invocation addressed by `request_id`.
    pub fn invocation_failed(&self, request_id: &str, err: &RuntimeError) {
        error!(%request_id, error = ?err, kind = err.kind(), "invocation failed");
        if let Err(e) = self.plane.post_invocation_error(request_id, &ErrorPayload::from(err)) {
            warn!(%request_id, error = %e, "could not deliver invocation error report");
        }
    }
}
