//! Runtime-wide error types.
//!
//! Two families share one enum: fatal errors end the process (configuration,
//! handler resolution, protocol violations), everything else is caught at the
//! per-invocation boundary and reported back to the control endpoint.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("handler resolution failed: {0}")]
    Resolution(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("cannot coerce payload at `{path}`: {message}")]
    Coercion { path: String, message: String },

    #[error("{message}")]
    Handler { kind: String, message: String },

    #[error("cannot serialize result: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl RuntimeError {
    /// Coercion failure on the payload as a whole (no nested field).
    pub fn coercion(message: impl Into<String>) -> Self {
        RuntimeError::Coercion { path: ".".into(), message: message.into() }
    }

    /// Kind name reported as `errorType` on the wire.
    pub fn kind(&self) -> &str {
        match self {
            RuntimeError::Config(_) => "ConfigError",
            RuntimeError::Logger(_) => "LoggerError",
            RuntimeError::Resolution(_) => "ResolutionError",
            RuntimeError::Protocol(_) => "ProtocolError",
            RuntimeError::Coercion { .. } => "CoercionError",
            RuntimeError::Handler { kind, .. } => kind,
            RuntimeError::Serialization(_) => "SerializationError",
            RuntimeError::Transport(_) => "TransportError",
        }
    }

    /// Whether this error terminates the process instead of the invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::Config(_)
                | RuntimeError::Logger(_)
                | RuntimeError::Resolution(_)
                | RuntimeError::Protocol(_)
        )
    }
}

impl From<HandlerError> for RuntimeError {
    fn from(e: HandlerError) -> Self {
        RuntimeError::Handler { kind: e.kind, message: e.message }
    }
}

/// Failure raised by user handler code.
///
/// Any `std::error::Error` converts into it through `?`; the kind is the
/// short type name of the source error. Deliberately not an `Error` itself
/// so the blanket conversion stays coherent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub kind: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into() }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl<E: std::error::Error + 'static> From<E> for HandlerError {
    fn from(e: E) -> Self {
        Self { kind: short_type_name::<E>().to_string(), message: e.to_string() }
    }
}

/// `core::num::error::ParseIntError` → `ParseIntError`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
