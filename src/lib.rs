//! Custom function runtime.
//!
//! Fetches invocations from the platform's control endpoint, dispatches each
//! one to a registered handler and reports the result or failure back.
//!
//! ```text
//! config ─► resolve handler ─► loop { next ─► context + coercion ─► call ─► response | error }
//! ```

pub mod bootstrap;
pub mod client;
pub mod coercion;
pub mod config;
pub mod context;
pub mod demos;
pub mod error;
pub mod events;
pub mod handler;
pub mod invocation;
pub mod logger;
pub mod output;
pub mod reporter;
pub mod runtime;

pub use client::{ControlPlane, RuntimeClient};
pub use coercion::{Input, Json, ParamType};
pub use context::ExecutionContext;
pub use error::{HandlerError, RuntimeError};
pub use handler::{EntryPoints, HandlerModule, ModuleRegistry};
pub use runtime::{Outcome, Runtime};
