//! The invocation loop.
//!
//! Two states: `Idle` (about to fetch) and `Executing` (handler running).
//! Each cycle performs exactly one fetch, one dispatch and one report; no
//! step is retried. A failed fetch is the only way out of the loop, every
//! failure after a successful fetch is reported and the loop returns to
//! `Idle`.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, error, info, info_span, warn};

use crate::client::ControlPlane;
use crate::coercion::{CoercionTable, RawBody};
use crate::context::ContextBuilder;
use crate::error::RuntimeError;
use crate::handler::HandlerDescriptor;
use crate::invocation::Invocation;
use crate::reporter::ErrorReporter;

enum LoopState {
    Idle,
    Executing(Invocation),
}

/// How one invocation ended, as reported to the control endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { request_id: String },
    Failed { request_id: String, error_type: String },
}

#[derive(Debug)]
pub struct Runtime<C: ControlPlane> {
    plane: C,
    handler: HandlerDescriptor,
    contexts: ContextBuilder,
    coercions: CoercionTable,
}

impl<C: ControlPlane> Runtime<C> {
    pub fn new(plane: C, handler: HandlerDescriptor, contexts: ContextBuilder) -> Self {
        Self { plane, handler, contexts, coercions: CoercionTable::new() }
    }

    /// Replace the default decoder table.
    pub fn with_coercions(mut self, coercions: CoercionTable) -> Self {
        self.coercions = coercions;
        self
    }

    pub fn plane(&self) -> &C {
        &self.plane
    }

    /// Run until a fatal error; returns that error.
    pub fn run(&self) -> RuntimeError {
        info!(
            module = %self.handler.module(),
            entry = %self.handler.entry(),
            "entering invocation loop"
        );
        let mut state = LoopState::Idle;
        loop {
            state = match self.advance(state) {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, kind = e.kind(), "fatal error, leaving invocation loop");
                    return e;
                }
            };
        }
    }

    /// One full Idle → Executing → Idle cycle.
    pub fn step(&self) -> Result<Outcome, RuntimeError> {
        let invocation = self.plane.next_invocation()?;
        Ok(self.execute(invocation))
    }

    fn advance(&self, state: LoopState) -> Result<LoopState, RuntimeError> {
        match state {
            LoopState::Idle => Ok(LoopState::Executing(self.plane.next_invocation()?)),
            LoopState::Executing(invocation) => {
                self.execute(invocation);
                Ok(LoopState::Idle)
            }
        }
    }

    fn execute(&self, invocation: Invocation) -> Outcome {
        let span = info_span!(
            "invocation",
            request_id = %invocation.request_id,
            trace_id = invocation.trace_id.as_deref().unwrap_or("")
        );
        let _guard = span.enter();
        let request_id = invocation.request_id.clone();

        match self.dispatch(&invocation) {
            Ok(body) => {
                if let Err(e) = self.plane.post_response(&request_id, body) {
                    warn!(error = %e, "could not deliver response");
                }
                debug!("invocation succeeded");
                Outcome::Succeeded { request_id }
            }
            Err(err) => {
                ErrorReporter::new(&self.plane).invocation_failed(&request_id, &err);
                Outcome::Failed { request_id, error_type: err.kind().to_string() }
            }
        }
    }

    /// Context, coercion, call, serialization. Every error here is recoverable.
    fn dispatch(&self, invocation: &Invocation) -> Result<Vec<u8>, RuntimeError> {
        let ctx = self.contexts.build(invocation);

        let input = match self.handler.input_type() {
            Some(ty) => {
                let body = RawBody::new(&invocation.body, invocation.is_json());
                Some(self.coercions.coerce(ty, &body)?)
            }
            None => None,
        };

        let value = catch_unwind(AssertUnwindSafe(|| self.handler.invoke(input, ctx)))
            .map_err(|panic| RuntimeError::Handler {
                kind: "Panic".into(),
                message: panic_message(panic.as_ref()),
            })??;

        serde_json::to_vec(&value).map_err(|e| RuntimeError::Serialization(e.to_string()))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
