//! Sample handler modules shipped with the binary.
//!
//! Reference them with `_HANDLER`, e.g. `demos.S3EventName.handleRequest`.

use std::sync::Arc;

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::events::S3Event;
use crate::handler::{EntryPoints, HandlerModule, ModuleRegistry};

/// Echoes a string input.
#[derive(Default)]
pub struct Echo;

impl HandlerModule for Echo {
    fn entry_points(self: Arc<Self>, entries: &mut EntryPoints) {
        entries.with_input("handle", |input: String| Ok(input));
    }
}

/// Returns the event name of the first storage notification record.
#[derive(Default)]
pub struct S3EventName;

impl S3EventName {
    fn first_event_name(&self, event: S3Event) -> Result<String, HandlerError> {
        event
            .records
            .into_iter()
            .next()
            .map(|r| r.event_name)
            .ok_or_else(|| HandlerError::new("IndexOutOfBounds", "event has no records"))
    }
}

impl HandlerModule for S3EventName {
    fn entry_points(self: Arc<Self>, entries: &mut EntryPoints) {
        entries.with_input_and_context("handleRequest", move |event: S3Event, _: &ExecutionContext| {
            self.first_event_name(event)
        });
    }
}

/// Logs a JSON document through the context logger and returns it.
#[derive(Default)]
pub struct JsonNode;

impl HandlerModule for JsonNode {
    fn entry_points(self: Arc<Self>, entries: &mut EntryPoints) {
        entries.with_input_and_context("testNode", |node: Value, ctx: &ExecutionContext| {
            ctx.logger().log(&node);
            Ok(node)
        });
    }
}

pub fn register(registry: &mut ModuleRegistry) {
    registry
        .register::<Echo>("demos.Echo")
        .register::<S3EventName>("demos.S3EventName")
        .register::<JsonNode>("demos.JsonNode");
}
