//! Handler registration and resolution.
//!
//! User code exposes handlers through [`HandlerModule`]: a default-constructed
//! instance declares its entry points, each with an ordered list of parameter
//! types. The runtime resolves the `<module>.<entry>` reference once at
//! startup into a [`HandlerDescriptor`] and keeps it for the process lifetime.
//!
//! # Selection
//!
//! A candidate is eligible when it has one parameter, or two parameters the
//! second of which is the context. Among eligible candidates with the
//! requested name the first one declared wins; extra ties are logged.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::coercion::{Coerced, Input, ParamType};
use crate::context::ExecutionContext;
use crate::error::{HandlerError, RuntimeError};
use crate::output;

/// Selection rules quoted in resolution errors so operators can fix
/// ambiguous or unsupported signatures.
pub const SELECTION_RULES: &str = "\
Handler entry point selection:
  - the entry point must have the name given after the last '.' of the handler reference;
  - it must take 1 or 2 parameters;
  - with 2 parameters, the second must be the execution context;
  - a single parameter may be either the input or the execution context;
  - when several entry points qualify, the first one declared by the module is used.";

// ── Callables ─────────────────────────────────────────────────────────────────

/// Arguments assembled by the runtime for one call.
#[derive(Debug, Default)]
pub struct Args {
    pub input: Option<Coerced>,
    pub context: Option<ExecutionContext>,
}

/// Type-erased entry point.
pub trait Callable: Send + Sync {
    fn call(&self, args: Args) -> Result<Value, RuntimeError>;
}

impl<F> Callable for F
where
    F: Fn(Args) -> Result<Value, RuntimeError> + Send + Sync,
{
    fn call(&self, args: Args) -> Result<Value, RuntimeError> {
        self(args)
    }
}

struct Candidate {
    name: String,
    params: Vec<ParamType>,
    callable: Box<dyn Callable>,
}

/// Entry points declared by a module instance, in declaration order.
#[derive(Default)]
pub struct EntryPoints {
    candidates: Vec<Candidate>,
}

impl EntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entry point with an explicit signature.
    pub fn declare(
        &mut self,
        name: &str,
        params: Vec<ParamType>,
        callable: impl Callable + 'static,
    ) -> &mut Self {
        self.candidates.push(Candidate {
            name: name.to_string(),
            params,
            callable: Box::new(callable),
        });
        self
    }

    /// `fn(T) -> R`
    pub fn with_input<T, R, F>(&mut self, name: &str, f: F) -> &mut Self
    where
        T: Input,
        R: Serialize,
        F: Fn(T) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        self.declare(name, vec![T::param_type()], move |args: Args| -> Result<Value, RuntimeError> {
            let input = take_input::<T>(args.input)?;
            to_json(f(input)?)
        })
    }

    /// `fn(T, &ExecutionContext) -> R`
    pub fn with_input_and_context<T, R, F>(&mut self, name: &str, f: F) -> &mut Self
    where
        T: Input,
        R: Serialize,
        F: Fn(T, &ExecutionContext) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        self.declare(name, vec![T::param_type(), ParamType::Context], move |args: Args| -> Result<Value, RuntimeError> {
            let input = take_input::<T>(args.input)?;
            let ctx = take_context(args.context)?;
            to_json(f(input, &ctx)?)
        })
    }

    /// `fn(&ExecutionContext) -> R`
    pub fn with_context<R, F>(&mut self, name: &str, f: F) -> &mut Self
    where
        R: Serialize,
        F: Fn(&ExecutionContext) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        self.declare(name, vec![ParamType::Context], move |args: Args| -> Result<Value, RuntimeError> {
            let ctx = take_context(args.context)?;
            to_json(f(&ctx)?)
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

fn take_input<T: Input>(input: Option<Coerced>) -> Result<T, RuntimeError> {
    let value = input.ok_or_else(|| RuntimeError::coercion("no input was decoded for the handler"))?;
    T::from_coerced(value)
}

fn take_context(ctx: Option<ExecutionContext>) -> Result<ExecutionContext, RuntimeError> {
    ctx.ok_or_else(|| RuntimeError::coercion("no execution context was supplied"))
}

fn to_json<R: Serialize>(value: R) -> Result<Value, RuntimeError> {
    output::to_json(&value)
}

// ── Modules ───────────────────────────────────────────────────────────────────

/// A user module exposing handler entry points.
///
/// The runtime constructs exactly one instance (`Default`) when the module is
/// resolved; entry point closures capture the `Arc` to reach `self`.
pub trait HandlerModule: Default + Send + Sync + 'static {
    fn entry_points(self: Arc<Self>, entries: &mut EntryPoints);
}

type ModuleFactory = Box<dyn Fn() -> EntryPoints + Send + Sync>;

/// Module name → factory. Names may contain dots.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: HandlerModule>(&mut self, name: &str) -> &mut Self {
        let factory: ModuleFactory = Box::new(|| {
            let instance = Arc::new(M::default());
            let mut entries = EntryPoints::new();
            instance.entry_points(&mut entries);
            entries
        });
        if self.modules.insert(name.to_string(), factory).is_some() {
            warn!(module = %name, "module registered twice; keeping the later registration");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Instantiate `name` and collect its entry points.
    fn instantiate(&self, name: &str) -> Option<EntryPoints> {
        self.modules.get(name).map(|factory| factory())
    }
}

// ── Descriptor ────────────────────────────────────────────────────────────────

/// The resolved entry point, immutable for the process lifetime.
pub struct HandlerDescriptor {
    module: String,
    entry: String,
    params: Vec<ParamType>,
    callable: Box<dyn Callable>,
}

impl HandlerDescriptor {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Type of the first parameter when it is decoded from the body.
    pub fn input_type(&self) -> Option<ParamType> {
        self.params.first().copied().filter(|p| *p != ParamType::Context)
    }

    /// The trailing (or only) parameter is the execution context.
    pub fn takes_context(&self) -> bool {
        self.params.last() == Some(&ParamType::Context)
    }

    pub fn invoke(&self, input: Option<Coerced>, ctx: ExecutionContext) -> Result<Value, RuntimeError> {
        let context = self.takes_context().then_some(ctx);
        self.callable.call(Args { input, context })
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("module", &self.module)
            .field("entry", &self.entry)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn is_eligible(params: &[ParamType]) -> bool {
    matches!(params, [_] | [_, ParamType::Context])
}

/// Resolve a `<module>.<entry>` reference against `registry`.
pub fn resolve(registry: &ModuleRegistry, reference: &str) -> Result<HandlerDescriptor, RuntimeError> {
    let (module, entry) = reference
        .rsplit_once('.')
        .filter(|(m, e)| !m.is_empty() && !e.is_empty())
        .ok_or_else(|| {
            RuntimeError::Resolution(format!(
                "handler reference {reference:?} must have the form <module>.<entry>"
            ))
        })?;

    let entries = registry
        .instantiate(module)
        .ok_or_else(|| RuntimeError::Resolution(format!("module {module:?} is not registered")))?;
    debug!(%module, declared = entries.len(), "module instantiated");

    let named: Vec<Candidate> = entries
        .candidates
        .into_iter()
        .filter(|c| c.name == entry)
        .collect();
    let total = named.len();

    let mut eligible = named.into_iter().filter(|c| is_eligible(&c.params));
    let chosen = eligible.next().ok_or_else(|| {
        RuntimeError::Resolution(format!(
            "module {module:?} has {total} entry point(s) named {entry:?}, none with a supported signature\n\n{SELECTION_RULES}"
        ))
    })?;

    let ties = eligible.count();
    if ties > 0 {
        warn!(%module, %entry, ties, "several entry points qualify; using the first declared");
    }

    info!(%module, %entry, params = ?chosen.params, "handler resolved");
    Ok(HandlerDescriptor {
        module: module.to_string(),
        entry: entry.to_string(),
        params: chosen.params,
        callable: chosen.callable,
    })
}
