//! Payload coercion: raw invocation body → the handler's native input.
//!
//! Two steps. A [`CoercionTable`] maps the declared [`ParamType`] to a
//! decoder that turns the body into a [`Coerced`] value; unregistered types
//! fall through to the generic structural decoder, so the table is total.
//! The typed adapter then converts the [`Coerced`] value into the concrete
//! Rust type through [`Input::from_coerced`].

use std::{collections::HashMap, str::FromStr};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RuntimeError;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Well-known platform event shapes with dedicated decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventShape {
    S3,
    Cognito,
    Config,
    Dynamodb,
    Kinesis,
    Sns,
}

/// Semantic type of a handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// The execution context capability; never decoded from the body.
    Context,
    String,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Event(EventShape),
    /// Untyped JSON tree, handed over without mapping.
    JsonTree,
    /// Any other deserializable shape, named for diagnostics.
    Structured(&'static str),
}

/// Output of the decoding step, before the typed conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Text(String),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Tree(Value),
}

/// Raw body plus the one fact about its content type that matters.
#[derive(Debug, Clone, Copy)]
pub struct RawBody<'a> {
    pub bytes: &'a [u8],
    pub json: bool,
}

impl<'a> RawBody<'a> {
    pub fn new(bytes: &'a [u8], json: bool) -> Self {
        Self { bytes, json }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(self.bytes).into_owned()
    }

    fn tree(&self) -> Result<Value, RuntimeError> {
        serde_json::from_slice(self.bytes)
            .map_err(|e| RuntimeError::coercion(format!("body is not valid JSON: {e}")))
    }
}

pub type Decoder = fn(&RawBody<'_>) -> Result<Coerced, RuntimeError>;

// ── Table ─────────────────────────────────────────────────────────────────────

/// Registry of decoders keyed by parameter type.
#[derive(Debug)]
pub struct CoercionTable {
    decoders: HashMap<ParamType, Decoder>,
}

impl CoercionTable {
    /// Table with the scalar, JSON tree and event decoders installed.
    pub fn new() -> Self {
        let mut table = Self { decoders: HashMap::new() };
        table.register(ParamType::Context, decode_context);
        table.register(ParamType::String, decode_string);
        table.register(ParamType::Integer, decode_integer);
        table.register(ParamType::Long, decode_long);
        table.register(ParamType::Float, decode_float);
        table.register(ParamType::Double, decode_double);
        table.register(ParamType::Boolean, decode_boolean);
        table.register(ParamType::JsonTree, decode_structured);
        for shape in [
            EventShape::S3,
            EventShape::Cognito,
            EventShape::Config,
            EventShape::Dynamodb,
            EventShape::Kinesis,
            EventShape::Sns,
        ] {
            table.register(ParamType::Event(shape), decode_structured);
        }
        table
    }

    /// Install or replace the decoder for `ty`.
    pub fn register(&mut self, ty: ParamType, decoder: Decoder) {
        self.decoders.insert(ty, decoder);
    }

    /// Decoder for `ty`; unknown types use the generic structural decoder.
    pub fn decoder_for(&self, ty: ParamType) -> Decoder {
        self.decoders.get(&ty).copied().unwrap_or(decode_structured)
    }

    pub fn coerce(&self, ty: ParamType, body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
        (self.decoder_for(ty))(body)
    }
}

impl Default for CoercionTable {
    fn default() -> Self {
        Self::new()
    }
}

// ── Decoders ──────────────────────────────────────────────────────────────────

fn decode_context(_: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    Err(RuntimeError::coercion("the context parameter is supplied by the runtime, not decoded"))
}

fn decode_string(body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    if !body.json {
        return Ok(Coerced::Text(body.text()));
    }
    let text = match body.tree()? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => {
            return Err(RuntimeError::coercion(format!(
                "expected a JSON scalar for a string parameter, found {}",
                describe(&other)
            )));
        }
    };
    Ok(Coerced::Text(text))
}

fn decode_integer(body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    scalar(body, "integer").map(Coerced::Integer)
}

fn decode_long(body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    scalar(body, "long").map(Coerced::Long)
}

fn decode_float(body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    scalar(body, "float").map(Coerced::Float)
}

fn decode_double(body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    scalar(body, "double").map(Coerced::Double)
}

fn decode_boolean(body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    if !body.json {
        return parse_bool(&body.text()).map(Coerced::Boolean);
    }
    match body.tree()? {
        Value::Bool(b) => Ok(Coerced::Boolean(b)),
        Value::String(s) => parse_bool(&s).map(Coerced::Boolean),
        other => Err(RuntimeError::coercion(format!(
            "expected a JSON boolean, found {}",
            describe(&other)
        ))),
    }
}

fn decode_structured(body: &RawBody<'_>) -> Result<Coerced, RuntimeError> {
    body.tree().map(Coerced::Tree)
}

/// Shared numeric path. JSON numbers, JSON strings and non-JSON bodies all go
/// through the textual grammar, so `"42"`, `42` and `42` as text agree.
fn scalar<T>(body: &RawBody<'_>, name: &str) -> Result<T, RuntimeError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if !body.json {
        return parse_text(&body.text(), name);
    }
    match body.tree()? {
        Value::String(s) => parse_text(&s, name),
        Value::Number(n) => parse_text(&n.to_string(), name),
        other => Err(RuntimeError::coercion(format!(
            "expected a JSON {name}, found {}",
            describe(&other)
        ))),
    }
}

fn parse_text<T>(text: &str, name: &str) -> Result<T, RuntimeError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| RuntimeError::coercion(format!("cannot parse {text:?} as {name}: {e}")))
}

fn parse_bool(text: &str) -> Result<bool, RuntimeError> {
    let t = text.trim();
    if t.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if t.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(RuntimeError::coercion(format!("cannot parse {text:?} as boolean")))
    }
}

fn describe(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Typed conversion ──────────────────────────────────────────────────────────

/// A Rust type usable as a handler's input parameter.
pub trait Input: Sized + 'static {
    fn param_type() -> ParamType;

    fn from_coerced(value: Coerced) -> Result<Self, RuntimeError>;
}

fn mismatch(expected: ParamType, got: &Coerced) -> RuntimeError {
    RuntimeError::coercion(format!("decoder produced {got:?} for a {expected:?} parameter"))
}

macro_rules! scalar_input {
    ($ty:ty, $param:ident) => {
        impl Input for $ty {
            fn param_type() -> ParamType {
                ParamType::$param
            }

            fn from_coerced(value: Coerced) -> Result<Self, RuntimeError> {
                match value {
                    Coerced::$param(v) => Ok(v),
                    other => Err(mismatch(ParamType::$param, &other)),
                }
            }
        }
    };
}

scalar_input!(i32, Integer);
scalar_input!(i64, Long);
scalar_input!(f32, Float);
scalar_input!(f64, Double);
scalar_input!(bool, Boolean);

impl Input for String {
    fn param_type() -> ParamType {
        ParamType::String
    }

    fn from_coerced(value: Coerced) -> Result<Self, RuntimeError> {
        match value {
            Coerced::Text(s) => Ok(s),
            other => Err(mismatch(ParamType::String, &other)),
        }
    }
}

impl Input for Value {
    fn param_type() -> ParamType {
        ParamType::JsonTree
    }

    fn from_coerced(value: Coerced) -> Result<Self, RuntimeError> {
        match value {
            Coerced::Tree(v) => Ok(v),
            other => Err(mismatch(ParamType::JsonTree, &other)),
        }
    }
}

/// Generic structured input: any `DeserializeOwned` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned + 'static> Input for Json<T> {
    fn param_type() -> ParamType {
        ParamType::Structured(std::any::type_name::<T>())
    }

    fn from_coerced(value: Coerced) -> Result<Self, RuntimeError> {
        structural(value).map(Json)
    }
}

/// Map a decoded tree onto `T`, naming the offending field path on failure.
pub fn structural<T: DeserializeOwned>(value: Coerced) -> Result<T, RuntimeError> {
    let tree = match value {
        Coerced::Tree(v) => v,
        other => return Err(RuntimeError::coercion(format!("expected a JSON document, got {other:?}"))),
    };
    serde_path_to_error::deserialize(tree).map_err(|e| {
        let path = e.path().to_string();
        RuntimeError::Coercion { path, message: e.into_inner().to_string() }
    })
}
