//! Handler results → JSON.
//!
//! `serde_json` writes NaN and ±inf as `null` without complaint, which would
//! silently lose the handler's value. Results are walked once with a checking
//! serializer first; a non-finite float anywhere is a serialization error.

use std::fmt;

use serde::Serialize;
use serde::ser::{self, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant};
use serde_json::Value;

use crate::error::RuntimeError;

/// Serialize a handler result, rejecting non-finite floats.
pub fn to_json<R: Serialize + ?Sized>(value: &R) -> Result<Value, RuntimeError> {
    value
        .serialize(FiniteCheck)
        .map_err(|e| RuntimeError::Serialization(e.0))?;
    serde_json::to_value(value).map_err(|e| RuntimeError::Serialization(e.to_string()))
}

#[derive(Debug)]
struct Rejected(String);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Rejected {}

impl ser::Error for Rejected {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Rejected(msg.to_string())
    }
}

fn finite(v: f64) -> Result<(), Rejected> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(Rejected(format!("result contains a non-finite number ({v}) that JSON cannot represent")))
    }
}

/// Visits every value and keeps nothing.
#[derive(Clone, Copy)]
struct FiniteCheck;

macro_rules! accept {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(fn $method(self, _: $ty) -> Result<(), Rejected> { Ok(()) })*
    };
}

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = Rejected;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
        serialize_unit_struct(&'static str),
    );

    fn serialize_f32(self, v: f32) -> Result<(), Rejected> {
        finite(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), Rejected> {
        finite(v)
    }

    fn serialize_none(self) -> Result<(), Rejected> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), Rejected> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Rejected> {
        Ok(())
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<(), Rejected> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _: &'static str, value: &T) -> Result<(), Rejected> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), Rejected> {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_tuple_variant(self, _: &'static str, _: u32, _: &'static str, _: usize) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, Rejected> {
        Ok(self)
    }

    fn serialize_struct_variant(self, _: &'static str, _: u32, _: &'static str, _: usize) -> Result<Self, Rejected> {
        Ok(self)
    }
}

impl SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = Rejected;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejected> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}

impl SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = Rejected;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejected> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}

impl SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = Rejected;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejected> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}

impl SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = Rejected;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejected> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}

impl SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = Rejected;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Rejected> {
        key.serialize(*self)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Rejected> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}

impl SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = Rejected;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Result<(), Rejected> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}

impl SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = Rejected;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, _: &'static str, value: &T) -> Result<(), Rejected> {
        value.serialize(*self)
    }

    fn end(self) -> Result<(), Rejected> {
        Ok(())
    }
}
