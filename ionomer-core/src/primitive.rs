//! Conversion table between encoded scalar kinds and native scalar types.
//!
//! Strict conversions accept the exact kind plus lossless widenings
//! (int to float or decimal, decimal to float, symbol and string text,
//! either lob kind for byte buffers). Permissive coercions are only tried
//! when the caller has opted into permissive mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::{Any, type_name};
use uuid::Uuid;

use crate::element::{Decimal, IonType, Timestamp, Value};
use crate::error::MapError;

/// Annotation attached to Guid blobs when `annotate_guids` is set.
pub const GUID_ANNOTATION: &str = "guid128";

/// A native scalar with a fixed encoded kind.
pub trait Primitive: Clone + Default + Send + Sync + 'static {
    /// Kind written when encoding.
    const ION_TYPE: IonType;
    /// Whether this is a Guid, annotated on request.
    const GUID: bool = false;

    fn to_value(&self) -> Value;

    /// Strict conversion; `None` means the kinds are incompatible.
    fn from_value(value: &Value) -> Option<Self>;

    /// Best-effort conversion used in permissive mode.
    fn coerce(value: &Value) -> Option<Self> {
        let _ = value;
        None
    }
}

/// Encodes a type-erased primitive.
pub(crate) fn encode<T: Primitive>(value: &dyn Any) -> Option<Value> {
    value.downcast_ref::<T>().map(T::to_value)
}

/// Decodes a primitive, coercing only when `permissive`.
pub(crate) fn decode<T: Primitive>(
    value: &Value,
    permissive: bool,
) -> Result<Box<dyn Any>, MapError> {
    if let Some(v) = T::from_value(value) {
        return Ok(Box::new(v));
    }
    if permissive {
        if let Some(v) = T::coerce(value) {
            return Ok(Box::new(v));
        }
    }
    Err(MapError::conversion(type_name::<T>(), value.describe()))
}

fn scalar_text(value: &Value) -> Option<String> {
    Some(match value {
        Value::String(s) | Value::Symbol(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Timestamp(t) => t.to_rfc3339(),
        _ => return None,
    })
}

impl Primitive for bool {
    const ION_TYPE: IonType = IonType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Int(0) => Some(false),
            Value::Int(1) => Some(true),
            Value::String(s) | Value::Symbol(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

macro_rules! impl_primitive_int {
    ($($t:ty),*) => {
        $(
            impl Primitive for $t {
                const ION_TYPE: IonType = IonType::Int;

                fn to_value(&self) -> Value {
                    Value::Int(*self as i128)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Int(i) => <$t>::try_from(*i).ok(),
                        Value::Decimal(d) if d.exponent() >= 0 => {
                            d.to_i128().and_then(|i| <$t>::try_from(i).ok())
                        }
                        _ => None,
                    }
                }

                fn coerce(value: &Value) -> Option<Self> {
                    match value {
                        Value::Float(f) if f.fract() == 0.0 => <$t>::try_from(*f as i128).ok(),
                        Value::Decimal(d) => d.to_i128().and_then(|i| <$t>::try_from(i).ok()),
                        Value::Bool(b) => Some(<$t>::from(*b)),
                        Value::String(s) | Value::Symbol(s) => s.trim().parse().ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_primitive_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_primitive_float {
    ($($t:ty),*) => {
        $(
            impl Primitive for $t {
                const ION_TYPE: IonType = IonType::Float;

                fn to_value(&self) -> Value {
                    Value::Float(*self as f64)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Float(f) => Some(*f as $t),
                        Value::Int(i) => Some(*i as $t),
                        Value::Decimal(d) => Some(d.to_f64() as $t),
                        _ => None,
                    }
                }

                fn coerce(value: &Value) -> Option<Self> {
                    match value {
                        Value::String(s) | Value::Symbol(s) => s.trim().parse().ok(),
                        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_primitive_float!(f32, f64);

impl Primitive for char {
    const ION_TYPE: IonType = IonType::String;

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) | Value::Symbol(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => u32::try_from(*i).ok().and_then(char::from_u32),
            _ => None,
        }
    }
}

impl Primitive for String {
    const ION_TYPE: IonType = IonType::String;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) | Value::Symbol(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        scalar_text(value)
    }
}

/// Text written as an Ion symbol rather than a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(text: impl Into<String>) -> Self {
        Symbol(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Self {
        Symbol(text.to_string())
    }
}

impl Primitive for Symbol {
    const ION_TYPE: IonType = IonType::Symbol;

    fn to_value(&self) -> Value {
        Value::Symbol(self.0.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Symbol(s) | Value::String(s) => Some(Symbol(s.clone())),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        scalar_text(value).map(Symbol)
    }
}

impl Primitive for Decimal {
    const ION_TYPE: IonType = IonType::Decimal;

    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Decimal(d) => Some(*d),
            Value::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Decimal::from_f64(*f),
            Value::String(s) | Value::Symbol(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Primitive for Timestamp {
    const ION_TYPE: IonType = IonType::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) | Value::Symbol(s) => DateTime::parse_from_rfc3339(s.trim()).ok(),
            _ => None,
        }
    }
}

impl Primitive for DateTime<Utc> {
    const ION_TYPE: IonType = IonType::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(self.fixed_offset())
    }

    fn from_value(value: &Value) -> Option<Self> {
        Timestamp::from_value(value).map(|t| t.with_timezone(&Utc))
    }

    fn coerce(value: &Value) -> Option<Self> {
        Timestamp::coerce(value).map(|t| t.with_timezone(&Utc))
    }
}

/// A byte buffer written as a blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn new(data: Vec<u8>) -> Self {
        Bytes(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Bytes(v.to_vec())
    }
}

impl Primitive for Bytes {
    const ION_TYPE: IonType = IonType::Blob;

    fn to_value(&self) -> Value {
        Value::Blob(self.0.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Blob(b) | Value::Clob(b) => Some(Bytes(b.clone())),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Bytes(s.clone().into_bytes())),
            _ => None,
        }
    }
}

/// A byte buffer written as a clob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clob(pub Vec<u8>);

impl Primitive for Clob {
    const ION_TYPE: IonType = IonType::Clob;

    fn to_value(&self) -> Value {
        Value::Clob(self.0.clone())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Clob(b) | Value::Blob(b) => Some(Clob(b.clone())),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Clob(s.clone().into_bytes())),
            _ => None,
        }
    }
}

impl Primitive for Uuid {
    const ION_TYPE: IonType = IonType::Blob;
    const GUID: bool = true;

    fn to_value(&self) -> Value {
        Value::Blob(self.as_bytes().to_vec())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Blob(b) => Uuid::from_slice(b).ok(),
            _ => None,
        }
    }

    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) | Value::Symbol(s) => Uuid::parse_str(s.trim()).ok(),
            Value::Clob(b) => Uuid::from_slice(b).ok(),
            _ => None,
        }
    }
}
