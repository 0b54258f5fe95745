//! In-memory Ion value tree.
//!
//! This is the data model shared by the codec boundary and the mapping
//! engines: the engines turn typed values into [`Element`] trees and back,
//! and a [`Codec`](crate::codec::Codec) turns trees into bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamps are carried with their original UTC offset.
pub type Timestamp = chrono::DateTime<chrono::FixedOffset>;

/// The kinds of values the encoding distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IonType {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    SExp,
    Struct,
}

impl IonType {
    /// Returns true for the three container kinds.
    pub fn is_container(self) -> bool {
        matches!(self, IonType::List | IonType::SExp | IonType::Struct)
    }

    /// Keyword used by the text form (`null.<name>`).
    pub fn name(self) -> &'static str {
        match self {
            IonType::Null => "null",
            IonType::Bool => "bool",
            IonType::Int => "int",
            IonType::Float => "float",
            IonType::Decimal => "decimal",
            IonType::Timestamp => "timestamp",
            IonType::Symbol => "symbol",
            IonType::String => "string",
            IonType::Clob => "clob",
            IonType::Blob => "blob",
            IonType::List => "list",
            IonType::SExp => "sexp",
            IonType::Struct => "struct",
        }
    }

    /// Inverse of [`IonType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "null" => IonType::Null,
            "bool" => IonType::Bool,
            "int" => IonType::Int,
            "float" => IonType::Float,
            "decimal" => IonType::Decimal,
            "timestamp" => IonType::Timestamp,
            "symbol" => IonType::Symbol,
            "string" => IonType::String,
            "clob" => IonType::Clob,
            "blob" => IonType::Blob,
            "list" => IonType::List,
            "sexp" => IonType::SExp,
            "struct" => IonType::Struct,
            _ => return None,
        })
    }
}

impl fmt::Display for IonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An arbitrary-precision-style decimal: `coefficient * 10^exponent`.
///
/// Precision is significant, so `0.73` and `0.730` are different values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decimal {
    coefficient: i128,
    exponent: i32,
}

impl Decimal {
    pub fn new(coefficient: i128, exponent: i32) -> Self {
        Decimal {
            coefficient,
            exponent,
        }
    }

    pub fn coefficient(&self) -> i128 {
        self.coefficient
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn to_f64(&self) -> f64 {
        format!("{}e{}", self.coefficient, self.exponent)
            .parse()
            .unwrap_or(f64::NAN)
    }

    /// Returns the value as an integer if it has no fractional part.
    pub fn to_i128(&self) -> Option<i128> {
        if self.exponent >= 0 {
            let scale = 10i128.checked_pow(self.exponent as u32)?;
            return self.coefficient.checked_mul(scale);
        }
        let scale = 10i128.checked_pow(self.exponent.unsigned_abs())?;
        if self.coefficient % scale == 0 {
            Some(self.coefficient / scale)
        } else {
            None
        }
    }

    /// Converts a float through its shortest round-trip text form.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        format!("{value}").parse().ok()
    }
}

impl From<i128> for Decimal {
    fn from(value: i128) -> Self {
        Decimal::new(value, 0)
    }
}

/// Error returned when decimal text cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal literal {0:?}")]
pub struct DecimalParseError(String);

impl FromStr for Decimal {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DecimalParseError(s.to_string());
        let cleaned: String = s.chars().filter(|c| *c != '_').collect();
        let (mantissa, exp) = match cleaned.find(['d', 'D']) {
            Some(pos) => {
                let exp: i32 = cleaned[pos + 1..].parse().map_err(|_| err())?;
                (&cleaned[..pos], exp)
            }
            None => (cleaned.as_str(), 0),
        };
        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let all_digits = format!("{int_part}{frac_part}");
        let magnitude: i128 = all_digits.parse().map_err(|_| err())?;
        let frac_len = i32::try_from(frac_part.len()).map_err(|_| err())?;
        let exponent = exp.checked_sub(frac_len).ok_or_else(err)?;
        let coefficient = if negative { -magnitude } else { magnitude };
        Ok(Decimal::new(coefficient, exponent))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent == 0 {
            return write!(f, "{}.", self.coefficient);
        }
        if self.exponent > 0 {
            return write!(f, "{}d{}", self.coefficient, self.exponent);
        }
        let sign = if self.coefficient < 0 { "-" } else { "" };
        let digits = self.coefficient.unsigned_abs().to_string();
        let scale = self.exponent.unsigned_abs() as usize;
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int_part}.{frac_part}")
        } else {
            let zeros = "0".repeat(scale - digits.len());
            write!(f, "{sign}0.{zeros}{digits}")
        }
    }
}

/// The payload of an [`Element`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A null of the given type (`null`, `null.int`, ...).
    Null(IonType),
    Bool(bool),
    /// An integer; Ion integers are unbounded, this model holds any `i128`.
    Int(i128),
    Float(f64),
    Decimal(Decimal),
    Timestamp(Timestamp),
    Symbol(String),
    String(String),
    Clob(Vec<u8>),
    Blob(Vec<u8>),
    List(Vec<Element>),
    SExp(Vec<Element>),
    /// Ordered fields; duplicate names are allowed.
    Struct(Vec<(String, Element)>),
}

impl Value {
    pub fn ion_type(&self) -> IonType {
        match self {
            Value::Null(t) => *t,
            Value::Bool(_) => IonType::Bool,
            Value::Int(_) => IonType::Int,
            Value::Float(_) => IonType::Float,
            Value::Decimal(_) => IonType::Decimal,
            Value::Timestamp(_) => IonType::Timestamp,
            Value::Symbol(_) => IonType::Symbol,
            Value::String(_) => IonType::String,
            Value::Clob(_) => IonType::Clob,
            Value::Blob(_) => IonType::Blob,
            Value::List(_) => IonType::List,
            Value::SExp(_) => IonType::SExp,
            Value::Struct(_) => IonType::Struct,
        }
    }

    /// Short description used in conversion errors, e.g. `string` or `null.int`.
    pub fn describe(&self) -> String {
        match self {
            Value::Null(IonType::Null) => "null".to_string(),
            Value::Null(t) => format!("null.{t}"),
            other => other.ion_type().to_string(),
        }
    }
}

/// An annotated Ion value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    annotations: Vec<String>,
    value: Value,
}

impl Element {
    pub fn new(value: Value) -> Self {
        Element {
            annotations: Vec::new(),
            value,
        }
    }

    /// The untyped null.
    pub fn null() -> Self {
        Element::new(Value::Null(IonType::Null))
    }

    pub fn typed_null(ion_type: IonType) -> Self {
        Element::new(Value::Null(ion_type))
    }

    pub fn symbol(text: impl Into<String>) -> Self {
        Element::new(Value::Symbol(text.into()))
    }

    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Element::new(Value::Blob(bytes.into()))
    }

    pub fn clob(bytes: impl Into<Vec<u8>>) -> Self {
        Element::new(Value::Clob(bytes.into()))
    }

    pub fn list(items: impl IntoIterator<Item = Element>) -> Self {
        Element::new(Value::List(items.into_iter().collect()))
    }

    pub fn sexp(items: impl IntoIterator<Item = Element>) -> Self {
        Element::new(Value::SExp(items.into_iter().collect()))
    }

    pub fn structure<K: Into<String>>(fields: impl IntoIterator<Item = (K, Element)>) -> Self {
        Element::new(Value::Struct(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Adds an annotation after the existing ones.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn with_annotations<S: Into<String>>(
        mut self,
        annotations: impl IntoIterator<Item = S>,
    ) -> Self {
        self.annotations.extend(annotations.into_iter().map(Into::into));
        self
    }

    /// Inserts an annotation in front of the existing ones.
    pub fn prepend_annotation(&mut self, annotation: impl Into<String>) {
        self.annotations.insert(0, annotation.into());
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a == annotation)
    }

    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn ion_type(&self) -> IonType {
        self.value.ion_type()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null(_))
    }

    /// Returns the struct fields, if this is a non-null struct.
    pub fn as_struct(&self) -> Option<&[(String, Element)]> {
        match &self.value {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the elements of a non-null list or s-expression.
    pub fn as_sequence(&self) -> Option<&[Element]> {
        match &self.value {
            Value::List(items) | Value::SExp(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the text of a string or symbol.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match &self.value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|i| i64::try_from(i).ok())
    }

    /// Looks up a struct field; the last occurrence of a repeated name wins.
    pub fn get(&self, field: &str) -> Option<&Element> {
        self.as_struct()?
            .iter()
            .rev()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Element::new(value)
    }
}

impl From<bool> for Element {
    fn from(value: bool) -> Self {
        Element::new(Value::Bool(value))
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::new(Value::Int(value.into()))
    }
}

impl From<i128> for Element {
    fn from(value: i128) -> Self {
        Element::new(Value::Int(value))
    }
}

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Element::new(Value::Float(value))
    }
}

impl From<Decimal> for Element {
    fn from(value: Decimal) -> Self {
        Element::new(Value::Decimal(value))
    }
}

impl From<Timestamp> for Element {
    fn from(value: Timestamp) -> Self {
        Element::new(Value::Timestamp(value))
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::new(Value::String(value.to_string()))
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::new(Value::String(value))
    }
}
