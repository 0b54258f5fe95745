//! Reader/writer boundary between the mapping engines and the wire encoding.
//!
//! The engines build [`Element`] trees; custom serializers talk to the
//! [`IonWriter`]/[`IonReader`] traits; a [`Codec`] turns trees into bytes.

mod binary;
mod text;
mod tree;

pub use text::{parse_text, parse_text_with_limit, to_pretty_text, to_text};
pub use tree::{ElementReader, ElementWriter};

use serde::{Deserialize, Serialize};

use crate::element::{Decimal, Element, IonType, Timestamp, Value};
use crate::options::DEFAULT_MAX_DEPTH;

/// Container nesting a decoder tolerates beyond the mapper's `max_depth`.
/// Custom serializers may write containers of their own below a member.
pub const NESTING_MARGIN: usize = 64;

/// Container nesting accepted by [`parse_text`] and [`DefaultCodec::default`].
pub const DEFAULT_NESTING_LIMIT: usize = DEFAULT_MAX_DEPTH + NESTING_MARGIN;

/// Error raised by readers, writers and codecs.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: IonType, found: String },
    #[error("invalid writer or reader state: {0}")]
    InvalidState(String),
    #[error("binary frame error: {0}")]
    Binary(String),
    #[error("containers nested deeper than {limit}")]
    NestingLimit { limit: usize },
    #[error("expected a single value, found {extra} more after it")]
    TrailingValues { extra: usize },
}

impl CodecError {
    pub(crate) fn mismatch(expected: IonType, found: &Value) -> Self {
        CodecError::TypeMismatch {
            expected,
            found: found.describe(),
        }
    }
}

/// Output flavour of the encoded stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    Binary,
    #[default]
    Text,
    PrettyText,
}

/// Writes typed values, containers and annotations.
///
/// Field names and annotations are staged and consumed by the next value or
/// container written.
pub trait IonWriter {
    fn set_field_name(&mut self, name: &str);
    fn add_annotation(&mut self, annotation: &str);
    fn write_null(&mut self, ion_type: IonType) -> Result<(), CodecError>;
    fn write_bool(&mut self, value: bool) -> Result<(), CodecError>;
    fn write_int(&mut self, value: i128) -> Result<(), CodecError>;
    fn write_f64(&mut self, value: f64) -> Result<(), CodecError>;
    fn write_decimal(&mut self, value: Decimal) -> Result<(), CodecError>;
    fn write_timestamp(&mut self, value: Timestamp) -> Result<(), CodecError>;
    fn write_symbol(&mut self, value: &str) -> Result<(), CodecError>;
    fn write_string(&mut self, value: &str) -> Result<(), CodecError>;
    fn write_blob(&mut self, value: &[u8]) -> Result<(), CodecError>;
    fn write_clob(&mut self, value: &[u8]) -> Result<(), CodecError>;
    /// Opens a list, s-expression or struct.
    fn step_in(&mut self, container: IonType) -> Result<(), CodecError>;
    fn step_out(&mut self) -> Result<(), CodecError>;
    /// Number of containers currently open.
    fn depth(&self) -> usize;

    /// Writes a whole element, including its annotations.
    fn write_element(&mut self, element: &Element) -> Result<(), CodecError> {
        for annotation in element.annotations() {
            self.add_annotation(annotation);
        }
        match element.value() {
            Value::Null(t) => self.write_null(*t),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(i) => self.write_int(*i),
            Value::Float(f) => self.write_f64(*f),
            Value::Decimal(d) => self.write_decimal(*d),
            Value::Timestamp(t) => self.write_timestamp(*t),
            Value::Symbol(s) => self.write_symbol(s),
            Value::String(s) => self.write_string(s),
            Value::Clob(b) => self.write_clob(b),
            Value::Blob(b) => self.write_blob(b),
            Value::List(items) | Value::SExp(items) => {
                self.step_in(element.ion_type())?;
                for item in items {
                    self.write_element(item)?;
                }
                self.step_out()
            }
            Value::Struct(fields) => {
                self.step_in(IonType::Struct)?;
                for (name, value) in fields {
                    self.set_field_name(name);
                    self.write_element(value)?;
                }
                self.step_out()
            }
        }
    }
}

/// Peeks at and consumes typed values, containers and annotations.
pub trait IonReader {
    /// Advances to the next value at the current depth.
    fn next(&mut self) -> Result<Option<IonType>, CodecError>;
    /// Type of the current value, if positioned on one.
    fn ion_type(&self) -> Option<IonType>;
    fn is_null(&self) -> bool;
    /// Field name of the current value when inside a struct.
    fn field_name(&self) -> Option<&str>;
    fn annotations(&self) -> &[String];
    fn read_bool(&mut self) -> Result<bool, CodecError>;
    fn read_int(&mut self) -> Result<i128, CodecError>;
    fn read_f64(&mut self) -> Result<f64, CodecError>;
    fn read_decimal(&mut self) -> Result<Decimal, CodecError>;
    fn read_timestamp(&mut self) -> Result<Timestamp, CodecError>;
    fn read_symbol(&mut self) -> Result<String, CodecError>;
    fn read_string(&mut self) -> Result<String, CodecError>;
    fn read_blob(&mut self) -> Result<Vec<u8>, CodecError>;
    fn read_clob(&mut self) -> Result<Vec<u8>, CodecError>;
    /// Enters the current container.
    fn step_in(&mut self) -> Result<(), CodecError>;
    /// Leaves the innermost container, skipping any unread values.
    fn step_out(&mut self) -> Result<(), CodecError>;
    fn depth(&self) -> usize;
    /// Materializes the current value, including annotations.
    fn read_element(&mut self) -> Result<Element, CodecError>;
}

/// Turns element trees into bytes and back.
///
/// Supplying a custom codec in the options overrides how readers and writers
/// are constructed for the byte-level entry points.
pub trait Codec: Send + Sync {
    fn encode(&self, values: &[Element], format: Format) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Element>, CodecError>;
}

/// Text output for the text formats, a marked binary frame for `Binary`.
///
/// Decoding refuses input whose containers nest deeper than the codec's
/// nesting limit, in either encoding.
#[derive(Debug, Clone, Copy)]
pub struct DefaultCodec {
    nesting_limit: usize,
}

impl Default for DefaultCodec {
    fn default() -> Self {
        DefaultCodec::with_nesting_limit(DEFAULT_NESTING_LIMIT)
    }
}

impl DefaultCodec {
    pub fn with_nesting_limit(nesting_limit: usize) -> Self {
        DefaultCodec { nesting_limit }
    }

    /// A codec that admits every graph a mapper with this `max_depth` writes.
    pub fn for_max_depth(max_depth: usize) -> Self {
        DefaultCodec::with_nesting_limit(max_depth.saturating_add(NESTING_MARGIN))
    }

    pub fn nesting_limit(&self) -> usize {
        self.nesting_limit
    }
}

impl Codec for DefaultCodec {
    fn encode(&self, values: &[Element], format: Format) -> Result<Vec<u8>, CodecError> {
        match format {
            Format::Binary => binary::encode(values),
            Format::Text => Ok(values
                .iter()
                .map(to_text)
                .collect::<Vec<_>>()
                .join(" ")
                .into_bytes()),
            Format::PrettyText => Ok(values
                .iter()
                .map(to_pretty_text)
                .collect::<Vec<_>>()
                .join("\n")
                .into_bytes()),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Element>, CodecError> {
        if binary::is_frame(bytes) {
            return binary::decode(bytes, self.nesting_limit);
        }
        let text = std::str::from_utf8(bytes).map_err(|e| CodecError::Parse {
            position: e.valid_up_to(),
            message: "input is neither a binary frame nor UTF-8 text".to_string(),
        })?;
        parse_text_with_limit(text, self.nesting_limit)
    }
}
