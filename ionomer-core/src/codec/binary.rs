//! Binary frames: a four byte marker followed by the CBOR encoding of the
//! element sequence.

use crate::codec::CodecError;
use crate::element::{Element, Value};

/// Leading bytes of every binary frame. `0xE0` never starts valid UTF-8 text
/// that the text parser would accept.
const FRAME_MARKER: [u8; 4] = [0xE0, b'I', b'M', 0x01];

pub(crate) fn is_frame(bytes: &[u8]) -> bool {
    bytes.starts_with(&FRAME_MARKER)
}

pub(crate) fn encode(values: &[Element]) -> Result<Vec<u8>, CodecError> {
    let mut out = FRAME_MARKER.to_vec();
    ciborium::into_writer(values, &mut out).map_err(|e| CodecError::Binary(e.to_string()))?;
    Ok(out)
}

/// CBOR containers used per element level: the element map, the value
/// variant map, the item array and, for structs, the field pair.
const CBOR_LEVELS_PER_ELEMENT: usize = 4;

pub(crate) fn decode(bytes: &[u8], nesting_limit: usize) -> Result<Vec<Element>, CodecError> {
    let body = bytes
        .strip_prefix(&FRAME_MARKER[..])
        .ok_or_else(|| CodecError::Binary("missing frame marker".to_string()))?;
    if body.is_empty() {
        return Err(CodecError::UnexpectedEof);
    }
    let recursion_limit = nesting_limit
        .saturating_add(4)
        .saturating_mul(CBOR_LEVELS_PER_ELEMENT);
    let decoded =
        ciborium::de::from_reader_with_recursion_limit::<Vec<Element>, _>(body, recursion_limit);
    let values = decoded.map_err(|e| match e {
        ciborium::de::Error::RecursionLimitExceeded => CodecError::NestingLimit {
            limit: nesting_limit,
        },
        other => CodecError::Binary(other.to_string()),
    })?;
    if values.iter().any(|value| nesting(value) > nesting_limit) {
        return Err(CodecError::NestingLimit {
            limit: nesting_limit,
        });
    }
    Ok(values)
}

/// Number of containers enclosing the innermost value of `element`.
fn nesting(element: &Element) -> usize {
    match element.value() {
        Value::List(items) | Value::SExp(items) => {
            1 + items.iter().map(nesting).max().unwrap_or(0)
        }
        Value::Struct(fields) => 1 + fields.iter().map(|(_, v)| nesting(v)).max().unwrap_or(0),
        _ => 0,
    }
}
