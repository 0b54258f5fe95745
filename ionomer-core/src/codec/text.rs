//! Ion text rendering and parsing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDate, SecondsFormat, TimeZone, Utc};
use std::fmt::{self, Write as _};

use crate::codec::{CodecError, DEFAULT_NESTING_LIMIT};
use crate::element::{Decimal, Element, IonType, Timestamp, Value};

/// Renders an element as compact Ion text.
pub fn to_text(element: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, element, None);
    out
}

/// Renders an element as indented Ion text.
pub fn to_pretty_text(element: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, element, Some(0));
    out
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_text(self))
    }
}

fn write_element(out: &mut String, element: &Element, indent: Option<usize>) {
    for annotation in element.annotations() {
        write_symbol(out, annotation);
        out.push_str("::");
    }
    match element.value() {
        Value::Null(IonType::Null) => out.push_str("null"),
        Value::Null(t) => {
            out.push_str("null.");
            out.push_str(t.name());
        }
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => write_float(out, *f),
        Value::Decimal(d) => {
            let _ = write!(out, "{d}");
        }
        Value::Timestamp(t) => out.push_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Symbol(s) => write_symbol(out, s),
        Value::String(s) => write_quoted(out, s, '"'),
        Value::Clob(bytes) => {
            out.push_str("{{\"");
            for b in bytes {
                match *b {
                    b'"' => out.push_str("\\\""),
                    b'\\' => out.push_str("\\\\"),
                    0x20..=0x7e => out.push(*b as char),
                    other => {
                        let _ = write!(out, "\\x{other:02x}");
                    }
                }
            }
            out.push_str("\"}}");
        }
        Value::Blob(bytes) => {
            out.push_str("{{");
            out.push_str(&BASE64.encode(bytes));
            out.push_str("}}");
        }
        Value::List(items) => {
            write_container(out, '[', ']', ",", items.iter().map(|e| (None, e)), indent)
        }
        Value::SExp(items) => {
            write_container(out, '(', ')', "", items.iter().map(|e| (None, e)), indent)
        }
        Value::Struct(fields) => write_container(
            out,
            '{',
            '}',
            ",",
            fields.iter().map(|(name, e)| (Some(name.as_str()), e)),
            indent,
        ),
    }
}

fn write_container<'a>(
    out: &mut String,
    open: char,
    close: char,
    separator: &str,
    entries: impl ExactSizeIterator<Item = (Option<&'a str>, &'a Element)>,
    indent: Option<usize>,
) {
    out.push(open);
    let len = entries.len();
    if len == 0 {
        out.push(close);
        return;
    }
    let child_indent = indent.map(|i| i + 2);
    for (i, (name, element)) in entries.enumerate() {
        match child_indent {
            Some(n) => {
                out.push('\n');
                out.push_str(&" ".repeat(n));
            }
            None if i > 0 && separator.is_empty() => out.push(' '),
            None => {}
        }
        if let Some(name) = name {
            write_symbol(out, name);
            out.push(':');
            if child_indent.is_some() {
                out.push(' ');
            }
        }
        write_element(out, element, child_indent);
        if i + 1 < len {
            out.push_str(separator);
        }
    }
    if let Some(n) = indent {
        out.push('\n');
        out.push_str(&" ".repeat(n));
    }
    out.push(close);
}

fn write_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("nan");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "+inf" } else { "-inf" });
    } else {
        let _ = write!(out, "{f:e}");
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => {}
        _ => return false,
    }
    chars.all(is_ident_part) && !matches!(text, "null" | "true" | "false" | "nan")
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn write_symbol(out: &mut String, text: &str) {
    if is_identifier(text) {
        out.push_str(text);
    } else {
        write_quoted(out, text, '\'');
    }
}

fn write_quoted(out: &mut String, text: &str, quote: char) {
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

/// Parses a stream of Ion text values, nesting containers at most
/// [`DEFAULT_NESTING_LIMIT`] deep.
pub fn parse_text(text: &str) -> Result<Vec<Element>, CodecError> {
    parse_text_with_limit(text, DEFAULT_NESTING_LIMIT)
}

/// Parses a stream of Ion text values, failing with
/// [`CodecError::NestingLimit`] once containers nest deeper than
/// `nesting_limit`.
pub fn parse_text_with_limit(text: &str, nesting_limit: usize) -> Result<Vec<Element>, CodecError> {
    let mut parser = Parser {
        text,
        pos: 0,
        depth: 0,
        nesting_limit,
    };
    let mut values = Vec::new();
    loop {
        parser.skip_whitespace()?;
        if parser.at_end() {
            return Ok(values);
        }
        values.push(parser.parse_value(false)?);
    }
}

const OPERATOR_CHARS: &str = "!#%&*+-./;<=>?@^`|~";

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    /// Containers currently open.
    depth: usize,
    nesting_limit: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> CodecError {
        CodecError::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        if self.depth >= self.nesting_limit {
            return Err(CodecError::NestingLimit {
                limit: self.nesting_limit,
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, s: &str) -> Result<(), CodecError> {
        if self.starts_with(s) {
            self.pos += s.len();
            Ok(())
        } else if self.at_end() {
            Err(CodecError::UnexpectedEof)
        } else {
            Err(self.error(format!("expected {s:?}")))
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), CodecError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.starts_with("//") => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.starts_with("/*") => {
                    let end = self.rest()[2..].find("*/").ok_or(CodecError::UnexpectedEof)?;
                    self.pos += 2 + end + 2;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Consumes `::` (after optional whitespace) if present.
    fn annotation_separator(&mut self) -> Result<bool, CodecError> {
        let saved = self.pos;
        self.skip_whitespace()?;
        if self.starts_with("::") {
            self.pos += 2;
            Ok(true)
        } else {
            self.pos = saved;
            Ok(false)
        }
    }

    fn parse_value(&mut self, in_sexp: bool) -> Result<Element, CodecError> {
        let mut annotations = Vec::new();
        loop {
            self.skip_whitespace()?;
            let c = self.peek().ok_or(CodecError::UnexpectedEof)?;
            if c == '\'' && !self.starts_with("'''") {
                let symbol = self.parse_quoted('\'')?;
                if self.annotation_separator()? {
                    annotations.push(symbol);
                    continue;
                }
                return Ok(Element::symbol(symbol).with_annotations(annotations));
            }
            if is_ident_start(c) {
                let word = self.read_identifier();
                if self.annotation_separator()? {
                    annotations.push(word);
                    continue;
                }
                let value = self.keyword_or_symbol(word)?;
                return Ok(Element::new(value).with_annotations(annotations));
            }
            let value = self.parse_unannotatable(c, in_sexp)?;
            return Ok(Element::new(value).with_annotations(annotations));
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_part) {
            self.bump();
        }
        self.text[start..self.pos].to_string()
    }

    fn keyword_or_symbol(&mut self, word: String) -> Result<Value, CodecError> {
        Ok(match word.as_str() {
            "null" => {
                if self.peek() == Some('.') {
                    self.bump();
                    let type_name = self.read_identifier();
                    let ion_type = IonType::from_name(&type_name)
                        .ok_or_else(|| self.error(format!("unknown null type {type_name:?}")))?;
                    Value::Null(ion_type)
                } else {
                    Value::Null(IonType::Null)
                }
            }
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "nan" => Value::Float(f64::NAN),
            _ => Value::Symbol(word),
        })
    }

    fn parse_unannotatable(&mut self, c: char, in_sexp: bool) -> Result<Value, CodecError> {
        match c {
            '"' => Ok(Value::String(self.parse_quoted('"')?)),
            '\'' => Ok(Value::String(self.parse_long_strings()?)),
            '{' if self.starts_with("{{") => self.parse_lob(),
            '{' => self.nested(Self::parse_struct),
            '[' => self.nested(Self::parse_list),
            '(' => self.nested(Self::parse_sexp),
            c if c.is_ascii_digit() => self.parse_number(),
            '-' | '+' if self.sign_starts_number() => self.parse_number(),
            c if in_sexp && OPERATOR_CHARS.contains(c) => {
                let start = self.pos;
                while self.peek().is_some_and(|c| OPERATOR_CHARS.contains(c)) {
                    self.bump();
                }
                Ok(Value::Symbol(self.text[start..self.pos].to_string()))
            }
            other => Err(self.error(format!("unexpected character {other:?}"))),
        }
    }

    fn sign_starts_number(&self) -> bool {
        let after = &self.rest()[1..];
        after.starts_with("inf") || after.chars().next().is_some_and(|c| c.is_ascii_digit())
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, CodecError> {
        self.expect(&quote.to_string())?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or(CodecError::UnexpectedEof)?;
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    if let Some(ch) = self.parse_escape()? {
                        out.push(ch);
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn parse_long_strings(&mut self) -> Result<String, CodecError> {
        let mut out = String::new();
        loop {
            self.expect("'''")?;
            loop {
                if self.starts_with("'''") {
                    self.pos += 3;
                    break;
                }
                let c = self.bump().ok_or(CodecError::UnexpectedEof)?;
                if c == '\\' {
                    if let Some(ch) = self.parse_escape()? {
                        out.push(ch);
                    }
                } else {
                    out.push(c);
                }
            }
            let saved = self.pos;
            self.skip_whitespace()?;
            if !self.starts_with("'''") {
                self.pos = saved;
                return Ok(out);
            }
        }
    }

    /// Parses the escape after a backslash; `None` for a line continuation.
    fn parse_escape(&mut self) -> Result<Option<char>, CodecError> {
        let c = self.bump().ok_or(CodecError::UnexpectedEof)?;
        let ch = match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'v' => '\u{0b}',
            '\\' | '"' | '\'' | '/' | '?' => c,
            '\n' => return Ok(None),
            'x' => self.parse_hex_escape(2)?,
            'u' => self.parse_hex_escape(4)?,
            'U' => self.parse_hex_escape(8)?,
            other => return Err(self.error(format!("invalid escape \\{other}"))),
        };
        Ok(Some(ch))
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char, CodecError> {
        let end = self.pos + digits;
        let hex = self.text.get(self.pos..end).ok_or(CodecError::UnexpectedEof)?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("escape is not a valid code point"))
    }

    fn parse_lob(&mut self) -> Result<Value, CodecError> {
        self.expect("{{")?;
        self.skip_whitespace()?;
        let value = if self.starts_with("'''") {
            Value::Clob(text_to_clob(&self.parse_long_strings()?, self)?)
        } else if self.starts_with("\"") {
            Value::Clob(text_to_clob(&self.parse_quoted('"')?, self)?)
        } else {
            let end = self.rest().find("}}").ok_or(CodecError::UnexpectedEof)?;
            let encoded: String =
                self.rest()[..end].chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| self.error(format!("invalid base64: {e}")))?;
            self.pos += end;
            Value::Blob(bytes)
        };
        self.skip_whitespace()?;
        self.expect("}}")?;
        Ok(value)
    }

    fn parse_struct(&mut self) -> Result<Value, CodecError> {
        self.expect("{")?;
        let mut fields = Vec::new();
        loop {
            self.skip_whitespace()?;
            match self.peek() {
                None => return Err(CodecError::UnexpectedEof),
                Some('}') => {
                    self.bump();
                    return Ok(Value::Struct(fields));
                }
                _ => {}
            }
            let name = match self.peek() {
                Some('"') => self.parse_quoted('"')?,
                Some('\'') if self.starts_with("'''") => self.parse_long_strings()?,
                Some('\'') => self.parse_quoted('\'')?,
                Some(c) if is_ident_start(c) => self.read_identifier(),
                _ => return Err(self.error("expected field name")),
            };
            self.skip_whitespace()?;
            if self.starts_with("::") {
                return Err(self.error("field names cannot be annotated"));
            }
            self.expect(":")?;
            let value = self.parse_value(false)?;
            fields.push((name, value));
            self.skip_whitespace()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {}
                None => return Err(CodecError::UnexpectedEof),
                Some(_) => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_list(&mut self) -> Result<Value, CodecError> {
        self.expect("[")?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace()?;
            match self.peek() {
                None => return Err(CodecError::UnexpectedEof),
                Some(']') => {
                    self.bump();
                    return Ok(Value::List(items));
                }
                _ => {}
            }
            items.push(self.parse_value(false)?);
            self.skip_whitespace()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {}
                None => return Err(CodecError::UnexpectedEof),
                Some(_) => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_sexp(&mut self) -> Result<Value, CodecError> {
        self.expect("(")?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace()?;
            match self.peek() {
                None => return Err(CodecError::UnexpectedEof),
                Some(')') => {
                    self.bump();
                    return Ok(Value::SExp(items));
                }
                _ => items.push(self.parse_value(true)?),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, CodecError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-' | ':'))
        {
            self.bump();
        }
        let token = &self.text[start..self.pos];
        let invalid = |what: &str| CodecError::Parse {
            position: start,
            message: format!("invalid {what} {token:?}"),
        };
        match token {
            "+inf" => return Ok(Value::Float(f64::INFINITY)),
            "-inf" => return Ok(Value::Float(f64::NEG_INFINITY)),
            _ => {}
        }
        if looks_like_timestamp(token) {
            return parse_timestamp(token)
                .map(Value::Timestamp)
                .ok_or_else(|| invalid("timestamp"));
        }
        let (negative, unsigned) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let radix = if unsigned.starts_with("0x") || unsigned.starts_with("0X") {
            Some(16)
        } else if unsigned.starts_with("0b") || unsigned.starts_with("0B") {
            Some(2)
        } else {
            None
        };
        if let Some(radix) = radix {
            let digits: String = unsigned[2..].chars().filter(|c| *c != '_').collect();
            let magnitude = i128::from_str_radix(&digits, radix).map_err(|_| invalid("integer"))?;
            let signed = if negative { -magnitude } else { magnitude };
            return Ok(Value::Int(signed));
        }
        let cleaned: String = token.chars().filter(|c| *c != '_').collect();
        if cleaned.contains(['e', 'E']) {
            return cleaned.parse().map(Value::Float).map_err(|_| invalid("float"));
        }
        if cleaned.contains(['d', 'D', '.']) {
            return cleaned
                .parse::<Decimal>()
                .map(Value::Decimal)
                .map_err(|_| invalid("decimal"));
        }
        cleaned.parse().map(Value::Int).map_err(|_| invalid("integer"))
    }
}

fn text_to_clob(text: &str, parser: &Parser<'_>) -> Result<Vec<u8>, CodecError> {
    text.chars()
        .map(|c| {
            u8::try_from(c as u32).map_err(|_| parser.error("clob characters must be below U+0100"))
        })
        .collect()
}

fn looks_like_timestamp(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() >= 5 && bytes[..4].iter().all(u8::is_ascii_digit) && matches!(bytes[4], b'-' | b'T')
}

/// Parses Ion timestamp text at year, month, day, minute or second precision.
fn parse_timestamp(token: &str) -> Option<Timestamp> {
    let (date, time) = match token.split_once('T') {
        Some((date, time)) => (date, time),
        None => (token, ""),
    };
    let naive_date = match date.len() {
        4 => NaiveDate::from_ymd_opt(date.parse().ok()?, 1, 1)?,
        7 => NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d").ok()?,
        10 => NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?,
        _ => return None,
    };
    if time.is_empty() {
        let midnight = naive_date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight).into());
    }
    let offset_at = time.rfind(['Z', 'z', '+', '-'])?;
    let (clock, offset) = time.split_at(offset_at);
    let clock = if clock.matches(':').count() == 1 {
        format!("{clock}:00")
    } else {
        clock.to_string()
    };
    let date = naive_date.format("%Y-%m-%d");
    chrono::DateTime::parse_from_rfc3339(&format!("{date}T{clock}{offset}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(text: &str) -> Element {
        let mut values = parse_text(text).unwrap();
        assert_eq!(values.len(), 1, "{text}");
        values.remove(0)
    }

    #[test]
    fn scalars() {
        assert_eq!(parse_one("null"), Element::null());
        assert_eq!(parse_one("null.string"), Element::typed_null(IonType::String));
        assert_eq!(parse_one("true"), Element::from(true));
        assert_eq!(parse_one("-42"), Element::from(-42i64));
        assert_eq!(parse_one("0x1F"), Element::from(31i64));
        assert_eq!(parse_one("0b101"), Element::from(5i64));
        assert_eq!(parse_one("1_000"), Element::from(1000i64));
        assert_eq!(parse_one("7.3e-1"), Element::from(0.73f64));
        assert_eq!(parse_one("0.73"), Element::from(Decimal::new(73, -2)));
        assert_eq!(parse_one("\"a\\nb\""), Element::from("a\nb"));
        assert_eq!(parse_one("'''ab''' '''cd'''"), Element::from("abcd"));
        assert_eq!(parse_one("'hello world'"), Element::symbol("hello world"));
        assert_eq!(parse_one("{{AQID}}"), Element::blob(vec![1, 2, 3]));
        assert_eq!(parse_one("{{\"hi\"}}"), Element::clob(b"hi".to_vec()));
        assert!(matches!(parse_one("nan").value(), Value::Float(f) if f.is_nan()));
        assert_eq!(parse_one("-inf"), Element::from(f64::NEG_INFINITY));
    }

    #[test]
    fn timestamps_at_each_precision() {
        let full = parse_one("2009-10-10T13:15:21Z");
        assert_eq!(
            full,
            Element::from(chrono::DateTime::parse_from_rfc3339("2009-10-10T13:15:21Z").unwrap())
        );
        let minute = parse_one("2009-10-10T13:15+02:00");
        assert_eq!(
            minute,
            Element::from(
                chrono::DateTime::parse_from_rfc3339("2009-10-10T13:15:00+02:00").unwrap()
            )
        );
        for day in ["2009-10-10", "2009-10-10T"] {
            assert_eq!(
                parse_one(day),
                Element::from(chrono::DateTime::parse_from_rfc3339("2009-10-10T00:00:00Z").unwrap())
            );
        }
        assert!(matches!(parse_one("2009T").value(), Value::Timestamp(_)));
        assert!(matches!(parse_one("2009-10T").value(), Value::Timestamp(_)));
    }

    #[test]
    fn containers_and_annotations() {
        let e = parse_one(
            "// a car\n garage::'Car'::{ make: \"Honda\", 'model': \"Civic\", \
             /* n */ tags: [a, b,], op: (+ 1 2) }",
        );
        assert_eq!(e.annotations(), ["garage".to_string(), "Car".to_string()]);
        assert_eq!(e.get("make"), Some(&Element::from("Honda")));
        assert_eq!(e.get("model"), Some(&Element::from("Civic")));
        assert_eq!(
            e.get("tags"),
            Some(&Element::list([Element::symbol("a"), Element::symbol("b")]))
        );
        assert_eq!(
            e.get("op"),
            Some(&Element::sexp([
                Element::symbol("+"),
                Element::from(1i64),
                Element::from(2i64)
            ]))
        );
    }

    #[test]
    fn multiple_top_level_values() {
        let values = parse_text("1 two \"three\"").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1], Element::symbol("two"));
    }

    #[test]
    fn rendering_roundtrips() {
        let ts = chrono::DateTime::parse_from_rfc3339("2009-10-10T13:15:21+02:00").unwrap();
        let e = Element::structure([
            ("make", Element::from("Hon\"da")),
            ("weight In Kg", Element::from(Decimal::new(73, -2))),
            ("ratio", Element::from(0.5f64)),
            ("built", Element::from(ts)),
            ("raw", Element::blob(vec![0, 255])),
            ("text", Element::clob(vec![b'a', 0x7f])),
            ("none", Element::typed_null(IonType::Struct)),
            ("empty", Element::list([])),
            ("kw", Element::symbol("null")),
            ("form", Element::sexp([Element::symbol("f"), Element::from(1i64)])),
        ])
        .with_annotation("a::b");
        for text in [to_text(&e), to_pretty_text(&e)] {
            assert_eq!(parse_text(&text).unwrap(), vec![e.clone()], "{text}");
        }
    }

    #[test]
    fn compact_text_shape() {
        let e = Element::structure([
            ("a", Element::from(1i64)),
            ("b", Element::list([Element::from(true)])),
        ])
        .with_annotation("T");
        assert_eq!(e.to_string(), "T::{a:1,b:[true]}");
    }

    #[test]
    fn errors_report_position() {
        assert!(matches!(parse_text("{a 1}"), Err(CodecError::Parse { position: 3, .. })));
        assert!(matches!(parse_text("[1, 2"), Err(CodecError::UnexpectedEof)));
        assert!(matches!(parse_text("\"open"), Err(CodecError::UnexpectedEof)));
        assert!(parse_text(&format!("1{}", "0".repeat(40))).is_err());
    }

    #[test]
    fn integers_beyond_i64() {
        assert_eq!(parse_one("18446744073709551615"), Element::from(u64::MAX as i128));
        assert_eq!(parse_one("-0xFFFFFFFFFFFFFFFF"), Element::from(-(u64::MAX as i128)));
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing_further() {
        let text = "[".repeat(20_000) + &"]".repeat(20_000);
        assert!(matches!(
            parse_text(&text),
            Err(CodecError::NestingLimit { limit: DEFAULT_NESTING_LIMIT })
        ));

        let within = "[".repeat(10) + &"]".repeat(10);
        assert!(parse_text_with_limit(&within, 10).is_ok());
        let mixed = "{a:[(x)]}";
        assert!(parse_text_with_limit(mixed, 3).is_ok());
        assert!(matches!(
            parse_text_with_limit(mixed, 2),
            Err(CodecError::NestingLimit { limit: 2 })
        ));
    }
}
