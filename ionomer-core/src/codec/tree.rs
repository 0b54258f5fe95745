use crate::codec::{CodecError, IonReader, IonWriter};
use crate::element::{Decimal, Element, IonType, Timestamp, Value};

/// An [`IonWriter`] that builds [`Element`] trees.
#[derive(Debug, Default)]
pub struct ElementWriter {
    stack: Vec<OpenContainer>,
    field_name: Option<String>,
    annotations: Vec<String>,
    output: Vec<Element>,
}

#[derive(Debug)]
struct OpenContainer {
    ion_type: IonType,
    field_name: Option<String>,
    annotations: Vec<String>,
    items: Vec<Element>,
    fields: Vec<(String, Element)>,
}

impl ElementWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed top-level values.
    pub fn finish(self) -> Result<Vec<Element>, CodecError> {
        if !self.stack.is_empty() {
            return Err(CodecError::InvalidState(format!(
                "{} container(s) still open",
                self.stack.len()
            )));
        }
        Ok(self.output)
    }

    /// Returns the single top-level value written.
    pub fn into_element(self) -> Result<Element, CodecError> {
        let mut values = self.finish()?;
        match values.len() {
            1 => Ok(values.remove(0)),
            n => Err(CodecError::InvalidState(format!(
                "expected exactly one top-level value, found {n}"
            ))),
        }
    }

    fn push(&mut self, value: Value) -> Result<(), CodecError> {
        let element = Element::new(value).with_annotations(std::mem::take(&mut self.annotations));
        let field_name = self.field_name.take();
        self.attach(field_name, element)
    }

    fn attach(&mut self, field_name: Option<String>, element: Element) -> Result<(), CodecError> {
        match self.stack.last_mut() {
            None => self.output.push(element),
            Some(open) if open.ion_type == IonType::Struct => {
                let name = field_name.ok_or_else(|| {
                    CodecError::InvalidState("struct field written without a name".to_string())
                })?;
                open.fields.push((name, element));
            }
            Some(open) => open.items.push(element),
        }
        Ok(())
    }
}

impl IonWriter for ElementWriter {
    fn set_field_name(&mut self, name: &str) {
        self.field_name = Some(name.to_string());
    }

    fn add_annotation(&mut self, annotation: &str) {
        self.annotations.push(annotation.to_string());
    }

    fn write_null(&mut self, ion_type: IonType) -> Result<(), CodecError> {
        self.push(Value::Null(ion_type))
    }

    fn write_bool(&mut self, value: bool) -> Result<(), CodecError> {
        self.push(Value::Bool(value))
    }

    fn write_int(&mut self, value: i128) -> Result<(), CodecError> {
        self.push(Value::Int(value))
    }

    fn write_f64(&mut self, value: f64) -> Result<(), CodecError> {
        self.push(Value::Float(value))
    }

    fn write_decimal(&mut self, value: Decimal) -> Result<(), CodecError> {
        self.push(Value::Decimal(value))
    }

    fn write_timestamp(&mut self, value: Timestamp) -> Result<(), CodecError> {
        self.push(Value::Timestamp(value))
    }

    fn write_symbol(&mut self, value: &str) -> Result<(), CodecError> {
        self.push(Value::Symbol(value.to_string()))
    }

    fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        self.push(Value::String(value.to_string()))
    }

    fn write_blob(&mut self, value: &[u8]) -> Result<(), CodecError> {
        self.push(Value::Blob(value.to_vec()))
    }

    fn write_clob(&mut self, value: &[u8]) -> Result<(), CodecError> {
        self.push(Value::Clob(value.to_vec()))
    }

    fn step_in(&mut self, container: IonType) -> Result<(), CodecError> {
        if !container.is_container() {
            return Err(CodecError::InvalidState(format!(
                "cannot step into {container}"
            )));
        }
        self.stack.push(OpenContainer {
            ion_type: container,
            field_name: self.field_name.take(),
            annotations: std::mem::take(&mut self.annotations),
            items: Vec::new(),
            fields: Vec::new(),
        });
        Ok(())
    }

    fn step_out(&mut self) -> Result<(), CodecError> {
        let open = self
            .stack
            .pop()
            .ok_or_else(|| CodecError::InvalidState("step_out at top level".to_string()))?;
        let value = match open.ion_type {
            IonType::Struct => Value::Struct(open.fields),
            IonType::SExp => Value::SExp(open.items),
            _ => Value::List(open.items),
        };
        let element = Element::new(value).with_annotations(open.annotations);
        self.attach(open.field_name, element)
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Current<'a> {
    field_name: Option<&'a str>,
    element: &'a Element,
}

#[derive(Debug)]
struct Cursor<'a> {
    entries: Vec<Current<'a>>,
    next: usize,
}

/// An [`IonReader`] over borrowed [`Element`] trees.
#[derive(Debug)]
pub struct ElementReader<'a> {
    levels: Vec<Cursor<'a>>,
    current: Option<Current<'a>>,
}

impl<'a> ElementReader<'a> {
    /// Creates a reader positioned before the first of `values`.
    pub fn new(values: &'a [Element]) -> Self {
        let entries = values
            .iter()
            .map(|element| Current {
                field_name: None,
                element,
            })
            .collect();
        ElementReader {
            levels: vec![Cursor { entries, next: 0 }],
            current: None,
        }
    }

    /// Creates a reader already positioned on `element`.
    pub fn on(element: &'a Element) -> Self {
        let mut reader = ElementReader::new(std::slice::from_ref(element));
        reader.advance();
        reader
    }

    fn advance(&mut self) -> Option<IonType> {
        let cursor = self.levels.last_mut()?;
        self.current = cursor.entries.get(cursor.next).copied();
        if self.current.is_some() {
            cursor.next += 1;
        }
        self.current.map(|c| c.element.ion_type())
    }

    fn value(&self) -> Result<&'a Value, CodecError> {
        self.current
            .map(|c| c.element.value())
            .ok_or_else(not_positioned)
    }
}

impl IonReader for ElementReader<'_> {
    fn next(&mut self) -> Result<Option<IonType>, CodecError> {
        Ok(self.advance())
    }

    fn ion_type(&self) -> Option<IonType> {
        self.current.map(|c| c.element.ion_type())
    }

    fn is_null(&self) -> bool {
        self.current.is_some_and(|c| c.element.is_null())
    }

    fn field_name(&self) -> Option<&str> {
        self.current.and_then(|c| c.field_name)
    }

    fn annotations(&self) -> &[String] {
        match self.current {
            Some(c) => c.element.annotations(),
            None => &[],
        }
    }

    fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.value()? {
            Value::Bool(b) => Ok(*b),
            other => Err(CodecError::mismatch(IonType::Bool, other)),
        }
    }

    fn read_int(&mut self) -> Result<i128, CodecError> {
        match self.value()? {
            Value::Int(i) => Ok(*i),
            other => Err(CodecError::mismatch(IonType::Int, other)),
        }
    }

    fn read_f64(&mut self) -> Result<f64, CodecError> {
        match self.value()? {
            Value::Float(f) => Ok(*f),
            other => Err(CodecError::mismatch(IonType::Float, other)),
        }
    }

    fn read_decimal(&mut self) -> Result<Decimal, CodecError> {
        match self.value()? {
            Value::Decimal(d) => Ok(*d),
            other => Err(CodecError::mismatch(IonType::Decimal, other)),
        }
    }

    fn read_timestamp(&mut self) -> Result<Timestamp, CodecError> {
        match self.value()? {
            Value::Timestamp(t) => Ok(*t),
            other => Err(CodecError::mismatch(IonType::Timestamp, other)),
        }
    }

    fn read_symbol(&mut self) -> Result<String, CodecError> {
        match self.value()? {
            Value::Symbol(s) | Value::String(s) => Ok(s.clone()),
            other => Err(CodecError::mismatch(IonType::Symbol, other)),
        }
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        match self.value()? {
            Value::String(s) | Value::Symbol(s) => Ok(s.clone()),
            other => Err(CodecError::mismatch(IonType::String, other)),
        }
    }

    fn read_blob(&mut self) -> Result<Vec<u8>, CodecError> {
        match self.value()? {
            Value::Blob(b) => Ok(b.clone()),
            other => Err(CodecError::mismatch(IonType::Blob, other)),
        }
    }

    fn read_clob(&mut self) -> Result<Vec<u8>, CodecError> {
        match self.value()? {
            Value::Clob(b) => Ok(b.clone()),
            other => Err(CodecError::mismatch(IonType::Clob, other)),
        }
    }

    fn step_in(&mut self) -> Result<(), CodecError> {
        let current = self
            .current
            .ok_or_else(not_positioned)?;
        let entries = match current.element.value() {
            Value::List(items) | Value::SExp(items) => items
                .iter()
                .map(|element| Current {
                    field_name: None,
                    element,
                })
                .collect(),
            Value::Struct(fields) => fields
                .iter()
                .map(|(name, element)| Current {
                    field_name: Some(name.as_str()),
                    element,
                })
                .collect(),
            other => {
                return Err(CodecError::InvalidState(format!(
                    "cannot step into {}",
                    other.describe()
                )));
            }
        };
        self.levels.push(Cursor { entries, next: 0 });
        self.current = None;
        Ok(())
    }

    fn step_out(&mut self) -> Result<(), CodecError> {
        if self.levels.len() <= 1 {
            return Err(CodecError::InvalidState("step_out at top level".to_string()));
        }
        self.levels.pop();
        self.current = None;
        Ok(())
    }

    fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    fn read_element(&mut self) -> Result<Element, CodecError> {
        self.current
            .map(|c| c.element.clone())
            .ok_or_else(not_positioned)
    }
}

fn not_positioned() -> CodecError {
    CodecError::InvalidState("reader is not positioned on a value".to_string())
}
