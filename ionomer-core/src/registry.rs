//! Custom serializers and the precedence ladder that selects them.

use log::trace;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::codec::{IonReader, IonWriter};
use crate::describe::{Ionic, TypeHandle};
use crate::error::MapError;
use crate::options::{CustomContext, SerializationOptions};

/// Replaces the engine for every value it is selected for.
///
/// The engine attaches any type annotation the serializer leaves out; the
/// serializer does not need to know about annotations.
pub trait CustomSerializer: Send + Sync {
    fn serialize(&self, writer: &mut dyn IonWriter, value: &dyn Any) -> Result<(), MapError>;

    /// Reads the value the reader is positioned on.
    fn deserialize(&self, reader: &mut dyn IonReader) -> Result<Box<dyn Any>, MapError>;
}

/// Statically typed form of [`CustomSerializer`].
pub trait IonSerializer: Send + Sync + 'static {
    type Value: 'static;

    fn serialize(&self, writer: &mut dyn IonWriter, value: &Self::Value) -> Result<(), MapError>;
    fn deserialize(&self, reader: &mut dyn IonReader) -> Result<Self::Value, MapError>;
}

struct Typed<S>(S);

impl<S: IonSerializer> CustomSerializer for Typed<S> {
    fn serialize(&self, writer: &mut dyn IonWriter, value: &dyn Any) -> Result<(), MapError> {
        let value = value
            .downcast_ref::<S::Value>()
            .ok_or_else(|| {
                MapError::conversion(type_name::<S::Value>(), "a value of another type")
            })?;
        self.0.serialize(writer, value)
    }

    fn deserialize(&self, reader: &mut dyn IonReader) -> Result<Box<dyn Any>, MapError> {
        self.0
            .deserialize(reader)
            .map(|value| Box::new(value) as Box<dyn Any>)
    }
}

/// Erases a typed serializer.
pub fn typed<S: IonSerializer>(serializer: S) -> Arc<dyn CustomSerializer> {
    Arc::new(Typed(serializer))
}

/// Creates a serializer for one serialize/deserialize call, with access to
/// the call's options and custom context.
pub trait SerializerFactory: Send + Sync {
    fn create(
        &self,
        options: &SerializationOptions,
        context: &CustomContext,
    ) -> Arc<dyn CustomSerializer>;
}

impl<F> SerializerFactory for F
where
    F: Fn(&SerializationOptions, &CustomContext) -> Arc<dyn CustomSerializer> + Send + Sync,
{
    fn create(
        &self,
        options: &SerializationOptions,
        context: &CustomContext,
    ) -> Arc<dyn CustomSerializer> {
        self(options, context)
    }
}

/// A ready serializer or a factory producing one.
#[derive(Clone)]
pub enum SerializerRef {
    Instance(Arc<dyn CustomSerializer>),
    Factory(Arc<dyn SerializerFactory>),
}

impl SerializerRef {
    pub fn instance<S: CustomSerializer + 'static>(serializer: S) -> Self {
        SerializerRef::Instance(Arc::new(serializer))
    }

    pub fn typed<S: IonSerializer>(serializer: S) -> Self {
        SerializerRef::Instance(typed(serializer))
    }

    pub fn factory<F: SerializerFactory + 'static>(factory: F) -> Self {
        SerializerRef::Factory(Arc::new(factory))
    }

    pub fn is_factory(&self) -> bool {
        matches!(self, SerializerRef::Factory(_))
    }
}

impl fmt::Debug for SerializerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializerRef::Instance(_) => f.write_str("SerializerRef::Instance"),
            SerializerRef::Factory(_) => f.write_str("SerializerRef::Factory"),
        }
    }
}

/// Serializers keyed by exact type and by annotation.
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    by_type: HashMap<TypeId, SerializerRef>,
    by_annotation: HashMap<String, SerializerRef>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type<T: Ionic + ?Sized>(&mut self, serializer: SerializerRef) {
        self.by_type.insert(TypeId::of::<T>(), serializer);
    }

    pub fn with_type<T: Ionic + ?Sized>(mut self, serializer: SerializerRef) -> Self {
        self.register_type::<T>(serializer);
        self
    }

    pub fn register_annotation(
        &mut self,
        annotation: impl Into<String>,
        serializer: SerializerRef,
    ) {
        self.by_annotation.insert(annotation.into(), serializer);
    }

    pub fn with_annotation(
        mut self,
        annotation: impl Into<String>,
        serializer: SerializerRef,
    ) -> Self {
        self.register_annotation(annotation, serializer);
        self
    }

    pub fn for_type(&self, id: TypeId) -> Option<&SerializerRef> {
        self.by_type.get(&id)
    }

    pub fn for_annotation(&self, annotation: &str) -> Option<&SerializerRef> {
        self.by_annotation.get(annotation)
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.by_annotation.is_empty()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("types", &self.by_type.len())
            .field("annotations", &self.by_annotation.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Selects the serializer for one node, highest precedence first: the
/// member's, the type's own, the type-keyed entry, then the first
/// annotation-keyed entry matching `annotations`.
pub(crate) fn select<'a>(
    member: Option<&'a SerializerRef>,
    declared: Option<&'a SerializerRef>,
    registry: &'a SerializerRegistry,
    handle: TypeHandle,
    annotations: &[String],
) -> Option<&'a SerializerRef> {
    if let Some(found) = member {
        trace!("member serializer selected for {}", handle.name());
        return Some(found);
    }
    if let Some(found) = declared {
        trace!("type-declared serializer selected for {}", handle.name());
        return Some(found);
    }
    if let Some(found) = registry.for_type(handle.id()) {
        trace!("registered serializer selected for {}", handle.name());
        return Some(found);
    }
    annotations.iter().find_map(|annotation| {
        let found = registry.for_annotation(annotation)?;
        trace!("serializer for annotation {annotation:?} selected");
        Some(found)
    })
}

/// Instantiates selected serializers for the span of one call. Factories
/// run at most once per call and never outlive it.
pub(crate) struct FactoryScope<'o> {
    options: &'o SerializationOptions,
    created: HashMap<usize, Arc<dyn CustomSerializer>>,
}

impl<'o> FactoryScope<'o> {
    pub(crate) fn new(options: &'o SerializationOptions) -> Self {
        FactoryScope {
            options,
            created: HashMap::new(),
        }
    }

    pub(crate) fn instantiate(&mut self, chosen: &SerializerRef) -> Arc<dyn CustomSerializer> {
        match chosen {
            SerializerRef::Instance(serializer) => serializer.clone(),
            SerializerRef::Factory(factory) => {
                let key = Arc::as_ptr(factory) as *const () as usize;
                let options = self.options;
                self.created
                    .entry(key)
                    .or_insert_with(|| factory.create(options, &options.context))
                    .clone()
            }
        }
    }
}
