//! The public entry point tying options, schemas, and the two engines
//! together.

use std::any::Any;
use std::sync::Arc;

use crate::annotation::{self, AnnotationResolver};
use crate::codec::{Codec, CodecError, DefaultCodec, IonReader, IonWriter};
use crate::de::Deserializer;
use crate::describe::{Ionic, IonicValue, TypeHandle, downcast};
use crate::element::Element;
use crate::error::MapError;
use crate::options::SerializationOptions;
use crate::schema::{SchemaResolver, TypeSchema};
use crate::ser::Serializer;

pub(crate) struct MapperState {
    pub(crate) options: SerializationOptions,
    pub(crate) schemas: SchemaResolver,
    pub(crate) annotations: AnnotationResolver,
    /// Used when the options carry no codec of their own.
    pub(crate) codec: DefaultCodec,
}

/// Maps values to and from Ion.
///
/// A mapper is immutable once built. Cloning is cheap and every clone
/// shares the same schema cache, so one mapper can serve any number of
/// threads.
///
/// ```
/// use ionomer_core::{IonMapper, Ionic, SerializationOptions};
///
/// #[derive(Debug, Default, PartialEq, Ionic)]
/// struct Engine {
///     cylinders: i32,
///     max_rpm: i32,
/// }
///
/// let mapper = IonMapper::new(SerializationOptions::default());
/// let bytes = mapper.serialize(&Engine { cylinders: 4, max_rpm: 6800 }).unwrap();
/// assert_eq!(bytes, b"{cylinders:4,maxRpm:6800}");
/// let engine: Engine = mapper.deserialize(&bytes).unwrap();
/// assert_eq!(engine.max_rpm, 6800);
/// ```
#[derive(Clone)]
pub struct IonMapper {
    state: Arc<MapperState>,
}

impl Default for IonMapper {
    fn default() -> Self {
        IonMapper::new(SerializationOptions::default())
    }
}

impl IonMapper {
    pub fn new(options: SerializationOptions) -> Self {
        let schemas = SchemaResolver::new();
        let annotations = AnnotationResolver::new(&options, &schemas);
        let codec = DefaultCodec::for_max_depth(options.max_depth);
        IonMapper {
            state: Arc::new(MapperState {
                options,
                schemas,
                annotations,
                codec,
            }),
        }
    }

    pub fn options(&self) -> &SerializationOptions {
        &self.state.options
    }

    /// Encodes one value with the configured codec and format.
    pub fn serialize<T: Ionic>(&self, value: &T) -> Result<Vec<u8>, MapError> {
        let element = self.to_element(value)?;
        Ok(self.codec().encode(&[element], self.state.options.format)?)
    }

    /// Encodes a sequence of values as consecutive top-level values.
    pub fn serialize_all<'v, T, I>(&self, values: I) -> Result<Vec<u8>, MapError>
    where
        T: Ionic,
        I: IntoIterator<Item = &'v T>,
    {
        let elements = values
            .into_iter()
            .map(|value| self.to_element(value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.codec().encode(&elements, self.state.options.format)?)
    }

    /// Writes one value through a caller-owned writer.
    pub fn serialize_to<T: Ionic>(
        &self,
        value: &T,
        writer: &mut dyn IonWriter,
    ) -> Result<(), MapError> {
        let element = self.to_element(value)?;
        writer.write_element(&element)?;
        Ok(())
    }

    pub fn to_element<T: Ionic>(&self, value: &T) -> Result<Element, MapError> {
        Serializer::new(&self.state).serialize(value, TypeHandle::of::<T>())
    }

    /// Maps a value whose concrete type is only known at runtime.
    pub fn to_element_dynamic(&self, value: &dyn IonicValue) -> Result<Element, MapError> {
        Serializer::new(&self.state).serialize(value.as_any(), value.type_handle())
    }

    /// Decodes the single top-level value of `bytes`.
    ///
    /// Any value after the first is an error; streams of values go through
    /// [`IonMapper::deserialize_all`].
    pub fn deserialize<T: Ionic>(&self, bytes: &[u8]) -> Result<T, MapError> {
        let values = self.decode(bytes)?;
        match values.as_slice() {
            [] => Err(CodecError::UnexpectedEof.into()),
            [element] => self.from_element(element),
            [_, rest @ ..] => Err(CodecError::TrailingValues { extra: rest.len() }.into()),
        }
    }

    /// Decodes every top-level value of `bytes`.
    pub fn deserialize_all<T: Ionic>(&self, bytes: &[u8]) -> Result<Vec<T>, MapError> {
        self.decode(bytes)?
            .iter()
            .map(|element| self.from_element(element))
            .collect()
    }

    /// Reads the next value from a caller-owned reader.
    pub fn deserialize_from<T: Ionic>(&self, reader: &mut dyn IonReader) -> Result<T, MapError> {
        let element = reader.read_element()?;
        self.from_element(&element)
    }

    pub fn from_element<T: Ionic>(&self, element: &Element) -> Result<T, MapError> {
        downcast(self.deserialize_dynamic(element, TypeHandle::of::<T>())?)
    }

    /// Decodes into the type named by `ty`, returning the value boxed.
    pub fn deserialize_dynamic(
        &self,
        element: &Element,
        ty: TypeHandle,
    ) -> Result<Box<dyn Any>, MapError> {
        Deserializer::new(&self.state).deserialize(element, ty)
    }

    /// The member schema used for `T`, built on first use and cached.
    pub fn schema<T: Ionic>(&self) -> Result<Arc<TypeSchema>, MapError> {
        self.state.schemas.resolve(TypeHandle::of::<T>(), &self.state.options)
    }

    /// The annotation written for top-level values of `T`, if any.
    pub fn annotation_of<T: Ionic>(&self) -> Option<String> {
        let state = &*self.state;
        let handle = TypeHandle::of::<T>();
        let descriptor = state.schemas.descriptor(handle);
        annotation::outgoing(&state.options, &state.schemas, handle, &descriptor, None)
    }

    /// Looks an annotation up in the configured search catalogs.
    pub fn resolve_annotation(&self, annotation: &str) -> Result<TypeHandle, MapError> {
        self.state.annotations.resolve(annotation)
    }

    fn codec(&self) -> &dyn Codec {
        self.state.options.codec.as_deref().unwrap_or(&self.state.codec)
    }

    /// Input nested past what `max_depth` admits fails the same way an
    /// over-deep graph does.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Element>, MapError> {
        self.codec().decode(bytes).map_err(|e| match e {
            CodecError::NestingLimit { .. } => MapError::DepthExceeded {
                max_depth: self.state.options.max_depth,
            },
            other => other.into(),
        })
    }
}
