//! Ionomer maps Rust object graphs to and from Amazon Ion.
//!
//! Core concepts:
//! - **Ionic**: A type the mapper can describe (scalar, collection, or object with members)
//! - **TypeSchema**: The resolved member bindings and construction strategy of an object type
//! - **Annotation rules**: Decide which values carry a type annotation and which concrete
//!   type an annotation selects when decoding a `Box<dyn Trait>`
//! - **Custom serializers**: Replace the engine for one member, one type, or one annotation
//! - **IonMapper**: The entry point; immutable, cheap to clone, safe to share across threads
//!
//! # Example
//!
//! ```
//! use ionomer_core::{IonMapper, Ionic, SerializationOptions};
//!
//! #[derive(Debug, Default, PartialEq, Ionic)]
//! struct Car {
//!     make: String,
//!     year: i32,
//!     weight_in_kg: f64,
//! }
//!
//! let mapper = IonMapper::new(SerializationOptions::default());
//! let car = Car { make: "Honda".into(), year: 2010, weight_in_kg: 1500.0 };
//! let element = mapper.to_element(&car).unwrap();
//! assert!(element.get("weightInKg").is_some());
//! assert_eq!(mapper.from_element::<Car>(&element).unwrap(), car);
//! ```
//!
//! # Binary format note
//!
//! No Ion binary implementation is bundled. [`Format::Binary`] produces a
//! tagged CBOR frame of the element tree, which this crate reads back but
//! other Ion readers do not. Plug a real Ion codec in through
//! [`OptionsBuilder::codec`] when interoperability matters.

extern crate self as ionomer_core;

mod annotation;
pub mod codec;
mod de;
pub mod describe;
mod element;
mod error;
mod mapper;
mod naming;
mod options;
mod primitive;
mod registry;
mod schema;
mod ser;

pub use annotation::{
    AnnotationConvention, AnnotationName, AnnotationPrefix, AnnotationRule, FixedPrefix,
    ModulePathPrefix, SimpleName, TypeCatalog,
};
pub use codec::{Codec, CodecError, DefaultCodec, Format, IonReader, IonWriter};
pub use describe::{
    ArgumentSource, Constructor, ConstructorArgs, Ionic, IonicValue, Kind, Member, MemberSource,
    PolymorphicBase, TypeDescriptor, TypeHandle, downcast,
};
pub use element::{Decimal, DecimalParseError, Element, IonType, Timestamp, Value};
pub use error::MapError;
pub use mapper::IonMapper;
pub use naming::{NamingConvention, encoded_name};
pub use options::{
    CustomContext, DEFAULT_MAX_DEPTH, ObjectFactory, OptionsBuilder, SerializationOptions,
};
pub use primitive::{Bytes, Clob, GUID_ANNOTATION, Primitive, Symbol};
pub use registry::{
    CustomSerializer, IonSerializer, SerializerFactory, SerializerRef, SerializerRegistry, typed,
};
pub use schema::{ConstructionStrategy, MemberBinding, TypeSchema};

#[cfg(feature = "derive")]
pub use ionomer_derive::{Ionic, ionic};
