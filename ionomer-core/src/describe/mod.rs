//! Static type descriptions.
//!
//! Every mappable type implements [`Ionic`], returning a [`TypeDescriptor`]
//! that tells the engines how to reach into values of that type: which kind
//! of node it is, how to read and write its members, and how to build new
//! instances. Descriptors are usually produced by `#[derive(Ionic)]`; the
//! builder API in this module is what the derive expands to.

mod builder;
mod impls;

pub use builder::{ArgumentSource, Constructor, ConstructorArgs, Member, MemberValue, ObjectBuilder};
pub(crate) use builder::{ConstructFn, Getter, Setter};

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::annotation::AnnotationRule;
use crate::element::{IonType, Value};
use crate::error::MapError;
use crate::primitive::{self, Primitive};
use crate::registry::SerializerRef;

/// A type the mapper knows how to encode and decode.
///
/// Implemented for trait objects (`dyn Vehicle`) too, where it describes an
/// abstract base that concrete types can extend.
pub trait Ionic: 'static {
    fn describe() -> TypeDescriptor;
}

/// Object-safe access to a mappable value whose concrete type is only
/// known at runtime.
pub trait IonicValue: Any + Send + Sync + 'static {
    fn type_handle(&self) -> TypeHandle;
    fn as_any(&self) -> &dyn Any;
    fn as_ionic(&self) -> &dyn IonicValue;
}

impl<T: Ionic + Send + Sync> IonicValue for T {
    fn type_handle(&self) -> TypeHandle {
        TypeHandle::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_ionic(&self) -> &dyn IonicValue {
        self
    }
}

/// Runtime identity of an [`Ionic`] type. Equal handles name the same type.
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    name: &'static str,
    describe: fn() -> TypeDescriptor,
}

impl TypeHandle {
    pub fn of<T: Ionic + ?Sized>() -> Self {
        TypeHandle {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            describe: T::describe,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full Rust type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn describe(&self) -> TypeDescriptor {
        (self.describe)()
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Error for a value that is not of this type.
    pub(crate) fn mismatch(&self) -> MapError {
        MapError::conversion(self.name, "a value of another type")
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeHandle").field(&self.name).finish()
    }
}

/// Produces a fresh boxed default instance.
pub type DefaultFn = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

/// Everything the engines need to know about one type.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) module: String,
    pub(crate) kind: Kind,
    pub(crate) annotation: Option<AnnotationRule>,
    pub(crate) serializer: Option<SerializerRef>,
    pub(crate) ancestors: Vec<TypeHandle>,
    pub(crate) default: Option<DefaultFn>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, module: impl Into<String>, kind: Kind) -> Self {
        TypeDescriptor {
            name: name.into(),
            module: module.into(),
            kind,
            annotation: None,
            serializer: None,
            ancestors: Vec::new(),
            default: None,
        }
    }

    /// Starts describing a structured type.
    pub fn object<T: Ionic>(
        name: impl Into<String>,
        module: impl Into<String>,
    ) -> ObjectBuilder<T> {
        ObjectBuilder::new(name.into(), module.into())
    }

    /// Describes a type converted through the primitive table.
    pub fn scalar<T: Primitive>(name: impl Into<String>) -> Self {
        Self::scalar_in::<T>(name, "")
    }

    /// Like [`TypeDescriptor::scalar`] for user types living in `module`.
    pub fn scalar_in<T: Primitive>(name: impl Into<String>, module: impl Into<String>) -> Self {
        TypeDescriptor::new(
            name,
            module,
            Kind::Scalar(ScalarShape {
                ion_type: T::ION_TYPE,
                guid: T::GUID,
                encode: primitive::encode::<T>,
                decode: primitive::decode::<T>,
            }),
        )
        .with_default(T::default)
    }

    /// Describes `Box<dyn B>`, the owning handle of a polymorphic base.
    pub fn dynamic<B: PolymorphicBase + ?Sized>() -> Self {
        TypeDescriptor::new(
            format!("Box<{}>", type_name::<B>()),
            "",
            Kind::Dynamic(DynamicShape {
                base: TypeHandle::of::<B>(),
                implementors: B::implementors,
                inner: dynamic_inner::<B>,
                wrap: dynamic_wrap::<B>,
            }),
        )
    }

    /// Describes an abstract base such as `dyn Vehicle`.
    pub fn abstract_type(name: impl Into<String>, module: impl Into<String>) -> Self {
        TypeDescriptor::new(name, module, Kind::Abstract(AbstractShape { fallback: None }))
    }

    /// Concrete type decoded for an abstract base when no annotation
    /// selects one.
    pub fn fallback<T: Ionic>(mut self) -> Self {
        if let Kind::Abstract(shape) = &mut self.kind {
            shape.fallback = Some(TypeHandle::of::<T>());
        }
        self
    }

    pub fn annotate(mut self, rule: AnnotationRule) -> Self {
        self.annotation = Some(rule);
        self
    }

    pub fn serializer(mut self, serializer: SerializerRef) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Declares `B` as a base whose annotation rule this type may inherit.
    pub fn extends<B: Ionic + ?Sized>(mut self) -> Self {
        let handle = TypeHandle::of::<B>();
        if !self.ancestors.contains(&handle) {
            self.ancestors.push(handle);
        }
        self
    }

    pub fn with_default<T, F>(mut self, make: F) -> Self
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(move || Box::new(make()) as Box<dyn Any>));
        self
    }

    /// Simple type name used for annotations.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module path used as the default annotation prefix.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn annotation(&self) -> Option<&AnnotationRule> {
        self.annotation.as_ref()
    }

    pub fn serializer_ref(&self) -> Option<&SerializerRef> {
        self.serializer.as_ref()
    }

    pub fn ancestors(&self) -> &[TypeHandle] {
        &self.ancestors
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn make_default(&self) -> Option<Box<dyn Any>> {
        self.default.as_ref().map(|make| make())
    }

    /// Ion type written for a null of this type.
    pub(crate) fn null_type(&self) -> IonType {
        match &self.kind {
            Kind::Scalar(shape) => shape.ion_type,
            Kind::Sequence(_) => IonType::List,
            Kind::Map(_) | Kind::Object(_) => IonType::Struct,
            _ => IonType::Null,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("kind", &self.kind)
            .field("annotation", &self.annotation)
            .field("ancestors", &self.ancestors)
            .finish_non_exhaustive()
    }
}

/// The node shape of a type.
#[derive(Clone)]
pub enum Kind {
    Scalar(ScalarShape),
    Sequence(SequenceShape),
    Map(MapShape),
    /// `Option<T>`: null when absent.
    Optional(OptionalShape),
    /// `Box<T>`, `Arc<T>`: written as the pointee.
    Indirect(IndirectShape),
    Object(ObjectShape),
    /// `Box<dyn Base>`: written as the concrete value.
    Dynamic(DynamicShape),
    /// `dyn Base` itself; never instantiated.
    Abstract(AbstractShape),
}

impl Kind {
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Scalar(_) => "scalar",
            Kind::Sequence(_) => "sequence",
            Kind::Map(_) => "map",
            Kind::Optional(_) => "optional",
            Kind::Indirect(_) => "indirect",
            Kind::Object(_) => "object",
            Kind::Dynamic(_) => "dynamic",
            Kind::Abstract(_) => "abstract",
        }
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Object(shape) => f
                .debug_struct("Object")
                .field("members", &shape.members)
                .field("constructors", &shape.constructors.len())
                .finish(),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Clone, Copy)]
pub struct ScalarShape {
    pub ion_type: IonType,
    pub guid: bool,
    pub encode: fn(&dyn Any) -> Option<Value>,
    pub decode: fn(&Value, bool) -> Result<Box<dyn Any>, MapError>,
}

#[derive(Clone, Copy)]
pub struct SequenceShape {
    pub element: TypeHandle,
    pub items: fn(&dyn Any) -> Option<Vec<&dyn Any>>,
    pub build: fn(Vec<Box<dyn Any>>) -> Result<Box<dyn Any>, MapError>,
}

/// String-keyed maps, written as structs.
#[derive(Clone, Copy)]
pub struct MapShape {
    pub value: TypeHandle,
    pub entries: fn(&dyn Any) -> Option<Vec<(&str, &dyn Any)>>,
    pub build: fn(Vec<(String, Box<dyn Any>)>) -> Result<Box<dyn Any>, MapError>,
}

#[derive(Clone, Copy)]
pub struct OptionalShape {
    pub inner: TypeHandle,
    /// Outer `None` when the value is not an option of this type.
    pub get: fn(&dyn Any) -> Option<Option<&dyn Any>>,
    pub some: fn(Box<dyn Any>) -> Result<Box<dyn Any>, MapError>,
    pub none: fn() -> Box<dyn Any>,
}

#[derive(Clone, Copy)]
pub struct IndirectShape {
    pub inner: TypeHandle,
    pub get: fn(&dyn Any) -> Option<&dyn Any>,
    pub wrap: fn(Box<dyn Any>) -> Result<Box<dyn Any>, MapError>,
}

#[derive(Clone, Copy)]
pub struct DynamicShape {
    pub base: TypeHandle,
    pub implementors: fn() -> Vec<TypeHandle>,
    pub inner: fn(&dyn Any) -> Option<&dyn IonicValue>,
    pub wrap: fn(Box<dyn Any>) -> Result<Box<dyn Any>, MapError>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AbstractShape {
    pub fallback: Option<TypeHandle>,
}

#[derive(Clone, Default)]
pub struct ObjectShape {
    pub(crate) members: Vec<MemberDescriptor>,
    pub(crate) constructors: Vec<ConstructorDescriptor>,
}

impl ObjectShape {
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }
}

/// Where a member's value lives on the declaring type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberSource {
    Property,
    /// Written under its declared name unless renamed.
    Field,
    /// A getter/setter pair explicitly marked as a member.
    Method,
}

/// One declared member, before options are applied.
#[derive(Clone)]
pub struct MemberDescriptor {
    pub(crate) name: String,
    pub(crate) source: MemberSource,
    pub(crate) ty: TypeHandle,
    pub(crate) rename: Option<String>,
    pub(crate) ignore: bool,
    pub(crate) include: bool,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) serializer: Option<SerializerRef>,
    pub(crate) annotation: Option<AnnotationRule>,
}

impl MemberDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> MemberSource {
        self.source
    }

    pub fn member_type(&self) -> TypeHandle {
        self.ty
    }

    pub fn rename(&self) -> Option<&str> {
        self.rename.as_deref()
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("ty", &self.ty)
            .field("rename", &self.rename)
            .field("ignore", &self.ignore)
            .field("readable", &self.getter.is_some())
            .field("writable", &self.setter.is_some())
            .finish_non_exhaustive()
    }
}

/// A constructor marked as the designated construction path.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub(crate) params: Vec<String>,
    pub(crate) build: ConstructFn,
}

impl ConstructorDescriptor {
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

/// A trait object base with a closed set of registered implementors.
///
/// Implemented by [`polymorphic!`](crate::polymorphic) for `dyn Base`.
pub trait PolymorphicBase: Ionic + IonicValue {
    fn implementors() -> Vec<TypeHandle>;

    /// Boxes a decoded concrete value as the base, handing it back when it
    /// is not one of the implementors.
    fn upcast(value: Box<dyn Any>) -> Result<Box<Self>, Box<dyn Any>>;
}

fn dynamic_inner<B: PolymorphicBase + ?Sized>(value: &dyn Any) -> Option<&dyn IonicValue> {
    value.downcast_ref::<Box<B>>().map(|boxed| (**boxed).as_ionic())
}

fn dynamic_wrap<B: PolymorphicBase + ?Sized>(
    value: Box<dyn Any>,
) -> Result<Box<dyn Any>, MapError> {
    B::upcast(value)
        .map(|boxed| Box::new(boxed) as Box<dyn Any>)
        .map_err(|_| {
            MapError::conversion(type_name::<B>(), "a type that is not a registered implementor")
        })
}

/// Unboxes a type-erased value.
pub fn downcast<T: 'static>(value: Box<dyn Any>) -> Result<T, MapError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| MapError::conversion(type_name::<T>(), "a value of another type"))
}

/// Registers the concrete implementors of a trait object base.
///
/// ```ignore
/// polymorphic!(dyn Vehicle => [Car, Truck]);
/// ```
///
/// The trait must have [`IonicValue`] as a supertrait and `dyn Vehicle`
/// must implement [`Ionic`] itself. Afterwards `Box<dyn Vehicle>` can be
/// used wherever an [`Ionic`] type is expected.
#[macro_export]
macro_rules! polymorphic {
    (dyn $base:path => [$($ty:ty),* $(,)?]) => {
        impl $crate::describe::PolymorphicBase for dyn $base {
            fn implementors() -> ::std::vec::Vec<$crate::describe::TypeHandle> {
                ::std::vec![$($crate::describe::TypeHandle::of::<$ty>()),*]
            }

            fn upcast(
                value: ::std::boxed::Box<dyn ::std::any::Any>,
            ) -> ::std::result::Result<
                ::std::boxed::Box<Self>,
                ::std::boxed::Box<dyn ::std::any::Any>,
            > {
                $(
                    let value = match value.downcast::<$ty>() {
                        ::std::result::Result::Ok(concrete) => {
                            let boxed: ::std::boxed::Box<Self> = concrete;
                            return ::std::result::Result::Ok(boxed);
                        }
                        ::std::result::Result::Err(other) => other,
                    };
                )*
                ::std::result::Result::Err(value)
            }
        }

        impl $crate::describe::Ionic for ::std::boxed::Box<dyn $base> {
            fn describe() -> $crate::describe::TypeDescriptor {
                $crate::describe::TypeDescriptor::dynamic::<dyn $base>()
            }
        }
    };
}
