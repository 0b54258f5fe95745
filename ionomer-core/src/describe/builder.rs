use std::any::{Any, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

use super::{
    ConstructorDescriptor, Ionic, Kind, MemberDescriptor, MemberSource, ObjectShape, TypeDescriptor,
    TypeHandle, downcast,
};
use crate::annotation::AnnotationRule;
use crate::error::MapError;
use crate::registry::SerializerRef;

pub(crate) type Getter = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<MemberValue<'a>> + Send + Sync>;
pub(crate) type Setter =
    Arc<dyn Fn(&mut dyn Any, Box<dyn Any>) -> Result<(), MapError> + Send + Sync>;
pub(crate) type ConstructFn =
    Arc<dyn Fn(&mut ConstructorArgs<'_>) -> Result<Box<dyn Any>, MapError> + Send + Sync>;

/// A member value read through a getter: borrowed from the instance or
/// computed on the fly.
pub enum MemberValue<'a> {
    Borrowed(&'a dyn Any),
    Owned(Box<dyn Any>),
}

impl MemberValue<'_> {
    pub fn as_any(&self) -> &dyn Any {
        match self {
            MemberValue::Borrowed(value) => *value,
            MemberValue::Owned(value) => value.as_ref(),
        }
    }
}

fn erase_getter<F>(get: F) -> Getter
where
    F: for<'a> Fn(&'a dyn Any) -> Option<MemberValue<'a>> + Send + Sync + 'static,
{
    Arc::new(get)
}

/// Builds the descriptor of a structured type.
pub struct ObjectBuilder<T> {
    descriptor: TypeDescriptor,
    shape: ObjectShape,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Ionic> ObjectBuilder<T> {
    pub(crate) fn new(name: String, module: String) -> Self {
        ObjectBuilder {
            descriptor: TypeDescriptor::new(name, module, Kind::Object(ObjectShape::default())),
            shape: ObjectShape::default(),
            _marker: PhantomData,
        }
    }

    pub fn member<M: Ionic>(mut self, member: Member<T, M>) -> Self {
        self.shape.members.push(member.descriptor);
        self
    }

    pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
        self.shape.constructors.push(ConstructorDescriptor {
            params: constructor.params,
            build: constructor.build,
        });
        self
    }

    /// Parameterless construction used by default-then-assign decoding.
    pub fn default_constructor<F>(mut self, make: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.descriptor = self.descriptor.with_default(make);
        self
    }

    pub fn annotate(mut self, rule: AnnotationRule) -> Self {
        self.descriptor = self.descriptor.annotate(rule);
        self
    }

    pub fn serializer(mut self, serializer: SerializerRef) -> Self {
        self.descriptor = self.descriptor.serializer(serializer);
        self
    }

    pub fn extends<B: Ionic + ?Sized>(mut self) -> Self {
        self.descriptor = self.descriptor.extends::<B>();
        self
    }

    pub fn build(mut self) -> TypeDescriptor {
        self.descriptor.kind = Kind::Object(self.shape);
        self.descriptor
    }
}

/// Declares one member of `T` holding an `M`.
pub struct Member<T, M> {
    descriptor: MemberDescriptor,
    _marker: PhantomData<fn(&T) -> M>,
}

impl<T: Ionic, M: Ionic> Member<T, M> {
    fn with_source(name: &str, source: MemberSource) -> Self {
        Member {
            descriptor: MemberDescriptor {
                name: name.to_string(),
                source,
                ty: TypeHandle::of::<M>(),
                rename: None,
                ignore: false,
                include: false,
                getter: None,
                setter: None,
                serializer: None,
                annotation: None,
            },
            _marker: PhantomData,
        }
    }

    /// A public property, named by the active naming convention.
    pub fn property(name: &str) -> Self {
        Self::with_source(name, MemberSource::Property)
    }

    /// A field, only mapped when fields are included.
    pub fn field(name: &str) -> Self {
        Self::with_source(name, MemberSource::Field)
    }

    /// A getter/setter method pair.
    pub fn method(name: &str) -> Self {
        let mut member = Self::with_source(name, MemberSource::Method);
        member.descriptor.include = true;
        member
    }

    pub fn get<F>(mut self, get: F) -> Self
    where
        F: for<'a> Fn(&'a T) -> &'a M + Send + Sync + 'static,
    {
        self.descriptor.getter = Some(erase_getter(move |value| {
            value
                .downcast_ref::<T>()
                .map(|target| MemberValue::Borrowed(get(target)))
        }));
        self
    }

    /// A getter that computes the member value.
    pub fn get_owned<F>(mut self, get: F) -> Self
    where
        F: Fn(&T) -> M + Send + Sync + 'static,
    {
        self.descriptor.getter = Some(erase_getter(move |value| {
            value
                .downcast_ref::<T>()
                .map(|target| MemberValue::Owned(Box::new(get(target))))
        }));
        self
    }

    pub fn set<F>(mut self, set: F) -> Self
    where
        F: Fn(&mut T, M) + Send + Sync + 'static,
    {
        self.descriptor.setter = Some(Arc::new(
            move |target: &mut dyn Any, value: Box<dyn Any>| -> Result<(), MapError> {
                let target = target
                    .downcast_mut::<T>()
                    .ok_or_else(|| {
                        MapError::conversion(type_name::<T>(), "a value of another type")
                    })?;
                set(target, downcast::<M>(value)?);
                Ok(())
            },
        ));
        self
    }

    /// Explicit encoded name; wins over every naming convention.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.descriptor.rename = Some(name.into());
        self
    }

    pub fn ignore(mut self) -> Self {
        self.descriptor.ignore = true;
        self
    }

    /// Maps a field even when fields are not included by default.
    pub fn include(mut self) -> Self {
        self.descriptor.include = true;
        self
    }

    pub fn serializer(mut self, serializer: SerializerRef) -> Self {
        self.descriptor.serializer = Some(serializer);
        self
    }

    pub fn annotate(mut self, rule: AnnotationRule) -> Self {
        self.descriptor.annotation = Some(rule);
        self
    }
}

/// A designated constructor binding named incoming fields to arguments.
pub struct Constructor<T> {
    params: Vec<String>,
    build: ConstructFn,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Ionic> Constructor<T> {
    /// `params` name the members the constructor reads, by declared name or
    /// by encoded field name; `build` pulls each one out of the
    /// [`ConstructorArgs`] under the same name.
    pub fn designated<I, S, F>(params: I, build: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&mut ConstructorArgs<'_>) -> Result<T, MapError> + Send + Sync + 'static,
    {
        Constructor {
            params: params.into_iter().map(Into::into).collect(),
            build: Arc::new(
                move |args: &mut ConstructorArgs<'_>| -> Result<Box<dyn Any>, MapError> {
                    build(args).map(|value| Box::new(value) as Box<dyn Any>)
                },
            ),
            _marker: PhantomData,
        }
    }
}

/// Supplies decoded constructor arguments by encoded name.
pub trait ArgumentSource {
    fn argument(&mut self, name: &str, ty: TypeHandle) -> Result<Box<dyn Any>, MapError>;
}

/// Arguments handed to a designated constructor. Each argument is decoded
/// when taken.
pub struct ConstructorArgs<'s> {
    source: &'s mut dyn ArgumentSource,
}

impl<'s> ConstructorArgs<'s> {
    pub fn new(source: &'s mut dyn ArgumentSource) -> Self {
        ConstructorArgs { source }
    }

    /// Decodes the field named `name` as an `A`.
    ///
    /// A missing field yields `None` for `Option` arguments and a
    /// construction error otherwise.
    pub fn take<A: Ionic>(&mut self, name: &str) -> Result<A, MapError> {
        let value = self.source.argument(name, TypeHandle::of::<A>())?;
        downcast(value)
    }
}
