//! Element tree to object graph.

use log::{debug, trace, warn};
use std::any::Any;

use crate::codec::ElementReader;
use crate::describe::{
    AbstractShape, ArgumentSource, ConstructorArgs, DynamicShape, Kind, TypeDescriptor, TypeHandle,
};
use crate::element::Element;
use crate::error::MapError;
use crate::mapper::MapperState;
use crate::registry::{self, FactoryScope};
use crate::schema::{ConstructionStrategy, TypeSchema};
use crate::ser::Site;

pub(crate) struct Deserializer<'m> {
    state: &'m MapperState,
    factories: FactoryScope<'m>,
}

impl<'m> Deserializer<'m> {
    pub(crate) fn new(state: &'m MapperState) -> Self {
        Deserializer {
            state,
            factories: FactoryScope::new(&state.options),
        }
    }

    pub(crate) fn deserialize(
        &mut self,
        element: &Element,
        handle: TypeHandle,
    ) -> Result<Box<dyn Any>, MapError> {
        self.read(element, handle, Site::default(), 0)
    }

    fn read(
        &mut self,
        element: &Element,
        handle: TypeHandle,
        site: Site<'_>,
        depth: usize,
    ) -> Result<Box<dyn Any>, MapError> {
        let state = self.state;
        let descriptor = state.schemas.descriptor(handle);

        match descriptor.kind() {
            Kind::Optional(shape) => {
                return if element.is_null() {
                    Ok((shape.none)())
                } else {
                    (shape.some)(self.read(element, shape.inner, site, depth)?)
                };
            }
            Kind::Indirect(shape) => {
                return (shape.wrap)(self.read(element, shape.inner, site, depth)?);
            }
            Kind::Dynamic(shape) => {
                if element.is_null() {
                    return self.dynamic_null(element, handle, &descriptor, shape, site);
                }
                let concrete = self.concrete_type(element, shape, site)?;
                return (shape.wrap)(self.read(element, concrete, site, depth)?);
            }
            Kind::Abstract(_) => {
                return Err(MapError::schema(
                    handle.name(),
                    "abstract types are only mapped through a boxed trait object",
                ));
            }
            _ => {}
        }

        if !element.is_null() && depth > state.options.max_depth {
            return Err(MapError::DepthExceeded {
                max_depth: state.options.max_depth,
            });
        }

        if let Some(chosen) = registry::select(
            site.serializer,
            descriptor.serializer_ref(),
            &state.options.serializers,
            handle,
            element.annotations(),
        ) {
            let serializer = self.factories.instantiate(chosen);
            return serializer.deserialize(&mut ElementReader::on(element));
        }

        if element.is_null() {
            return self.null_value(handle, &descriptor);
        }

        match descriptor.kind() {
            Kind::Scalar(shape) => (shape.decode)(element.value(), state.options.permissive_mode),
            Kind::Sequence(shape) => {
                let items = element.as_sequence().ok_or_else(|| unexpected(handle, element))?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match self.read(item, shape.element, Site::default(), depth + 1) {
                        Ok(value) => out.push(value),
                        Err(e) if self.tolerates(&e) => {
                            warn!("skipping item {i} of {}: {e}", handle.name())
                        }
                        Err(e) => return Err(e),
                    }
                }
                (shape.build)(out)
            }
            Kind::Map(shape) => {
                let fields = element.as_struct().ok_or_else(|| unexpected(handle, element))?;
                let mut out = Vec::with_capacity(fields.len());
                for (key, item) in fields {
                    match self.read(item, shape.value, Site::default(), depth + 1) {
                        Ok(value) => out.push((key.clone(), value)),
                        Err(e) if self.tolerates(&e) => {
                            warn!("skipping entry {key:?} of {}: {e}", handle.name())
                        }
                        Err(e) => return Err(e),
                    }
                }
                (shape.build)(out)
            }
            Kind::Object(_) => self.read_object(element, handle, &descriptor, depth),
            other => Err(MapError::schema(
                handle.name(),
                format!("unexpected {} node", other.label()),
            )),
        }
    }

    /// A null names no implementor, but custom serializers still see it
    /// before the null default applies.
    fn dynamic_null(
        &mut self,
        element: &Element,
        handle: TypeHandle,
        descriptor: &TypeDescriptor,
        shape: &DynamicShape,
        site: Site<'_>,
    ) -> Result<Box<dyn Any>, MapError> {
        let Some(chosen) = registry::select(
            site.serializer,
            descriptor.serializer_ref(),
            &self.state.options.serializers,
            handle,
            element.annotations(),
        ) else {
            return self.null_value(handle, descriptor);
        };
        let serializer = self.factories.instantiate(chosen);
        let value = serializer.deserialize(&mut ElementReader::on(element))?;
        if (*value).type_id() == handle.id() {
            Ok(value)
        } else {
            (shape.wrap)(value)
        }
    }

    fn read_object(
        &mut self,
        element: &Element,
        handle: TypeHandle,
        descriptor: &TypeDescriptor,
        depth: usize,
    ) -> Result<Box<dyn Any>, MapError> {
        let state = self.state;
        let fields = element.as_struct().ok_or_else(|| unexpected(handle, element))?;
        let schema = state.schemas.resolve(handle, &state.options)?;

        let mut instance = match schema.construction() {
            ConstructionStrategy::DefaultThenAssign => self.instantiate(handle, descriptor)?,
            ConstructionStrategy::DesignatedConstructor { build, .. } => {
                let mut source = FieldArguments {
                    de: self,
                    schema: &schema,
                    fields,
                    depth,
                };
                build(&mut ConstructorArgs::new(&mut source))?
            }
        };

        for (name, value) in fields {
            let Some(binding) = schema.binding(name) else {
                trace!("{} has no member for field {name:?}", handle.name());
                continue;
            };
            let Some(setter) = binding.setter.as_ref() else {
                continue;
            };
            if schema.is_parameter(binding) {
                continue;
            }
            match self.read(value, binding.ty, Site::of(binding), depth + 1) {
                Ok(decoded) => setter(&mut *instance, decoded)?,
                Err(e) if self.tolerates(&e) => {
                    warn!("skipping field {name:?} of {}: {e}", handle.name())
                }
                Err(e) => return Err(e),
            }
        }
        Ok(instance)
    }

    /// The object factory gets the first chance; a value of the wrong type
    /// is discarded in favor of the parameterless constructor.
    fn instantiate(
        &self,
        handle: TypeHandle,
        descriptor: &TypeDescriptor,
    ) -> Result<Box<dyn Any>, MapError> {
        let options = &self.state.options;
        if let Some(factory) = &options.object_factory {
            if let Some(instance) = factory.create(handle, &options.context) {
                if Any::type_id(&*instance) == handle.id() {
                    return Ok(instance);
                }
                debug!("object factory produced the wrong type for {}", handle.name());
            }
        }
        descriptor
            .make_default()
            .ok_or_else(|| {
                MapError::construction(handle.name(), "no parameterless construction path")
            })
    }

    fn concrete_type(
        &self,
        element: &Element,
        shape: &DynamicShape,
        site: Site<'_>,
    ) -> Result<TypeHandle, MapError> {
        let state = self.state;
        if let Some(found) = state.annotations.subtype(
            &state.options,
            &state.schemas,
            element.annotations(),
            shape,
            site.annotation,
        ) {
            return Ok(found);
        }
        match state.schemas.descriptor(shape.base).kind() {
            Kind::Abstract(AbstractShape {
                fallback: Some(fallback),
            }) => {
                debug!("decoding {} as its fallback {}", shape.base.name(), fallback.name());
                Ok(*fallback)
            }
            _ => Err(MapError::construction(
                shape.base.name(),
                "no annotation selects an implementor and no fallback type is declared",
            )),
        }
    }

    fn null_value(
        &self,
        handle: TypeHandle,
        descriptor: &TypeDescriptor,
    ) -> Result<Box<dyn Any>, MapError> {
        if self.state.options.permissive_mode {
            if let Some(default) = descriptor.make_default() {
                warn!("null where {} was expected; using its default", handle.name());
                return Ok(default);
            }
        }
        Err(MapError::conversion(handle.name(), "null"))
    }

    fn missing_argument(
        &self,
        name: &str,
        ty: TypeHandle,
        type_name: &str,
    ) -> Result<Box<dyn Any>, MapError> {
        let descriptor = self.state.schemas.descriptor(ty);
        if let Kind::Optional(shape) = descriptor.kind() {
            return Ok((shape.none)());
        }
        if self.state.options.permissive_mode {
            if let Some(default) = descriptor.make_default() {
                warn!("argument {name:?} of {type_name} is missing; using its default");
                return Ok(default);
            }
        }
        Err(MapError::construction(
            type_name,
            format!("missing required argument {name:?}"),
        ))
    }

    fn tolerates(&self, error: &MapError) -> bool {
        self.state.options.permissive_mode && error.is_recoverable()
    }
}

fn unexpected(handle: TypeHandle, element: &Element) -> MapError {
    MapError::conversion(handle.name(), element.value().describe())
}

/// Feeds designated-constructor arguments from the fields of one struct.
struct FieldArguments<'d, 'm, 'e> {
    de: &'d mut Deserializer<'m>,
    schema: &'d TypeSchema,
    fields: &'e [(String, Element)],
    depth: usize,
}

impl ArgumentSource for FieldArguments<'_, '_, '_> {
    fn argument(&mut self, name: &str, ty: TypeHandle) -> Result<Box<dyn Any>, MapError> {
        let schema = self.schema;
        let binding = schema.argument_binding(name);
        let site = binding.map(Site::of).unwrap_or_default();
        let field_name = binding.map_or(name, |b| b.encoded_name.as_str());
        // Repeated fields: the last occurrence wins.
        let fields = self.fields;
        let found = fields.iter().rev().find(|(field, _)| schema.names_match(field, field_name));
        let Some((_, element)) = found else {
            return self.de.missing_argument(field_name, ty, schema.type_name());
        };
        match self.de.read(element, ty, site, self.depth + 1) {
            Ok(value) => Ok(value),
            Err(e) if self.de.tolerates(&e) => {
                warn!("argument {name:?} of {} failed to decode: {e}", schema.type_name());
                self.de.state.schemas.descriptor(ty).make_default().ok_or(e)
            }
            Err(e) => Err(e),
        }
    }
}
