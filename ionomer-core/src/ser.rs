//! Object graph to element tree.

use log::trace;
use std::any::Any;

use crate::annotation::{self, AnnotationRule};
use crate::codec::ElementWriter;
use crate::describe::{Kind, TypeHandle};
use crate::element::Element;
use crate::error::MapError;
use crate::mapper::MapperState;
use crate::primitive::GUID_ANNOTATION;
use crate::registry::{self, FactoryScope, SerializerRef};
use crate::schema::MemberBinding;

/// Member-level overrides in force for the node being mapped.
#[derive(Clone, Copy, Default)]
pub(crate) struct Site<'b> {
    pub(crate) serializer: Option<&'b SerializerRef>,
    pub(crate) annotation: Option<&'b AnnotationRule>,
}

impl<'b> Site<'b> {
    pub(crate) fn of(binding: &'b MemberBinding) -> Self {
        Site {
            serializer: binding.serializer.as_ref(),
            annotation: binding.annotation.as_ref(),
        }
    }
}

pub(crate) struct Serializer<'m> {
    state: &'m MapperState,
    factories: FactoryScope<'m>,
}

impl<'m> Serializer<'m> {
    pub(crate) fn new(state: &'m MapperState) -> Self {
        Serializer {
            state,
            factories: FactoryScope::new(&state.options),
        }
    }

    pub(crate) fn serialize(
        &mut self,
        value: &dyn Any,
        handle: TypeHandle,
    ) -> Result<Element, MapError> {
        self.write(value, handle, Site::default(), 0)
    }

    fn write(
        &mut self,
        value: &dyn Any,
        handle: TypeHandle,
        site: Site<'_>,
        depth: usize,
    ) -> Result<Element, MapError> {
        let state = self.state;
        let descriptor = state.schemas.descriptor(handle);

        // Wrappers are transparent: they share the depth and the member
        // overrides of the value they hold.
        match descriptor.kind() {
            Kind::Optional(shape) => {
                return match (shape.get)(value).ok_or_else(|| handle.mismatch())? {
                    Some(inner) => self.write(inner, shape.inner, site, depth),
                    None => {
                        let null_type = state.schemas.descriptor(shape.inner).null_type();
                        Ok(Element::typed_null(null_type))
                    }
                };
            }
            Kind::Indirect(shape) => {
                let inner = (shape.get)(value).ok_or_else(|| handle.mismatch())?;
                return self.write(inner, shape.inner, site, depth);
            }
            Kind::Dynamic(shape) => {
                let inner = (shape.inner)(value).ok_or_else(|| handle.mismatch())?;
                let concrete = inner.type_handle();
                trace!("{} holds a {}", shape.base.name(), concrete.name());
                let element = self.write(inner.as_any(), concrete, site, depth)?;
                if site.annotation.is_none() || element.is_null() {
                    return Ok(element);
                }
                // A member rule names the member, not the implementor, so the
                // implementor's own annotation follows it.
                let own = annotation::identity(&state.options, &state.schemas, concrete);
                return Ok(if element.has_annotation(&own) {
                    element
                } else {
                    element.with_annotation(own)
                });
            }
            Kind::Abstract(_) => {
                return Err(MapError::schema(
                    handle.name(),
                    "abstract types are only mapped through a boxed trait object",
                ));
            }
            _ => {}
        }

        if depth > state.options.max_depth {
            return Err(MapError::DepthExceeded {
                max_depth: state.options.max_depth,
            });
        }

        let annotation = annotation::outgoing(
            &state.options,
            &state.schemas,
            handle,
            &descriptor,
            site.annotation,
        );
        if let Some(chosen) = registry::select(
            site.serializer,
            descriptor.serializer_ref(),
            &state.options.serializers,
            handle,
            annotation.as_slice(),
        ) {
            let serializer = self.factories.instantiate(chosen);
            let mut writer = ElementWriter::new();
            serializer.serialize(&mut writer, value)?;
            return Ok(attach(writer.into_element()?, annotation));
        }

        let element = match descriptor.kind() {
            Kind::Scalar(shape) => {
                let element = Element::new((shape.encode)(value).ok_or_else(|| handle.mismatch())?);
                if shape.guid && state.options.annotate_guids {
                    element.with_annotation(GUID_ANNOTATION)
                } else {
                    element
                }
            }
            Kind::Sequence(shape) => {
                let items = (shape.items)(value).ok_or_else(|| handle.mismatch())?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.write(item, shape.element, Site::default(), depth + 1)?);
                }
                Element::list(out)
            }
            Kind::Map(shape) => {
                let entries = (shape.entries)(value).ok_or_else(|| handle.mismatch())?;
                let mut fields = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let element = self.write(item, shape.value, Site::default(), depth + 1)?;
                    fields.push((key.to_string(), element));
                }
                Element::structure(fields)
            }
            Kind::Object(_) => self.write_object(value, handle, depth)?,
            other => {
                return Err(MapError::schema(
                    handle.name(),
                    format!("unexpected {} node", other.label()),
                ));
            }
        };
        Ok(attach(element, annotation))
    }

    fn write_object(
        &mut self,
        value: &dyn Any,
        handle: TypeHandle,
        depth: usize,
    ) -> Result<Element, MapError> {
        let state = self.state;
        let schema = state.schemas.resolve(handle, &state.options)?;
        let mut fields = Vec::with_capacity(schema.bindings().len());
        for binding in schema.bindings() {
            let Some(getter) = binding.getter.as_ref() else {
                continue;
            };
            let member = getter(value).ok_or_else(|| handle.mismatch())?;
            if state.options.ignore_defaults && self.is_default(member.as_any(), binding.ty)? {
                trace!("{}.{} holds its default; omitted", handle.name(), binding.declared_name);
                continue;
            }
            let element = self.write(member.as_any(), binding.ty, Site::of(binding), depth + 1)?;
            if element.is_null() && state.options.ignore_nulls {
                continue;
            }
            fields.push((binding.encoded_name.clone(), element));
        }
        Ok(Element::structure(fields))
    }

    /// Whether `value` equals the default of its type. Types without a
    /// default never match.
    fn is_default(&self, value: &dyn Any, handle: TypeHandle) -> Result<bool, MapError> {
        let Some(default) = self.state.schemas.descriptor(handle).make_default() else {
            return Ok(false);
        };
        self.same_value(value, &*default, handle)
    }

    /// Structural equality over the described shape of `handle`. Scalars
    /// compare through the primitive table; custom serializers never run.
    fn same_value(&self, a: &dyn Any, b: &dyn Any, handle: TypeHandle) -> Result<bool, MapError> {
        let state = self.state;
        let descriptor = state.schemas.descriptor(handle);
        Ok(match descriptor.kind() {
            Kind::Scalar(shape) => {
                let a = (shape.encode)(a).ok_or_else(|| handle.mismatch())?;
                let b = (shape.encode)(b).ok_or_else(|| handle.mismatch())?;
                a == b
            }
            Kind::Sequence(shape) => {
                let a = (shape.items)(a).ok_or_else(|| handle.mismatch())?;
                let b = (shape.items)(b).ok_or_else(|| handle.mismatch())?;
                a.len() == b.len() && self.all_same(a.into_iter().zip(b), shape.element)?
            }
            Kind::Map(shape) => {
                let a = (shape.entries)(a).ok_or_else(|| handle.mismatch())?;
                let b = (shape.entries)(b).ok_or_else(|| handle.mismatch())?;
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (key, va) in a {
                    match b.iter().find(|(other, _)| *other == key) {
                        Some((_, vb)) if self.same_value(va, *vb, shape.value)? => {}
                        _ => return Ok(false),
                    }
                }
                true
            }
            Kind::Optional(shape) => {
                let a = (shape.get)(a).ok_or_else(|| handle.mismatch())?;
                let b = (shape.get)(b).ok_or_else(|| handle.mismatch())?;
                match (a, b) {
                    (None, None) => true,
                    (Some(a), Some(b)) => self.same_value(a, b, shape.inner)?,
                    _ => false,
                }
            }
            Kind::Indirect(shape) => {
                let a = (shape.get)(a).ok_or_else(|| handle.mismatch())?;
                let b = (shape.get)(b).ok_or_else(|| handle.mismatch())?;
                self.same_value(a, b, shape.inner)?
            }
            Kind::Dynamic(shape) => {
                let a = (shape.inner)(a).ok_or_else(|| handle.mismatch())?;
                let b = (shape.inner)(b).ok_or_else(|| handle.mismatch())?;
                a.type_handle() == b.type_handle()
                    && self.same_value(a.as_any(), b.as_any(), a.type_handle())?
            }
            Kind::Object(_) => {
                let schema = state.schemas.resolve(handle, &state.options)?;
                for binding in schema.bindings() {
                    let Some(getter) = binding.getter.as_ref() else {
                        continue;
                    };
                    let ma = getter(a).ok_or_else(|| handle.mismatch())?;
                    let mb = getter(b).ok_or_else(|| handle.mismatch())?;
                    if !self.same_value(ma.as_any(), mb.as_any(), binding.ty)? {
                        return Ok(false);
                    }
                }
                true
            }
            Kind::Abstract(_) => false,
        })
    }

    fn all_same<'v>(
        &self,
        pairs: impl IntoIterator<Item = (&'v dyn Any, &'v dyn Any)>,
        handle: TypeHandle,
    ) -> Result<bool, MapError> {
        for (a, b) in pairs {
            if !self.same_value(a, b, handle)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn attach(mut element: Element, annotation: Option<String>) -> Element {
    if let Some(annotation) = annotation {
        if !element.has_annotation(&annotation) {
            element.prepend_annotation(annotation);
        }
    }
    element
}
