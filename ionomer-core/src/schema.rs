//! Member-binding schemas resolved from type descriptors and options.

use indexmap::IndexMap;
use log::debug;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::annotation::AnnotationRule;
use crate::describe::{ConstructFn, Getter, Kind, MemberSource, Setter, TypeDescriptor, TypeHandle};
use crate::error::MapError;
use crate::options::SerializationOptions;
use crate::registry::SerializerRef;

/// How new instances of a type are produced while decoding.
#[derive(Clone)]
pub enum ConstructionStrategy {
    /// Create with no arguments, then assign writable bindings.
    DefaultThenAssign,
    /// Call the designated constructor with arguments bound by encoded name.
    DesignatedConstructor { params: Vec<String>, build: ConstructFn },
}

impl ConstructionStrategy {
    pub fn is_designated(&self) -> bool {
        matches!(self, ConstructionStrategy::DesignatedConstructor { .. })
    }

    pub fn parameters(&self) -> &[String] {
        match self {
            ConstructionStrategy::DefaultThenAssign => &[],
            ConstructionStrategy::DesignatedConstructor { params, .. } => params,
        }
    }
}

impl fmt::Debug for ConstructionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionStrategy::DefaultThenAssign => f.write_str("DefaultThenAssign"),
            ConstructionStrategy::DesignatedConstructor { params, .. } => {
                f.debug_struct("DesignatedConstructor").field("params", params).finish()
            }
        }
    }
}

/// One mapped member of a type.
#[derive(Clone)]
pub struct MemberBinding {
    pub(crate) source: MemberSource,
    pub(crate) declared_name: String,
    pub(crate) encoded_name: String,
    pub(crate) ty: TypeHandle,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) serializer: Option<SerializerRef>,
    pub(crate) annotation: Option<AnnotationRule>,
}

impl MemberBinding {
    pub fn source(&self) -> MemberSource {
        self.source
    }

    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn encoded_name(&self) -> &str {
        &self.encoded_name
    }

    pub fn member_type(&self) -> TypeHandle {
        self.ty
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn serializer(&self) -> Option<&SerializerRef> {
        self.serializer.as_ref()
    }

    pub fn annotation(&self) -> Option<&AnnotationRule> {
        self.annotation.as_ref()
    }
}

impl fmt::Debug for MemberBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberBinding")
            .field("source", &self.source)
            .field("declared_name", &self.declared_name)
            .field("encoded_name", &self.encoded_name)
            .field("ty", &self.ty)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .field("serializer", &self.serializer)
            .field("annotation", &self.annotation)
            .finish()
    }
}

/// Resolved mapping plan for one structured type.
#[derive(Clone)]
pub struct TypeSchema {
    type_name: String,
    bindings: Vec<MemberBinding>,
    index: IndexMap<String, usize>,
    construction: ConstructionStrategy,
    case_insensitive: bool,
}

impl TypeSchema {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Bindings in declaration order.
    pub fn bindings(&self) -> &[MemberBinding] {
        &self.bindings
    }

    /// Finds the binding for an incoming field name.
    pub fn binding(&self, encoded_name: &str) -> Option<&MemberBinding> {
        let key = normalize(encoded_name, self.case_insensitive);
        self.index.get(key.as_ref()).map(|&i| &self.bindings[i])
    }

    pub fn encoded_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.encoded_name.as_str())
    }

    pub fn construction(&self) -> &ConstructionStrategy {
        &self.construction
    }

    /// True when `binding` is filled through the designated constructor.
    pub(crate) fn is_parameter(&self, binding: &MemberBinding) -> bool {
        self.construction
            .parameters()
            .iter()
            .any(|param| self.names_match(param, &binding.encoded_name))
    }

    /// The binding a constructor argument refers to, by declared name
    /// first and encoded name second.
    pub(crate) fn argument_binding(&self, name: &str) -> Option<&MemberBinding> {
        self.bindings
            .iter()
            .find(|b| b.declared_name == name)
            .or_else(|| self.binding(name))
    }

    pub(crate) fn names_match(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.to_lowercase() == b.to_lowercase()
        } else {
            a == b
        }
    }
}

impl fmt::Debug for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSchema")
            .field("type_name", &self.type_name)
            .field("bindings", &self.bindings)
            .field("construction", &self.construction)
            .finish()
    }
}

fn normalize(name: &str, case_insensitive: bool) -> std::borrow::Cow<'_, str> {
    if case_insensitive {
        std::borrow::Cow::Owned(name.to_lowercase())
    } else {
        std::borrow::Cow::Borrowed(name)
    }
}

/// Derives a schema from a descriptor. Pure: the same inputs always give
/// the same schema.
pub(crate) fn build_schema(
    handle: TypeHandle,
    descriptor: &TypeDescriptor,
    options: &SerializationOptions,
) -> Result<TypeSchema, MapError> {
    let Kind::Object(shape) = descriptor.kind() else {
        return Err(MapError::schema(
            handle.name(),
            format!("{} types have no member schema", descriptor.kind().label()),
        ));
    };
    let case_insensitive = options.property_name_case_insensitive;

    let mut bindings = Vec::new();
    let mut index = IndexMap::new();
    for member in shape.members() {
        if member.is_ignored() {
            continue;
        }
        let writable = member.is_writable();
        let keep = match member.source() {
            MemberSource::Field => {
                (options.include_fields || member.include)
                    && !(options.ignore_read_only_fields && !writable)
            }
            MemberSource::Property => !(options.ignore_read_only_properties && !writable),
            MemberSource::Method => member.is_readable() || writable,
        };
        if !keep {
            continue;
        }

        let encoded_name = match (member.rename(), member.source()) {
            (Some(explicit), _) => explicit.to_string(),
            (None, MemberSource::Field) => member.name().to_string(),
            (None, _) => options.naming.apply(member.name()),
        };
        let key = normalize(&encoded_name, case_insensitive).into_owned();
        if index.contains_key(&key) {
            return Err(MapError::schema(
                handle.name(),
                format!("duplicate encoded name {encoded_name:?}"),
            ));
        }
        index.insert(key, bindings.len());
        bindings.push(MemberBinding {
            source: member.source(),
            declared_name: member.name().to_string(),
            encoded_name,
            ty: member.member_type(),
            getter: member.getter.clone(),
            setter: member.setter.clone(),
            serializer: member.serializer.clone(),
            annotation: member.annotation.clone(),
        });
    }

    let construction = match shape.constructors() {
        [] if descriptor.has_default() || options.object_factory.is_some() => {
            ConstructionStrategy::DefaultThenAssign
        }
        [] => {
            return Err(MapError::schema(
                handle.name(),
                "no designated constructor and no parameterless construction path",
            ));
        }
        [designated] => {
            let mut seen: Vec<String> = Vec::new();
            for param in designated.params() {
                if param.is_empty() {
                    return Err(MapError::schema(
                        handle.name(),
                        "every designated constructor parameter needs a name",
                    ));
                }
                let key = normalize(param, case_insensitive).into_owned();
                if seen.contains(&key) {
                    return Err(MapError::schema(
                        handle.name(),
                        format!("constructor parameter {param:?} is bound twice"),
                    ));
                }
                seen.push(key);
            }
            let params = designated
                .params()
                .iter()
                .map(|param| match bindings.iter().find(|b| b.declared_name == *param) {
                    Some(binding) => binding.encoded_name.clone(),
                    None => param.clone(),
                })
                .collect();
            ConstructionStrategy::DesignatedConstructor {
                params,
                build: designated.build.clone(),
            }
        }
        many => {
            return Err(MapError::schema(
                handle.name(),
                format!("{} constructors are marked as designated", many.len()),
            ));
        }
    };

    Ok(TypeSchema {
        type_name: descriptor.name().to_string(),
        bindings,
        index,
        construction,
        case_insensitive,
    })
}

/// Caches descriptors and schemas for one mapper.
///
/// Entries are computed outside the lock; when two threads race on the same
/// type the first insert wins and both return it.
#[derive(Default)]
pub(crate) struct SchemaResolver {
    descriptors: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    schemas: RwLock<HashMap<TypeId, Arc<TypeSchema>>>,
}

impl SchemaResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn descriptor(&self, handle: TypeHandle) -> Arc<TypeDescriptor> {
        let cached = self
            .descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.id())
            .cloned();
        if let Some(descriptor) = cached {
            return descriptor;
        }
        let computed = Arc::new(handle.describe());
        self.descriptors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(handle.id())
            .or_insert(computed)
            .clone()
    }

    /// Schemas are cached by type alone, so every call on one resolver
    /// must pass the options of the mapper owning it.
    pub(crate) fn resolve(
        &self,
        handle: TypeHandle,
        options: &SerializationOptions,
    ) -> Result<Arc<TypeSchema>, MapError> {
        let cached = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.id())
            .cloned();
        if let Some(schema) = cached {
            return Ok(schema);
        }
        let descriptor = self.descriptor(handle);
        let schema = Arc::new(build_schema(handle, &descriptor, options)?);
        debug!(
            "resolved schema for {}: {} bindings, {:?}",
            handle.name(),
            schema.bindings().len(),
            schema.construction()
        );
        Ok(self
            .schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(handle.id())
            .or_insert(schema)
            .clone())
    }

    /// Number of cached schemas.
    pub(crate) fn len(&self) -> usize {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaResolver").field("schemas", &self.len()).finish()
    }
}
