//! Type annotations carrying polymorphic type identity.
//!
//! On encode a value whose type (or member) is marked by an
//! [`AnnotationRule`] gets a leading annotation computed from the prefix and
//! name strategies. On decode an annotation may upgrade a `Box<dyn Base>`
//! target to the concrete type it names; anything that cannot be resolved
//! is ignored and decoding continues with the statically requested type.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::describe::{DynamicShape, Ionic, Kind, TypeDescriptor, TypeHandle};
use crate::error::MapError;
use crate::options::SerializationOptions;
use crate::schema::SchemaResolver;

/// Whether and how a type or member is annotated with its type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRule {
    applies_to_type: bool,
    exclude_descendants: bool,
    explicit: Option<String>,
    prefix: Option<String>,
    name: Option<String>,
}

impl AnnotationRule {
    /// A rule declared on a type; inherited by types that extend it.
    pub fn for_type() -> Self {
        AnnotationRule {
            applies_to_type: true,
            ..Self::default()
        }
    }

    /// A rule declared on a member; annotates that member's values.
    pub fn for_member() -> Self {
        Self::default()
    }

    /// Stops types extending this one from inheriting the rule.
    pub fn exclude_descendants(mut self) -> Self {
        self.exclude_descendants = true;
        self
    }

    /// Uses `annotation` verbatim instead of computing one.
    pub fn named(mut self, annotation: impl Into<String>) -> Self {
        self.explicit = Some(annotation.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn applies_to_type(&self) -> bool {
        self.applies_to_type
    }

    pub fn excludes_descendants(&self) -> bool {
        self.exclude_descendants
    }

    pub fn explicit_annotation(&self) -> Option<&str> {
        self.explicit.as_deref()
    }

    /// The rule as seen by a descendant: strings stay with the declaring type.
    fn inherited(&self) -> Self {
        AnnotationRule::for_type()
    }
}

/// Computes the prefix part of an annotation.
pub trait AnnotationPrefix: Send + Sync {
    fn prefix(&self, descriptor: &TypeDescriptor) -> String;
}

/// Uses the declaring module path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModulePathPrefix;

impl AnnotationPrefix for ModulePathPrefix {
    fn prefix(&self, descriptor: &TypeDescriptor) -> String {
        descriptor.module().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedPrefix(pub String);

impl AnnotationPrefix for FixedPrefix {
    fn prefix(&self, _descriptor: &TypeDescriptor) -> String {
        self.0.clone()
    }
}

impl<F> AnnotationPrefix for F
where
    F: Fn(&TypeDescriptor) -> String + Send + Sync,
{
    fn prefix(&self, descriptor: &TypeDescriptor) -> String {
        self(descriptor)
    }
}

/// Computes the name part of an annotation.
pub trait AnnotationName: Send + Sync {
    fn name(&self, descriptor: &TypeDescriptor) -> String;
}

/// Uses the simple type name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleName;

impl AnnotationName for SimpleName {
    fn name(&self, descriptor: &TypeDescriptor) -> String {
        descriptor.name().to_string()
    }
}

impl<F> AnnotationName for F
where
    F: Fn(&TypeDescriptor) -> String + Send + Sync,
{
    fn name(&self, descriptor: &TypeDescriptor) -> String {
        self(descriptor)
    }
}

/// How prefix and name are joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationConvention {
    /// `garage::Car`
    #[default]
    Qualified,
    /// `garage.Car`
    Dotted,
    /// `Car`
    NameOnly,
}

impl AnnotationConvention {
    pub fn join(self, prefix: &str, name: &str) -> String {
        if prefix.is_empty() {
            return name.to_string();
        }
        match self {
            AnnotationConvention::Qualified => format!("{prefix}::{name}"),
            AnnotationConvention::Dotted => format!("{}.{name}", prefix.replace("::", ".")),
            AnnotationConvention::NameOnly => name.to_string(),
        }
    }
}

/// A module's worth of types searched when resolving annotations.
#[derive(Clone, Default)]
pub struct TypeCatalog {
    module: String,
    types: Vec<TypeHandle>,
}

impl TypeCatalog {
    pub fn new(module: impl Into<String>) -> Self {
        TypeCatalog {
            module: module.into(),
            types: Vec::new(),
        }
    }

    pub fn with<T: Ionic>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn register<T: Ionic>(&mut self) {
        let handle = TypeHandle::of::<T>();
        if !self.types.contains(&handle) {
            self.types.push(handle);
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn types(&self) -> &[TypeHandle] {
        &self.types
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("module", &self.module)
            .field("types", &self.types)
            .finish()
    }
}

/// Renders the annotation for `descriptor` under `rule`'s overrides.
pub(crate) fn annotation_text(
    options: &SerializationOptions,
    descriptor: &TypeDescriptor,
    rule: Option<&AnnotationRule>,
) -> String {
    if let Some(explicit) = rule.and_then(|r| r.explicit.as_ref()) {
        return explicit.clone();
    }
    let prefix = rule
        .and_then(|r| r.prefix.clone())
        .unwrap_or_else(|| options.annotation_prefix.prefix(descriptor));
    let name = rule
        .and_then(|r| r.name.clone())
        .unwrap_or_else(|| options.annotation_name.name(descriptor));
    options.annotation_convention.join(&prefix, &name)
}

/// The rule in force for `handle`: its own, else the nearest ancestor's
/// unless that ancestor excludes descendants, else the blanket rule from
/// `include_type_information` for structured types.
pub(crate) fn effective_rule(
    options: &SerializationOptions,
    schemas: &SchemaResolver,
    handle: TypeHandle,
) -> Option<AnnotationRule> {
    let descriptor = schemas.descriptor(handle);
    if let Some(rule) = descriptor.annotation().filter(|r| r.applies_to_type()) {
        return Some(rule.clone());
    }

    let mut seen = HashSet::new();
    let mut queue: VecDeque<TypeHandle> = descriptor.ancestors().iter().copied().collect();
    while let Some(ancestor) = queue.pop_front() {
        if !seen.insert(ancestor) {
            continue;
        }
        let ancestor_descriptor = schemas.descriptor(ancestor);
        match ancestor_descriptor.annotation().filter(|r| r.applies_to_type()) {
            Some(rule) if rule.excludes_descendants() => break,
            Some(rule) => return Some(rule.inherited()),
            None => queue.extend(ancestor_descriptor.ancestors().iter().copied()),
        }
    }

    if options.include_type_information && matches!(descriptor.kind(), Kind::Object(_)) {
        return Some(AnnotationRule::for_type());
    }
    None
}

/// The annotation written for a value of `handle`, if any. A member rule
/// takes precedence over every type-level rule.
pub(crate) fn outgoing(
    options: &SerializationOptions,
    schemas: &SchemaResolver,
    handle: TypeHandle,
    descriptor: &TypeDescriptor,
    member_rule: Option<&AnnotationRule>,
) -> Option<String> {
    if let Some(rule) = member_rule {
        return Some(annotation_text(options, descriptor, Some(rule)));
    }
    effective_rule(options, schemas, handle)
        .map(|rule| annotation_text(options, descriptor, Some(&rule)))
}

/// The annotation naming `handle` itself: the text of its effective rule,
/// or the plain type annotation when no rule applies.
pub(crate) fn identity(
    options: &SerializationOptions,
    schemas: &SchemaResolver,
    handle: TypeHandle,
) -> String {
    let descriptor = schemas.descriptor(handle);
    let rule = effective_rule(options, schemas, handle);
    annotation_text(options, &descriptor, rule.as_ref())
}

/// Index from annotation text to the catalog types it names, built once per
/// mapper.
pub(crate) struct AnnotationResolver {
    index: HashMap<String, TypeHandle>,
}

impl AnnotationResolver {
    pub(crate) fn new(options: &SerializationOptions, schemas: &SchemaResolver) -> Self {
        let mut index = HashMap::new();
        for catalog in &options.search_modules {
            for &handle in catalog.types() {
                let text = identity(options, schemas, handle);
                match index.get(&text) {
                    Some(existing) => debug!(
                        "annotation {text:?} from catalog {} already names {:?}; keeping the first",
                        catalog.module(),
                        existing
                    ),
                    None => {
                        index.insert(text, handle);
                    }
                }
            }
        }
        debug!("indexed {} annotated types", index.len());
        AnnotationResolver { index }
    }

    /// Looks an annotation up in the search catalogs.
    pub(crate) fn resolve(&self, annotation: &str) -> Result<TypeHandle, MapError> {
        self.index
            .get(annotation)
            .copied()
            .ok_or_else(|| MapError::AnnotationResolution {
                annotation: annotation.to_string(),
            })
    }

    /// Finds the concrete implementor of a dynamic target named by one of
    /// `annotations`.
    ///
    /// Candidates come from the catalogs first and then from the base's
    /// registered implementors. An annotation several implementors would
    /// write, such as a member rule's fixed text, names none of them. A
    /// candidate is only accepted when it implements the base and is itself
    /// marked for annotation (by its own or an inherited rule, or by the
    /// member being decoded).
    pub(crate) fn subtype(
        &self,
        options: &SerializationOptions,
        schemas: &SchemaResolver,
        annotations: &[String],
        shape: &DynamicShape,
        member_rule: Option<&AnnotationRule>,
    ) -> Option<TypeHandle> {
        if annotations.is_empty() {
            return None;
        }
        let implementors = (shape.implementors)();
        for annotation in annotations {
            let candidate = match self.resolve(annotation) {
                Ok(handle) => Some(handle),
                Err(_) => {
                    let mut matching = implementors.iter().copied().filter(|&handle| {
                        let descriptor = schemas.descriptor(handle);
                        let text = outgoing(options, schemas, handle, &descriptor, member_rule);
                        text.as_deref() == Some(annotation.as_str())
                            || identity(options, schemas, handle) == *annotation
                    });
                    match (matching.next(), matching.next()) {
                        (Some(_), Some(_)) => {
                            debug!(
                                "annotation {annotation:?} fits several implementors of {}; \
                                 ignoring it",
                                shape.base.name()
                            );
                            continue;
                        }
                        (only, _) => only,
                    }
                }
            };
            let Some(handle) = candidate else {
                debug!("annotation {annotation:?} does not name a known type; ignoring it");
                continue;
            };
            if !implementors.contains(&handle) {
                debug!(
                    "annotation {annotation:?} names {}, which does not implement {}; ignoring it",
                    handle.name(),
                    shape.base.name()
                );
                continue;
            }
            if member_rule.is_none() && effective_rule(options, schemas, handle).is_none() {
                debug!(
                    "annotation {annotation:?} names {}, which is not annotated; ignoring it",
                    handle.name()
                );
                continue;
            }
            return Some(handle);
        }
        None
    }
}
