use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::annotation::{
    AnnotationConvention, AnnotationName, AnnotationPrefix, ModulePathPrefix, SimpleName,
    TypeCatalog,
};
use crate::codec::{Codec, Format};
use crate::describe::TypeHandle;
use crate::naming::NamingConvention;
use crate::registry::SerializerRegistry;

/// Default limit on object graph nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Opaque values forwarded to serializer factories and object factories.
#[derive(Clone, Default)]
pub struct CustomContext {
    entries: IndexMap<String, Arc<dyn Any + Send + Sync>>,
}

impl CustomContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Arc::new(value));
    }

    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value under `key` if it is a `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key)?.downcast_ref::<T>()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CustomContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Interception point for creating instances before default construction.
///
/// Returning `None` falls back to the type's parameterless constructor.
pub trait ObjectFactory: Send + Sync {
    fn create(&self, ty: TypeHandle, context: &CustomContext) -> Option<Box<dyn Any>>;
}

impl<F> ObjectFactory for F
where
    F: Fn(TypeHandle, &CustomContext) -> Option<Box<dyn Any>> + Send + Sync,
{
    fn create(&self, ty: TypeHandle, context: &CustomContext) -> Option<Box<dyn Any>> {
        self(ty, context)
    }
}

/// Immutable configuration shared by every call made through one mapper.
#[derive(Clone)]
pub struct SerializationOptions {
    pub(crate) naming: NamingConvention,
    pub(crate) format: Format,
    pub(crate) codec: Option<Arc<dyn Codec>>,
    pub(crate) max_depth: usize,
    pub(crate) include_fields: bool,
    pub(crate) ignore_nulls: bool,
    pub(crate) ignore_read_only_fields: bool,
    pub(crate) ignore_read_only_properties: bool,
    pub(crate) property_name_case_insensitive: bool,
    pub(crate) ignore_defaults: bool,
    pub(crate) include_type_information: bool,
    pub(crate) annotation_prefix: Arc<dyn AnnotationPrefix>,
    pub(crate) annotation_name: Arc<dyn AnnotationName>,
    pub(crate) annotation_convention: AnnotationConvention,
    pub(crate) permissive_mode: bool,
    pub(crate) annotate_guids: bool,
    pub(crate) object_factory: Option<Arc<dyn ObjectFactory>>,
    pub(crate) search_modules: Vec<TypeCatalog>,
    pub(crate) serializers: SerializerRegistry,
    pub(crate) context: CustomContext,
}

impl Default for SerializationOptions {
    fn default() -> Self {
        SerializationOptions {
            naming: NamingConvention::default(),
            format: Format::default(),
            codec: None,
            max_depth: DEFAULT_MAX_DEPTH,
            include_fields: false,
            ignore_nulls: false,
            ignore_read_only_fields: false,
            ignore_read_only_properties: false,
            property_name_case_insensitive: false,
            ignore_defaults: false,
            include_type_information: false,
            annotation_prefix: Arc::new(ModulePathPrefix),
            annotation_name: Arc::new(SimpleName),
            annotation_convention: AnnotationConvention::default(),
            permissive_mode: false,
            annotate_guids: false,
            object_factory: None,
            search_modules: Vec::new(),
            serializers: SerializerRegistry::default(),
            context: CustomContext::default(),
        }
    }
}

impl SerializationOptions {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder {
            options: SerializationOptions::default(),
        }
    }

    pub fn naming(&self) -> NamingConvention {
        self.naming
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn include_fields(&self) -> bool {
        self.include_fields
    }

    pub fn ignore_nulls(&self) -> bool {
        self.ignore_nulls
    }

    pub fn ignore_defaults(&self) -> bool {
        self.ignore_defaults
    }

    pub fn property_name_case_insensitive(&self) -> bool {
        self.property_name_case_insensitive
    }

    pub fn include_type_information(&self) -> bool {
        self.include_type_information
    }

    pub fn annotation_convention(&self) -> AnnotationConvention {
        self.annotation_convention
    }

    pub fn permissive_mode(&self) -> bool {
        self.permissive_mode
    }

    pub fn annotate_guids(&self) -> bool {
        self.annotate_guids
    }

    pub fn search_modules(&self) -> &[TypeCatalog] {
        &self.search_modules
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    pub fn context(&self) -> &CustomContext {
        &self.context
    }
}

impl fmt::Debug for SerializationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationOptions")
            .field("naming", &self.naming)
            .field("format", &self.format)
            .field("custom_codec", &self.codec.is_some())
            .field("max_depth", &self.max_depth)
            .field("include_fields", &self.include_fields)
            .field("ignore_nulls", &self.ignore_nulls)
            .field("ignore_read_only_fields", &self.ignore_read_only_fields)
            .field("ignore_read_only_properties", &self.ignore_read_only_properties)
            .field("property_name_case_insensitive", &self.property_name_case_insensitive)
            .field("ignore_defaults", &self.ignore_defaults)
            .field("include_type_information", &self.include_type_information)
            .field("annotation_convention", &self.annotation_convention)
            .field("permissive_mode", &self.permissive_mode)
            .field("annotate_guids", &self.annotate_guids)
            .field("object_factory", &self.object_factory.is_some())
            .field("search_modules", &self.search_modules)
            .field("serializers", &self.serializers)
            .field("context", &self.context)
            .finish()
    }
}

/// Builds [`SerializationOptions`]; unset options keep their defaults.
pub struct OptionsBuilder {
    options: SerializationOptions,
}

impl OptionsBuilder {
    pub fn naming(mut self, naming: NamingConvention) -> Self {
        self.options.naming = naming;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.options.format = format;
        self
    }

    /// Overrides how byte streams are produced and parsed.
    ///
    /// The codec then also owns bounding container nesting in what it
    /// decodes; [`DefaultCodec::for_max_depth`](crate::DefaultCodec::for_max_depth)
    /// gives the built-in bound.
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        self.options.codec = Some(Arc::new(codec));
        self
    }

    /// Limits object graph nesting; the root sits at depth 0.
    ///
    /// Both engines recurse once per level, so the thread stack bounds
    /// this too. Each level costs a few tens of kilobytes of stack in
    /// unoptimized builds: stay at or below 80 on a 2 MiB thread (the
    /// default for spawned threads and tests), or run deeper graphs on a
    /// thread with a larger stack. Decoders reject input nested more than
    /// [`NESTING_MARGIN`](crate::codec::NESTING_MARGIN) containers past
    /// this limit before mapping starts.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn include_fields(mut self, on: bool) -> Self {
        self.options.include_fields = on;
        self
    }

    pub fn ignore_nulls(mut self, on: bool) -> Self {
        self.options.ignore_nulls = on;
        self
    }

    pub fn ignore_read_only_fields(mut self, on: bool) -> Self {
        self.options.ignore_read_only_fields = on;
        self
    }

    pub fn ignore_read_only_properties(mut self, on: bool) -> Self {
        self.options.ignore_read_only_properties = on;
        self
    }

    pub fn property_name_case_insensitive(mut self, on: bool) -> Self {
        self.options.property_name_case_insensitive = on;
        self
    }

    pub fn ignore_defaults(mut self, on: bool) -> Self {
        self.options.ignore_defaults = on;
        self
    }

    pub fn include_type_information(mut self, on: bool) -> Self {
        self.options.include_type_information = on;
        self
    }

    pub fn annotation_prefix(mut self, prefix: impl AnnotationPrefix + 'static) -> Self {
        self.options.annotation_prefix = Arc::new(prefix);
        self
    }

    pub fn annotation_name(mut self, name: impl AnnotationName + 'static) -> Self {
        self.options.annotation_name = Arc::new(name);
        self
    }

    pub fn annotation_convention(mut self, convention: AnnotationConvention) -> Self {
        self.options.annotation_convention = convention;
        self
    }

    pub fn permissive_mode(mut self, on: bool) -> Self {
        self.options.permissive_mode = on;
        self
    }

    pub fn annotate_guids(mut self, on: bool) -> Self {
        self.options.annotate_guids = on;
        self
    }

    pub fn object_factory(mut self, factory: impl ObjectFactory + 'static) -> Self {
        self.options.object_factory = Some(Arc::new(factory));
        self
    }

    /// Adds a catalog to the annotation search list.
    pub fn search_module(mut self, catalog: TypeCatalog) -> Self {
        self.options.search_modules.push(catalog);
        self
    }

    pub fn serializers(mut self, registry: SerializerRegistry) -> Self {
        self.options.serializers = registry;
        self
    }

    pub fn context(mut self, context: CustomContext) -> Self {
        self.options.context = context;
        self
    }

    pub fn build(self) -> SerializationOptions {
        self.options
    }
}
