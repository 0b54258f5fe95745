use syn::meta::ParseNestedMeta;
use syn::{Ident, LitStr, Type};

/// `annotate` or `annotate(annotation = "..", prefix = "..", name = "..", exclude_descendants)`.
#[derive(Default)]
pub(crate) struct AnnotateAttr {
    pub explicit: Option<LitStr>,
    pub prefix: Option<LitStr>,
    pub name: Option<LitStr>,
    pub exclude_descendants: bool,
}

pub(crate) enum SerializerAttr {
    /// A `Default` type implementing `IonSerializer`.
    Typed(syn::Path),
    /// A function building a serializer per call.
    Factory(syn::Path),
}

pub(crate) struct ConstructorAttr {
    pub path: syn::ExprPath,
    pub params: Vec<Ident>,
}

pub(crate) struct MethodAttr {
    pub name: Option<String>,
    pub get: Option<Ident>,
    pub set: Option<Ident>,
    pub ty: Type,
    pub rename: Option<String>,
}

#[derive(Default)]
pub(crate) struct ContainerAttrs {
    pub crate_path: Option<syn::Path>,
    pub rename: Option<String>,
    pub annotate: Option<AnnotateAttr>,
    pub extends: Vec<Type>,
    pub serializer: Option<SerializerAttr>,
    pub no_default: bool,
    pub constructor: Option<ConstructorAttr>,
    pub methods: Vec<MethodAttr>,
}

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    pub rename: Option<String>,
    pub field: bool,
    pub include: bool,
    pub read_only: bool,
    pub serializer: Option<SerializerAttr>,
    pub annotate: Option<AnnotateAttr>,
}

#[derive(Default)]
pub(crate) struct VariantAttrs {
    pub rename: Option<String>,
}

pub(crate) fn parse_container_attrs(attrs: &[syn::Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("ion") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                result.crate_path = Some(lit_str(&meta)?.parse()?);
            } else if meta.path.is_ident("rename") {
                result.rename = Some(lit_str(&meta)?.value());
            } else if meta.path.is_ident("annotate") {
                result.annotate = Some(parse_annotate(&meta)?);
            } else if meta.path.is_ident("extends") {
                result.extends.push(lit_str(&meta)?.parse()?);
            } else if meta.path.is_ident("serializer") {
                result.serializer = Some(SerializerAttr::Typed(lit_str(&meta)?.parse()?));
            } else if meta.path.is_ident("serializer_factory") {
                result.serializer = Some(SerializerAttr::Factory(lit_str(&meta)?.parse()?));
            } else if meta.path.is_ident("no_default") {
                result.no_default = true;
            } else if meta.path.is_ident("constructor") {
                result.constructor = Some(parse_constructor(&meta)?);
            } else if meta.path.is_ident("method") {
                result.methods.push(parse_method(&meta)?);
            } else {
                return Err(meta.error("unsupported ion container attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("ion") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") || meta.path.is_ident("ignore") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                result.rename = Some(lit_str(&meta)?.value());
            } else if meta.path.is_ident("field") {
                result.field = true;
            } else if meta.path.is_ident("include") {
                result.include = true;
            } else if meta.path.is_ident("read_only") {
                result.read_only = true;
            } else if meta.path.is_ident("serializer") {
                result.serializer = Some(SerializerAttr::Typed(lit_str(&meta)?.parse()?));
            } else if meta.path.is_ident("serializer_factory") {
                result.serializer = Some(SerializerAttr::Factory(lit_str(&meta)?.parse()?));
            } else if meta.path.is_ident("annotate") {
                result.annotate = Some(parse_annotate(&meta)?);
            } else {
                return Err(meta.error("unsupported ion field attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

pub(crate) fn parse_variant_attrs(attrs: &[syn::Attribute]) -> syn::Result<VariantAttrs> {
    let mut result = VariantAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("ion") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                result.rename = Some(lit_str(&meta)?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported ion variant attribute"))
            }
        })?;
    }

    Ok(result)
}

fn lit_str(meta: &ParseNestedMeta) -> syn::Result<LitStr> {
    meta.value()?.parse()
}

fn parse_annotate(meta: &ParseNestedMeta) -> syn::Result<AnnotateAttr> {
    let mut result = AnnotateAttr::default();
    if !meta.input.peek(syn::token::Paren) {
        return Ok(result);
    }

    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("annotation") {
            result.explicit = Some(lit_str(&inner)?);
        } else if inner.path.is_ident("prefix") {
            result.prefix = Some(lit_str(&inner)?);
        } else if inner.path.is_ident("name") {
            result.name = Some(lit_str(&inner)?);
        } else if inner.path.is_ident("exclude_descendants") {
            result.exclude_descendants = true;
        } else {
            return Err(inner.error("unsupported annotate option"));
        }
        Ok(())
    })?;
    Ok(result)
}

fn parse_constructor(meta: &ParseNestedMeta) -> syn::Result<ConstructorAttr> {
    let mut path = None;
    let mut params = Vec::new();

    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("path") {
            path = Some(lit_str(&inner)?.parse()?);
        } else if inner.path.is_ident("params") {
            inner.parse_nested_meta(|param| {
                params.push(param.path.require_ident()?.clone());
                Ok(())
            })?;
        } else {
            return Err(inner.error("unsupported constructor option"));
        }
        Ok(())
    })?;

    Ok(ConstructorAttr {
        path: path.unwrap_or_else(|| syn::parse_quote!(Self::new)),
        params,
    })
}

fn parse_method(meta: &ParseNestedMeta) -> syn::Result<MethodAttr> {
    let mut name = None;
    let mut get = None;
    let mut set = None;
    let mut ty = None;
    let mut rename = None;

    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("name") {
            name = Some(lit_str(&inner)?.value());
        } else if inner.path.is_ident("get") {
            get = Some(lit_str(&inner)?.parse()?);
        } else if inner.path.is_ident("set") {
            set = Some(lit_str(&inner)?.parse()?);
        } else if inner.path.is_ident("ty") {
            ty = Some(lit_str(&inner)?.parse()?);
        } else if inner.path.is_ident("rename") {
            rename = Some(lit_str(&inner)?.value());
        } else {
            return Err(inner.error("unsupported method option"));
        }
        Ok(())
    })?;

    let Some(ty) = ty else {
        return Err(meta.error("method members need `ty = \"...\"`"));
    };
    if get.is_none() && set.is_none() {
        return Err(meta.error("method members need a `get` or a `set` method"));
    }
    Ok(MethodAttr {
        name,
        get,
        set,
        ty,
        rename,
    })
}
