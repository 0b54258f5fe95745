use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{DeriveInput, FieldsNamed};

use crate::attrs::{
    AnnotateAttr, ContainerAttrs, SerializerAttr, parse_container_attrs, parse_field_attrs,
    parse_variant_attrs,
};

/// Generates the `Ionic` implementation (plus `Primitive` for unit enums).
pub fn derive_ionic_impl(input: &DeriveInput) -> syn::Result<TokenStream> {
    let container = parse_container_attrs(&input.attrs)?;
    let krate = container
        .crate_path
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::ionomer_core));
    let krate = quote! { #krate };

    match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => describe_struct(input, &container, &krate, Some(fields)),
            syn::Fields::Unit => describe_struct(input, &container, &krate, None),
            syn::Fields::Unnamed(_) => Err(syn::Error::new_spanned(
                input,
                "Ionic cannot be derived for tuple structs; members are mapped by name",
            )),
        },
        syn::Data::Enum(data) => describe_enum(input, &container, &krate, data),
        syn::Data::Union(_) => Err(syn::Error::new_spanned(
            input,
            "Ionic cannot be derived for unions",
        )),
    }
}

fn describe_struct(
    input: &DeriveInput,
    container: &ContainerAttrs,
    krate: &TokenStream,
    fields: Option<&FieldsNamed>,
) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let type_name = container.rename.clone().unwrap_or_else(|| name.unraw().to_string());
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let uses_default = container.constructor.is_none() && !container.no_default;
    let where_clause = build_where_clause(&input.generics, where_clause, krate, uses_default);

    let mut members = Vec::new();
    for field in fields.iter().flat_map(|f| f.named.iter()) {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let declared = ident.unraw().to_string();
        let source = if attrs.field {
            quote! { field }
        } else {
            quote! { property }
        };
        let setter =
            (!attrs.read_only).then(|| quote! { .set(|value, member| value.#ident = member) });
        let rename = attrs.rename.as_ref().map(|r| quote! { .rename(#r) });
        let include = attrs.include.then(|| quote! { .include() });
        let serializer = attrs.serializer.as_ref().map(|s| {
            let s = serializer_ref(s, krate);
            quote! { .serializer(#s) }
        });
        let annotate = attrs.annotate.as_ref().map(|a| {
            let rule = annotation_rule(a, quote! { for_member }, krate);
            quote! { .annotate(#rule) }
        });
        members.push(quote! {
            .member(
                #krate::Member::<Self, #ty>::#source(#declared)
                    .get(|value| &value.#ident)
                    #setter #rename #include #serializer #annotate
            )
        });
    }

    for method in &container.methods {
        let ty = &method.ty;
        let declared = method
            .name
            .clone()
            .or_else(|| method.get.as_ref().map(|g| g.unraw().to_string()))
            .or_else(|| {
                method
                    .set
                    .as_ref()
                    .map(|s| s.unraw().to_string().trim_start_matches("set_").to_string())
            })
            .unwrap_or_default();
        let get = method.get.as_ref().map(|g| quote! { .get_owned(|value| value.#g()) });
        let set = method.set.as_ref().map(|s| quote! { .set(|value, member| value.#s(member)) });
        let rename = method.rename.as_ref().map(|r| quote! { .rename(#r) });
        members.push(quote! {
            .member(#krate::Member::<Self, #ty>::method(#declared) #get #set #rename)
        });
    }

    let constructor = match &container.constructor {
        Some(ctor) => {
            let mut keys = Vec::new();
            let mut args = Vec::new();
            for param in &ctor.params {
                let field = fields
                    .iter()
                    .flat_map(|f| f.named.iter())
                    .find(|f| f.ident.as_ref() == Some(param))
                    .ok_or_else(|| {
                        syn::Error::new_spanned(param, "constructor parameter must name a field")
                    })?;
                let ty = &field.ty;
                let key = param.unraw().to_string();
                args.push(quote! { args.take::<#ty>(#key)? });
                keys.push(key);
            }
            let path = &ctor.path;
            Some(quote! {
                .constructor(#krate::Constructor::designated(
                    [#(#keys),*],
                    |args| ::std::result::Result::Ok(#path(#(#args),*)),
                ))
            })
        }
        None => None,
    };
    let default = uses_default
        .then(|| quote! { .default_constructor(<Self as ::std::default::Default>::default) });
    let modifiers = type_modifiers(container, krate);

    Ok(quote! {
        impl #impl_generics #krate::Ionic for #name #ty_generics #where_clause {
            fn describe() -> #krate::TypeDescriptor {
                #krate::TypeDescriptor::object::<Self>(#type_name, ::std::module_path!())
                    #(#members)*
                    #constructor
                    #default
                    #modifiers
                    .build()
            }
        }
    })
}

/// Unit-only enums are scalars written as symbols.
fn describe_enum(
    input: &DeriveInput,
    container: &ContainerAttrs,
    krate: &TokenStream,
    data: &syn::DataEnum,
) -> syn::Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Ionic cannot be derived for generic enums",
        ));
    }
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "Ionic cannot be derived for enums without variants",
        ));
    }
    if let Some(variant) = data.variants.iter().find(|v| !matches!(v.fields, syn::Fields::Unit)) {
        return Err(syn::Error::new_spanned(
            variant,
            "Ionic can only be derived for enums whose variants carry no data",
        ));
    }

    let mut idents = Vec::new();
    let mut symbols = Vec::new();
    for variant in &data.variants {
        let attrs = parse_variant_attrs(&variant.attrs)?;
        symbols.push(attrs.rename.unwrap_or_else(|| variant.ident.unraw().to_string()));
        idents.push(&variant.ident);
    }
    let type_name = container.rename.clone().unwrap_or_else(|| name.unraw().to_string());
    let modifiers = type_modifiers(container, krate);

    Ok(quote! {
        impl #krate::Primitive for #name {
            const ION_TYPE: #krate::IonType = #krate::IonType::Symbol;

            fn to_value(&self) -> #krate::Value {
                let text = match self {
                    #(Self::#idents => #symbols,)*
                };
                #krate::Value::Symbol(::std::string::String::from(text))
            }

            fn from_value(value: &#krate::Value) -> ::std::option::Option<Self> {
                match value {
                    #krate::Value::Symbol(text) | #krate::Value::String(text) => {
                        match text.as_str() {
                            #(#symbols => ::std::option::Option::Some(Self::#idents),)*
                            _ => ::std::option::Option::None,
                        }
                    }
                    _ => ::std::option::Option::None,
                }
            }

            fn coerce(value: &#krate::Value) -> ::std::option::Option<Self> {
                let text = match value {
                    #krate::Value::Symbol(text) | #krate::Value::String(text) => text.trim(),
                    _ => return ::std::option::Option::None,
                };
                #(
                    if text.eq_ignore_ascii_case(#symbols) {
                        return ::std::option::Option::Some(Self::#idents);
                    }
                )*
                ::std::option::Option::None
            }
        }

        impl #krate::Ionic for #name {
            fn describe() -> #krate::TypeDescriptor {
                #krate::TypeDescriptor::scalar_in::<Self>(#type_name, ::std::module_path!())
                    #modifiers
            }
        }
    })
}

/// `annotate`, `serializer`, and `extends` apply to every kind of type.
fn type_modifiers(container: &ContainerAttrs, krate: &TokenStream) -> TokenStream {
    let annotate = container.annotate.as_ref().map(|a| {
        let rule = annotation_rule(a, quote! { for_type }, krate);
        quote! { .annotate(#rule) }
    });
    let serializer = container.serializer.as_ref().map(|s| {
        let s = serializer_ref(s, krate);
        quote! { .serializer(#s) }
    });
    let extends = container.extends.iter().map(|base| quote! { .extends::<#base>() });
    quote! { #annotate #serializer #(#extends)* }
}

fn annotation_rule(
    attr: &AnnotateAttr,
    constructor: TokenStream,
    krate: &TokenStream,
) -> TokenStream {
    let explicit = attr.explicit.as_ref().map(|s| quote! { .named(#s) });
    let prefix = attr.prefix.as_ref().map(|s| quote! { .with_prefix(#s) });
    let name = attr.name.as_ref().map(|s| quote! { .with_name(#s) });
    let exclude = attr.exclude_descendants.then(|| quote! { .exclude_descendants() });
    quote! { #krate::AnnotationRule::#constructor() #explicit #prefix #name #exclude }
}

fn serializer_ref(attr: &SerializerAttr, krate: &TokenStream) -> TokenStream {
    match attr {
        SerializerAttr::Typed(path) => {
            quote! { #krate::SerializerRef::typed(<#path as ::std::default::Default>::default()) }
        }
        SerializerAttr::Factory(path) => quote! { #krate::SerializerRef::factory(#path) },
    }
}

fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
    krate: &TokenStream,
    uses_default: bool,
) -> TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let ionic_bounds = type_params.iter().map(|p| {
        quote! { #p: #krate::Ionic }
    });
    let default_bound = uses_default.then(|| quote! { Self: ::std::default::Default, });

    let existing_predicates = existing
        .map(|w| {
            let predicates = &w.predicates;
            quote! { #predicates, }
        })
        .unwrap_or_default();

    quote! {
        where
            #default_bound
            #existing_predicates
            #(#ionic_bounds),*
    }
}
