use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod describe;

/// Attribute macro that derives everything a plain mapped type needs.
///
/// This is syntax sugar that expands to:
/// ```ignore
/// #[derive(Debug, Clone, Default, PartialEq, Ionic)]
/// ```
///
/// Use `#[ionic(no_default)]` for types built through a designated
/// constructor; `Default` is then left out.
///
/// # Example
///
/// ```ignore
/// use ionomer_core::ionic;
///
/// #[ionic]
/// struct Engine {
///     cylinders: i32,
///     max_rpm: i32,
/// }
/// ```
#[proc_macro_attribute]
pub fn ionic(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let no_default = match syn::parse::<syn::Ident>(attr.clone()) {
        Ok(ident) if ident == "no_default" => true,
        _ if attr.is_empty() => false,
        _ => {
            let message = "expected `#[ionic]` or `#[ionic(no_default)]`";
            return syn::Error::new(proc_macro2::Span::call_site(), message)
                .to_compile_error()
                .into();
        }
    };

    let output = if no_default {
        quote! {
            #[derive(
                ::std::fmt::Debug,
                ::std::clone::Clone,
                ::std::cmp::PartialEq,
                ::ionomer_core::Ionic
            )]
            #[ion(no_default)]
            #input
        }
    } else {
        quote! {
            #[derive(
                ::std::fmt::Debug,
                ::std::clone::Clone,
                ::std::default::Default,
                ::std::cmp::PartialEq,
                ::ionomer_core::Ionic
            )]
            #input
        }
    };

    output.into()
}

/// Derive macro for the Ionic trait.
///
/// Structs with named fields become objects; every field is a property
/// whose encoded name follows the mapper's naming convention. Enums whose
/// variants carry no data become symbols.
///
/// # Example
///
/// ```ignore
/// use ionomer_core::Ionic;
///
/// #[derive(Default, Ionic)]
/// #[ion(annotate)]
/// struct Car {
///     make: String,
///     #[ion(rename = "yr")]
///     year: i32,
///     #[ion(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// # Container attributes
///
/// - `#[ion(rename = "Name")]` - Type name used in annotations
/// - `#[ion(annotate)]` - Write a type annotation for values of this type
///   - Options: `annotation = ".."`, `prefix = ".."`, `name = ".."`, `exclude_descendants`
/// - `#[ion(extends = "dyn Base")]` - Inherit the annotation rule of `Base`
/// - `#[ion(serializer = "Path")]` - Custom serializer (`Path: Default + IonSerializer`)
/// - `#[ion(serializer_factory = "path")]` - Per-call serializer factory
/// - `#[ion(constructor(path = "Self::new", params(a, b)))]` - Designated constructor
/// - `#[ion(method(get = "full_name", set = "set_full_name", ty = "String"))]` - Method member
/// - `#[ion(no_default)]` - No parameterless construction path
/// - `#[ion(crate = "path")]` - Path of the core crate
///
/// # Field attributes
///
/// - `#[ion(skip)]` / `#[ion(ignore)]` - Not mapped
/// - `#[ion(rename = "name")]` - Exact encoded name
/// - `#[ion(field)]` - Map as a field (opt-in, written under its declared name)
/// - `#[ion(include)]` - Map this field even when fields are not included
/// - `#[ion(read_only)]` - Never assigned while decoding
/// - `#[ion(serializer = "Path")]`, `#[ion(serializer_factory = "path")]` - Member serializer
/// - `#[ion(annotate)]` - Annotate this member's values regardless of type rules
#[proc_macro_derive(Ionic, attributes(ion))]
pub fn derive_ionic(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match describe::derive_ionic_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
