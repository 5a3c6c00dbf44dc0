//! Derive macro for the `ObjectLayout` trait.
//!
//! ```ignore
//! #[derive(Clone, Copy, ObjectLayout)]
//! #[repr(C)]
//! struct Node {
//!     value: u64,
//!     #[gc(strong)]
//!     next: Option<ObjRef>,
//!     #[gc(weak)]
//!     cache: Option<ObjRef>,
//! }
//! ```

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::{
    parse_macro_input, parse_quote, punctuated::Punctuated, spanned::Spanned, token::Comma, Data,
    DeriveInput, Field, Fields, Path,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Strong,
    Weak,
}

#[proc_macro_derive(ObjectLayout, attributes(gc, stm_gc))]
pub fn derive_object_layout(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let stm_gc = crate_path(input)?;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "`ObjectLayout` cannot be derived for generic types",
        ));
    }

    let fields = named_fields(input)?;
    let name = &input.ident;

    let mut slots = Vec::new();
    let mut seen_weak = false;
    for field in fields {
        let Some(kind) = slot_kind(field)? else {
            continue;
        };
        if kind == SlotKind::Weak {
            if seen_weak {
                return Err(syn::Error::new_spanned(
                    field,
                    "an object can carry at most one `#[gc(weak)]` slot",
                ));
            }
            seen_weak = true;
        }
        slots.push((kind, field));
    }

    let type_checks = slots.iter().filter_map(|(_, field)| {
        let ident = field.ident.as_ref()?;
        Some(quote_spanned! {field.ty.span() =>
            let _: fn(&#name) -> &::core::option::Option<#stm_gc::ObjRef> = |value| &value.#ident;
        })
    });

    let registrations = slots.iter().filter_map(|(kind, field)| {
        let ident = field.ident.as_ref()?;
        Some(match kind {
            SlotKind::Strong => quote_spanned! {field.span() =>
                .with_ref(::core::mem::offset_of!(Self, #ident))
            },
            SlotKind::Weak => quote_spanned! {field.span() =>
                .with_weak(::core::mem::offset_of!(Self, #ident))
            },
        })
    });

    Ok(quote! {
        unsafe impl #stm_gc::ObjectLayout for #name {
            fn describe() -> #stm_gc::TypeInfo {
                #(#type_checks)*
                #stm_gc::TypeInfo::of::<Self>(::core::stringify!(#name))
                    #(#registrations)*
            }
        }
    })
}

fn crate_path(input: &DeriveInput) -> syn::Result<Path> {
    let mut stm_gc: Path = parse_quote!(::stm_gc);
    for attr in &input.attrs {
        if !attr.path().is_ident("stm_gc") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                stm_gc = meta.value()?.parse()?;
                Ok(())
            } else {
                Err(meta.error("unsupported attribute"))
            }
        })?;
    }
    Ok(stm_gc)
}

fn named_fields(input: &DeriveInput) -> syn::Result<&Punctuated<Field, Comma>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => Ok(&named.named),
            other => Err(syn::Error::new_spanned(
                other,
                "`ObjectLayout` requires a struct with named fields",
            )),
        },
        Data::Enum(data) => Err(syn::Error::new(
            data.enum_token.span,
            "`ObjectLayout` cannot be derived for enums",
        )),
        Data::Union(data) => Err(syn::Error::new(
            data.union_token.span,
            "`ObjectLayout` cannot be derived for unions",
        )),
    }
}

fn slot_kind(field: &Field) -> syn::Result<Option<SlotKind>> {
    let mut kind = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("gc") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let parsed = if meta.path.is_ident("strong") {
                SlotKind::Strong
            } else if meta.path.is_ident("weak") {
                SlotKind::Weak
            } else {
                return Err(meta.error("expected `strong` or `weak`"));
            };
            if kind.replace(parsed).is_some() {
                return Err(meta.error("a slot is either `strong` or `weak`, once"));
            }
            Ok(())
        })?;
    }
    Ok(kind)
}
