use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Fields, FieldsNamed, GenericArgument, Ident, PathArguments, Type};

/// What the macro needs to know about a single variant.
struct Shape<'a> {
    ident: &'a Ident,
    source: Option<&'a Field>,
    has_context: bool,
    /// Exactly `{ source, context }`: eligible for `From<Source>`.
    convertible: bool,
    /// `Internal { message, context }`: eligible for `From<&str>` / `From<String>`.
    internal: bool,
}

pub fn expand(input: DeriveInput) -> TokenStream {
    let name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return syn::Error::new_spanned(name, "quanx_error can only be applied to enums")
            .to_compile_error();
    };

    let shapes = match data.variants.iter().map(inspect).collect::<syn::Result<Vec<_>>>() {
        Ok(shapes) => shapes,
        Err(err) => return err.to_compile_error(),
    };
    if let Err(err) = reject_duplicate_sources(&shapes) {
        return err.to_compile_error();
    }

    let ext = format_ident!("{}Ext", name);
    let derives = missing_derives(&input);
    let context_trait = context_trait(name, &ext, &shapes);
    let conversions = shapes.iter().filter(|s| s.convertible).map(|s| conversion(name, &ext, s));
    let internal = shapes.iter().any(|s| s.internal).then(|| internal_conversions(name));

    quote! {
        #derives
        #input

        #context_trait
        #(#conversions)*
        #internal

        #[allow(dead_code, clippy::ref_option)]
        fn format_context(
            context: &::std::option::Option<::std::borrow::Cow<'static, str>>,
        ) -> ::std::borrow::Cow<'static, str> {
            match context {
                ::std::option::Option::Some(c) => ::std::borrow::Cow::Owned(format!(" ({c})")),
                ::std::option::Option::None => ::std::borrow::Cow::Borrowed(""),
            }
        }
    }
}

fn inspect(variant: &syn::Variant) -> syn::Result<Shape<'_>> {
    let Fields::Named(fields) = &variant.fields else {
        return Err(syn::Error::new_spanned(
            variant,
            "quanx_error variants must use named fields",
        ));
    };

    if let Some(field) = fields.named.iter().find(|f| has_attr(f, "from")) {
        return Err(syn::Error::new_spanned(
            field,
            "use a `source` field instead of `#[from]`; quanx_error generates the conversion",
        ));
    }

    let context = named(fields, "context");
    if let Some(field) = context
        && !is_context_type(&field.ty)
    {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "`context` must be `Option<Cow<'static, str>>`",
        ));
    }

    let source = fields.named.iter().find(|f| {
        f.ident.as_ref().is_some_and(|ident| ident == "source") || has_attr(f, "source")
    });
    if source.is_some() && context.is_none() {
        return Err(syn::Error::new_spanned(
            &variant.ident,
            "variants with a source need a `context: Option<Cow<'static, str>>` field",
        ));
    }

    let pair = fields.named.len() == 2 && context.is_some();
    Ok(Shape {
        ident: &variant.ident,
        source,
        has_context: context.is_some(),
        convertible: pair && source.is_some(),
        internal: pair && variant.ident == "Internal" && named(fields, "message").is_some(),
    })
}

fn reject_duplicate_sources(shapes: &[Shape<'_>]) -> syn::Result<()> {
    let mut seen = FxHashSet::default();
    for field in shapes.iter().filter(|s| s.convertible).filter_map(|s| s.source) {
        let ty = &field.ty;
        if !seen.insert(quote!(#ty).to_string()) {
            return Err(syn::Error::new_spanned(
                ty,
                "two convertible variants share this source type; add a field to one of them",
            ));
        }
    }
    Ok(())
}

fn context_trait(name: &Ident, ext: &Ident, shapes: &[Shape<'_>]) -> TokenStream {
    let arms = shapes.iter().filter(|s| s.has_context).map(|s| {
        let ident = s.ident;
        quote! { #name::#ident { context, .. } => *context = ::std::option::Option::Some(reason), }
    });

    quote! {
        /// Attaches a human readable context to a failed result.
        pub trait #ext<T> {
            /// Records `reason` on the error, replacing any earlier context.
            fn context(
                self,
                reason: impl ::std::convert::Into<::std::borrow::Cow<'static, str>>,
            ) -> ::std::result::Result<T, #name>;
        }

        #[automatically_derived]
        impl<T> #ext<T> for ::std::result::Result<T, #name> {
            #[inline]
            fn context(
                self,
                reason: impl ::std::convert::Into<::std::borrow::Cow<'static, str>>,
            ) -> Self {
                self.map_err(|mut error| {
                    let reason: ::std::borrow::Cow<'static, str> = reason.into();
                    #[allow(unreachable_patterns, unused_variables)]
                    match &mut error {
                        #(#arms)*
                        _ => {}
                    }
                    error
                })
            }
        }
    }
}

fn conversion(name: &Ident, ext: &Ident, shape: &Shape<'_>) -> TokenStream {
    let Some(field) = shape.source else {
        return quote!();
    };
    let Some(field_name) = field.ident.as_ref() else {
        return quote!();
    };
    let ty = &field.ty;
    let variant = shape.ident;

    quote! {
        #[automatically_derived]
        impl ::std::convert::From<#ty> for #name {
            #[inline]
            fn from(source: #ty) -> Self {
                Self::#variant { #field_name: source, context: ::std::option::Option::None }
            }
        }

        #[automatically_derived]
        impl<T> #ext<T> for ::std::result::Result<T, #ty> {
            #[inline]
            fn context(
                self,
                reason: impl ::std::convert::Into<::std::borrow::Cow<'static, str>>,
            ) -> ::std::result::Result<T, #name> {
                self.map_err(|source| #name::#variant {
                    #field_name: source,
                    context: ::std::option::Option::Some(reason.into()),
                })
            }
        }
    }
}

fn internal_conversions(name: &Ident) -> TokenStream {
    quote! {
        #[automatically_derived]
        impl ::std::convert::From<&'static str> for #name {
            #[inline]
            fn from(message: &'static str) -> Self {
                Self::Internal {
                    message: ::std::borrow::Cow::Borrowed(message),
                    context: ::std::option::Option::None,
                }
            }
        }

        #[automatically_derived]
        impl ::std::convert::From<String> for #name {
            #[inline]
            fn from(message: String) -> Self {
                Self::Internal {
                    message: ::std::borrow::Cow::Owned(message),
                    context: ::std::option::Option::None,
                }
            }
        }
    }
}

/// Emits `#[derive(Debug, thiserror::Error)]` minus whatever the enum already derives.
fn missing_derives(input: &DeriveInput) -> TokenStream {
    let mut present = FxHashSet::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                present.insert(last.ident.to_string());
            }
            Ok(())
        });
    }

    let mut wanted = Vec::new();
    if !present.contains("Debug") {
        wanted.push(quote!(Debug));
    }
    if !present.contains("Error") {
        wanted.push(quote!(::thiserror::Error));
    }

    if wanted.is_empty() { quote!() } else { quote!(#[derive(#(#wanted),*)]) }
}

fn named<'a>(fields: &'a FieldsNamed, name: &str) -> Option<&'a Field> {
    fields.named.iter().find(|f| f.ident.as_ref().is_some_and(|ident| ident == name))
}

fn has_attr(field: &Field, name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// Accepts `Option<Cow<'static, str>>` with any path prefix on either type.
fn is_context_type(ty: &Type) -> bool {
    let Some(option) = single_generic(ty, "Option") else {
        return false;
    };
    let Type::Path(cow) = option else {
        return false;
    };
    let Some(segment) = cow.path.segments.last() else {
        return false;
    };
    if segment.ident != "Cow" {
        return false;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return false;
    };

    let mut args = args.args.iter();
    let static_lifetime =
        matches!(args.next(), Some(GenericArgument::Lifetime(lt)) if lt.ident == "static");
    let str_type = matches!(
        args.next(),
        Some(GenericArgument::Type(Type::Path(p))) if p.path.is_ident("str")
    );
    static_lifetime && str_type && args.next().is_none()
}

fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
