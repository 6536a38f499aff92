#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros used across the quanx workspace.
//!
//! Only one macro lives here for now: [`macro@quanx_error`], the house style for
//! error enums. Every library crate declares its errors with it so that
//! `.context(...)` and `?` conversions look the same everywhere.

mod error;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Turns a named-field enum into a `thiserror` error with context support.
///
/// # Generated Items
///
/// * `#[derive(Debug, thiserror::Error)]` unless the enum already derives them.
/// * A `<ErrorName>Ext<T>` trait with `.context(...)` implemented for
///   `Result<T, ErrorName>`, filling the `context` field of whichever variant
///   carries one.
/// * For every variant made of exactly a `source` and a `context` field:
///   `From<Source>` and `<ErrorName>Ext` for `Result<T, Source>`, so `?` and
///   `.context(...)` work on the upstream error directly. Variants carrying
///   extra fields (a service name, an operation) must be built explicitly.
/// * `From<&'static str>` and `From<String>` when an `Internal { message, context }`
///   variant is present.
/// * A private `format_context` helper for the `#[error(...)]` strings.
///
/// # Requirements
///
/// 1. Only enums with named-field variants are accepted.
/// 2. A variant with a source must also have `context: Option<Cow<'static, str>>`.
/// 3. Two convertible variants cannot share the same source type.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[quanx_derive::quanx_error]
/// pub enum LoadError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Missing key{}: {key}", format_context(.context))]
///     MissingKey { key: String, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &str) -> Result<String, LoadError> {
///     std::fs::read_to_string(path).context("Reading service file")
/// }
/// ```
#[proc_macro_attribute]
pub fn quanx_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    error::expand(input).into()
}
