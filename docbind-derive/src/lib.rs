#![recursion_limit = "128"]
//! # Docbind Derive Macros
//!
//! ### `DocumentClass`
//!
//! Derives `docbind::DocumentClass` for a struct wrapping one
//! `docbind::mapper::HydratedDocument`.
//!
//! - **Supported for**: structs with named or positional fields
//! - **Field attribute**: `#[document]` marks the field holding the document.
//!   It can be left out when the struct has a single field or exactly one
//!   field of type `HydratedDocument`.
//!
//! Every other field is filled with `Default::default()` when a document is
//! wrapped.
//!
//! ```rust,ignore
//! use docbind::mapper::HydratedDocument;
//! use docbind_derive::DocumentClass;
//!
//! #[derive(DocumentClass)]
//! pub struct User {
//!     #[document]
//!     doc: HydratedDocument,
//!     visits: u32,
//! }
//! ```

extern crate proc_macro;
mod document_class;

use crate::document_class::generate_document_class_for_struct;
use proc_macro::TokenStream;
use syn::{Data, DeriveInput};

/// Derives the `DocumentClass` trait.
///
/// # Errors
///
/// Returns a compile error if:
/// - Applied to an enum or a union
/// - The document field cannot be determined, or more than one field is marked `#[document]`
#[proc_macro_derive(DocumentClass, attributes(document))]
pub fn derive_document_class(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    match ast.data {
        Data::Struct(ref data) => match generate_document_class_for_struct(&ast, data) {
            Ok(token_stream) => token_stream,
            Err(e) => {
                let error = syn::Error::new(
                    e.span(),
                    format!("Failed to derive DocumentClass for struct '{}': {}", ast.ident, e),
                );
                error.to_compile_error().into()
            }
        },
        Data::Enum(_) | Data::Union(_) => {
            let error = syn::Error::new_spanned(
                &ast,
                "DocumentClass can only be derived for structs holding a HydratedDocument field",
            );
            error.to_compile_error().into()
        }
    }
}
