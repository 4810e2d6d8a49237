use proc_macro::TokenStream;
use quote::quote;
use syn::{DataStruct, DeriveInput, Field, Index, Member, Result, Type};

pub(crate) fn generate_document_class_for_struct(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let members: Vec<(Member, &Field)> = data
        .fields
        .iter()
        .enumerate()
        .map(|(position, field)| match &field.ident {
            Some(ident) => (Member::Named(ident.clone()), field),
            None => (Member::Unnamed(Index::from(position)), field),
        })
        .collect();

    let position = find_document_field(ast, &members)?;
    let document_member = &members[position].0;

    let initializers = members.iter().enumerate().map(|(index, (member, _))| {
        if index == position {
            quote! { #member: document }
        } else {
            quote! { #member: ::core::default::Default::default() }
        }
    });

    let expanded = quote! {
        impl #impl_generics docbind::DocumentClass for #name #ty_generics #where_clause {
            fn from_document(document: docbind::mapper::HydratedDocument) -> Self {
                Self { #(#initializers),* }
            }

            fn document(&self) -> &docbind::mapper::HydratedDocument {
                &self.#document_member
            }

            fn document_mut(&mut self) -> &mut docbind::mapper::HydratedDocument {
                &mut self.#document_member
            }

            fn into_document(self) -> docbind::mapper::HydratedDocument {
                self.#document_member
            }
        }
    };

    Ok(TokenStream::from(expanded))
}

/// Position of the field holding the document.
fn find_document_field(ast: &DeriveInput, members: &[(Member, &Field)]) -> Result<usize> {
    let marked: Vec<usize> = members
        .iter()
        .enumerate()
        .filter(|(_, (_, field))| field.attrs.iter().any(|attr| attr.path().is_ident("document")))
        .map(|(index, _)| index)
        .collect();

    match marked.as_slice() {
        [index] => return Ok(*index),
        [] => {}
        [_, second, ..] => {
            return Err(syn::Error::new_spanned(
                members[*second].1,
                "only one field can be marked #[document]",
            ))
        }
    }

    if members.len() == 1 {
        return Ok(0);
    }

    let typed: Vec<usize> = members
        .iter()
        .enumerate()
        .filter(|(_, (_, field))| is_hydrated_document(&field.ty))
        .map(|(index, _)| index)
        .collect();
    match typed.as_slice() {
        [index] => Ok(*index),
        _ => Err(syn::Error::new_spanned(
            &ast.ident,
            "cannot tell which field holds the document, mark it with #[document]",
        )),
    }
}

fn is_hydrated_document(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "HydratedDocument"),
        _ => false,
    }
}
