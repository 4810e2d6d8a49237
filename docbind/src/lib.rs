//! # Docbind - typed document classes over a document mapper
//!
//! Docbind lets application code work with its own wrapper types instead of
//! raw documents. A wrapper owns exactly one [HydratedDocument](mapper::HydratedDocument)
//! and implements [DocumentClass]; a [Registry] turns a name, a schema and a
//! constructor into a [DocClassBuilder]; the [ops] namespace runs the usual
//! CRUD operations through a builder and hands back wrappers.
//!
//! ## Quick Start
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use docbind::mapper::{Connection, HydratedDocument, Schema, SchemaField};
//! use docbind::{ops, DocumentClass, Registry};
//! use serde_json::json;
//!
//! struct User {
//!     document: HydratedDocument,
//! }
//!
//! impl DocumentClass for User {
//!     fn from_document(document: HydratedDocument) -> Self { User { document } }
//!     fn document(&self) -> &HydratedDocument { &self.document }
//!     fn document_mut(&mut self) -> &mut HydratedDocument { &mut self.document }
//!     fn into_document(self) -> HydratedDocument { self.document }
//! }
//!
//! let registry = Registry::new(Connection::new());
//! let users = registry
//!     .model("User", Schema::new().field("name", SchemaField::string()), User::from_document)
//!     .unwrap();
//!
//! let ann = ops::create_one(&users, json!({"name": "Ann"}), None).await.unwrap();
//! let found = ops::find_by_id(&users, ann.get_id(), None, None).await.unwrap().unwrap();
//! assert_eq!(found.to_json(), json!({"_id": ann.get_id().to_string(), "name": "Ann"}));
//! # });
//! ```
//!
//! With the `docbind_derive` crate the four accessors are generated by
//! `#[derive(DocumentClass)]`.
//!
//! ## Module Organization
//!
//! - [`mapper`] - the in-process document mapper: connections, models, schemas, documents
//! - [`ops`] - CRUD helpers returning document classes
//! - [`errors`] - error type and result alias
//! - [`common`] - path helpers and shared constants

use crate::common::ObjectIdGenerator;
use once_cell::sync::Lazy;

mod builder;
mod class;
pub mod common;
pub mod errors;
mod id;
pub mod mapper;
pub mod ops;
mod registry;

pub use builder::DocClassBuilder;
pub use class::{DocumentClass, Replacement};
pub use errors::{DocbindError, DocbindResult, ErrorKind};
pub use id::{Id, ObjectId};
pub use ops::CreateOptions;
pub use registry::{RegisteredBuilder, Registry};

pub(crate) static ID_GENERATOR: Lazy<ObjectIdGenerator> = Lazy::new(ObjectIdGenerator::new);
