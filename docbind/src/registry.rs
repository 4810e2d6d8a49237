use crate::builder::DocClassBuilder;
use crate::class::DocumentClass;
use crate::errors::DocbindResult;
use crate::mapper::{Connection, HydratedDocument, Model, Schema};
use dashmap::DashMap;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Name-keyed table of document class builders over one [Connection].
///
/// Registering a name a second time replaces the stored builder but keeps the
/// model that already exists under that name, so the second schema never
/// reaches the mapper. Registration is meant to happen at startup; two
/// concurrent first registrations of one name may see `ModelAlreadyExists`.
///
/// ```rust
/// use docbind::mapper::{Connection, HydratedDocument, Schema, SchemaField};
/// use docbind::{DocumentClass, Registry};
///
/// struct Tag(HydratedDocument);
///
/// impl DocumentClass for Tag {
///     fn from_document(document: HydratedDocument) -> Self { Tag(document) }
///     fn document(&self) -> &HydratedDocument { &self.0 }
///     fn document_mut(&mut self) -> &mut HydratedDocument { &mut self.0 }
///     fn into_document(self) -> HydratedDocument { self.0 }
/// }
///
/// let registry = Registry::new(Connection::new());
/// let tags = registry
///     .model("Tag", Schema::new().field("label", SchemaField::string()), Tag::from_document)
///     .unwrap();
/// assert_eq!(tags.model_name(), "Tag");
/// assert!(registry.get_builder("Tag").is_some());
/// assert!(registry.get_builder("Nope").is_none());
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    connection: Connection,
    builders: DashMap<String, RegisteredBuilder>,
}

impl Registry {
    pub fn new(connection: Connection) -> Self {
        Registry {
            inner: Arc::new(RegistryInner {
                connection,
                builders: DashMap::new(),
            }),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Registers a document class under `name` and returns its builder.
    pub fn model<D, F>(&self, name: &str, schema: Schema, constructor: F) -> DocbindResult<DocClassBuilder<D>>
    where
        D: DocumentClass,
        F: Fn(HydratedDocument) -> D + Send + Sync + 'static,
    {
        let connection = &self.inner.connection;
        let model = if connection.has_model(name) {
            log::debug!("Reusing existing model {} for {}", name, std::any::type_name::<D>());
            connection.get_model(name)?
        } else {
            connection.model(name, schema.clone())?
        };

        let builder = DocClassBuilder::new(name, schema, model, constructor);
        if let Some(previous) = self
            .inner
            .builders
            .insert(name.to_string(), RegisteredBuilder::from_builder(&builder))
        {
            log::warn!("Builder {} replaced; it was registered for {}", name, previous.type_name);
        }
        Ok(builder)
    }

    /// Registers `D` with its own [DocumentClass::from_document] as constructor.
    pub fn register<D: DocumentClass>(&self, name: &str, schema: Schema) -> DocbindResult<DocClassBuilder<D>> {
        self.model(name, schema, D::from_document)
    }

    pub fn get_builder(&self, name: &str) -> Option<RegisteredBuilder> {
        self.inner.builders.get(name).map(|entry| entry.value().clone())
    }

    /// The builder registered under `name`, if it builds `D`.
    pub fn get_typed_builder<D: DocumentClass>(&self, name: &str) -> Option<DocClassBuilder<D>> {
        self.get_builder(name)?.downcast::<D>()
    }

    pub fn has_builder(&self, name: &str) -> bool {
        self.inner.builders.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn builder_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.builders.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("builders", &self.builder_names())
            .finish()
    }
}

/// A type-erased builder as stored in a [Registry].
#[derive(Clone)]
pub struct RegisteredBuilder {
    model_name: String,
    schema: Schema,
    model: Model,
    type_name: &'static str,
    builder: Arc<dyn Any + Send + Sync>,
}

impl RegisteredBuilder {
    fn from_builder<D: DocumentClass>(builder: &DocClassBuilder<D>) -> Self {
        RegisteredBuilder {
            model_name: builder.model_name().to_string(),
            schema: builder.schema().clone(),
            model: builder.model().clone(),
            type_name: std::any::type_name::<D>(),
            builder: Arc::new(builder.clone()),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Name of the wrapper type the builder constructs.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The typed builder, or `None` when it builds a different wrapper type.
    pub fn downcast<D: DocumentClass>(&self) -> Option<DocClassBuilder<D>> {
        self.builder.downcast_ref::<DocClassBuilder<D>>().cloned()
    }
}

impl Debug for RegisteredBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBuilder")
            .field("model_name", &self.model_name)
            .field("type_name", &self.type_name)
            .finish()
    }
}
