use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::mapper::{ConnectionBuilder, ConnectionConfig, Model, Schema};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-process document store holding named models.
///
/// `Connection` is a cheap handle; clones share the same models.
///
/// ```rust
/// use docbind::mapper::{Connection, Schema, SchemaField};
///
/// let connection = Connection::new();
/// let user = connection.model("User", Schema::new().field("name", SchemaField::string())).unwrap();
/// assert_eq!(user.name(), "User");
/// assert!(connection.has_model("User"));
/// assert!(connection.model("User", Schema::new()).is_err());
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    pub(crate) fn with_config(config: ConnectionConfig) -> Self {
        Connection {
            inner: Arc::new(ConnectionInner {
                config,
                models: RwLock::new(IndexMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Defines a new model. Fails with `ModelAlreadyExists` if the name is taken.
    pub fn model(&self, name: &str, schema: Schema) -> DocbindResult<Model> {
        let mut models = self.inner.models.write();
        if models.contains_key(name) {
            log::error!("Model {} already exists", name);
            return Err(DocbindError::new(
                &format!("Cannot overwrite `{}` model once compiled", name),
                ErrorKind::ModelAlreadyExists,
            ));
        }

        let model = Model::new(name, schema, self.inner.config.clone(), Arc::downgrade(&self.inner));
        models.insert(name.to_string(), model.clone());
        log::debug!("Model {} defined", name);
        Ok(model)
    }

    /// Looks up a defined model. Fails with `ModelNotFound` if absent.
    pub fn get_model(&self, name: &str) -> DocbindResult<Model> {
        self.inner.get_model(name)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.inner.models.read().contains_key(name)
    }

    /// Names of the defined models in definition order.
    pub fn model_names(&self) -> Vec<String> {
        self.inner.models.read().keys().cloned().collect()
    }

    /// Removes a model and its documents. Returns `false` if it was not defined.
    pub fn delete_model(&self, name: &str) -> DocbindResult<bool> {
        let removed = self.inner.models.write().shift_remove(name);
        match removed {
            Some(model) => {
                model.close()?;
                log::debug!("Model {} deleted", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub(crate) struct ConnectionInner {
    config: ConnectionConfig,
    models: RwLock<IndexMap<String, Model>>,
}

impl ConnectionInner {
    pub(crate) fn get_model(&self, name: &str) -> DocbindResult<Model> {
        match self.models.read().get(name) {
            Some(model) => Ok(model.clone()),
            None => {
                log::error!("Model {} is not defined", name);
                Err(DocbindError::new(
                    &format!("Schema hasn't been registered for model \"{}\"", name),
                    ErrorKind::ModelNotFound,
                ))
            }
        }
    }
}
