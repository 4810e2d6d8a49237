use crate::class::DocumentClass;
use crate::mapper::{HydratedDocument, Model, Schema};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Everything needed to turn raw mapper results into wrappers of type `D`:
/// the model name, the schema it was registered with, the model, and the
/// constructor.
///
/// Builders come from [Registry::model](crate::Registry::model) and are cheap
/// to clone. The schema is the one given at registration, which is not
/// necessarily the one the model was created with when a name is registered
/// twice.
pub struct DocClassBuilder<D> {
    inner: Arc<BuilderInner<D>>,
}

struct BuilderInner<D> {
    model_name: String,
    schema: Schema,
    model: Model,
    constructor: Box<dyn Fn(HydratedDocument) -> D + Send + Sync>,
}

impl<D: DocumentClass> DocClassBuilder<D> {
    pub(crate) fn new<F>(model_name: &str, schema: Schema, model: Model, constructor: F) -> Self
    where
        F: Fn(HydratedDocument) -> D + Send + Sync + 'static,
    {
        DocClassBuilder {
            inner: Arc::new(BuilderInner {
                model_name: model_name.to_string(),
                schema,
                model,
                constructor: Box::new(constructor),
            }),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.inner.model_name
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    /// Wraps a document produced by this builder's model.
    pub fn instantiate(&self, document: HydratedDocument) -> D {
        (self.inner.constructor)(document)
    }
}

impl<D> Clone for DocClassBuilder<D> {
    fn clone(&self) -> Self {
        DocClassBuilder {
            inner: self.inner.clone(),
        }
    }
}

impl<D> Debug for DocClassBuilder<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocClassBuilder")
            .field("model_name", &self.inner.model_name)
            .field("wrapper", &std::any::type_name::<D>())
            .finish()
    }
}
