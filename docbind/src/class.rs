use crate::builder::DocClassBuilder;
use crate::errors::DocbindResult;
use crate::id::Id;
use crate::mapper::{HydratedDocument, PopulateOptions, SaveOptions};
use async_trait::async_trait;
use serde_json::Value;

/// A typed wrapper owning exactly one [HydratedDocument].
///
/// Implementors supply the four accessors, usually through
/// `#[derive(DocumentClass)]`; everything else forwards to the wrapped
/// document.
///
/// ```rust
/// use docbind::mapper::HydratedDocument;
/// use docbind::DocumentClass;
///
/// struct User {
///     document: HydratedDocument,
/// }
///
/// impl DocumentClass for User {
///     fn from_document(document: HydratedDocument) -> Self {
///         User { document }
///     }
///
///     fn document(&self) -> &HydratedDocument {
///         &self.document
///     }
///
///     fn document_mut(&mut self) -> &mut HydratedDocument {
///         &mut self.document
///     }
///
///     fn into_document(self) -> HydratedDocument {
///         self.document
///     }
/// }
/// ```
#[async_trait]
pub trait DocumentClass: Sized + Send + Sync + 'static {
    fn from_document(document: HydratedDocument) -> Self;

    fn document(&self) -> &HydratedDocument;

    fn document_mut(&mut self) -> &mut HydratedDocument;

    fn into_document(self) -> HydratedDocument;

    fn get_id(&self) -> Id {
        self.document().id()
    }

    async fn save(&mut self, options: Option<SaveOptions>) -> DocbindResult<()> {
        self.document_mut().save(options).await
    }

    fn is_modified(&self, paths: Option<&[&str]>) -> bool {
        self.document().is_modified(paths)
    }

    fn is_new(&self) -> bool {
        self.document().is_new()
    }

    /// Lazily populates a single reference and wraps the result with `target`.
    ///
    /// When `path` is already populated the existing result is reused and no
    /// lookup happens. Otherwise `options` (with its path forced to `path`) or
    /// a bare path-only population is run first. Returns `None` when the
    /// referenced document does not exist.
    async fn populate<T>(
        &mut self,
        target: &DocClassBuilder<T>,
        path: &str,
        options: Option<PopulateOptions>,
    ) -> DocbindResult<Option<T>>
    where
        T: DocumentClass,
    {
        ensure_populated(self.document_mut(), path, options).await?;
        Ok(self
            .document()
            .populated_document(path)
            .cloned()
            .map(|document| target.instantiate(document)))
    }

    /// Same as [DocumentClass::populate] for a path holding an array of references.
    async fn populate_many<T>(
        &mut self,
        target: &DocClassBuilder<T>,
        path: &str,
        options: Option<PopulateOptions>,
    ) -> DocbindResult<Vec<T>>
    where
        T: DocumentClass,
    {
        ensure_populated(self.document_mut(), path, options).await?;
        Ok(self
            .document()
            .populated_documents(path)
            .unwrap_or_default()
            .iter()
            .cloned()
            .map(|document| target.instantiate(document))
            .collect())
    }

    fn to_json(&self) -> Value {
        self.document().to_json()
    }
}

async fn ensure_populated(document: &mut HydratedDocument, path: &str, options: Option<PopulateOptions>) -> DocbindResult<()> {
    if document.populated(path).is_some() {
        log::debug!("Path {} already populated", path);
        return Ok(());
    }
    let options = match options {
        Some(options) => options.with_path(path),
        None => PopulateOptions::new(path),
    };
    document.populate(options).await
}

/// A value passed where either a wrapper or a raw document is accepted.
///
/// A wrapper contributes the raw data of the document it owns.
#[derive(Debug)]
pub enum Replacement<'a, D> {
    Instance(&'a D),
    Raw(Value),
}

impl<D: DocumentClass> Replacement<'_, D> {
    pub fn into_value(self) -> Value {
        match self {
            Replacement::Instance(instance) => Value::Object(instance.document().raw().clone()),
            Replacement::Raw(value) => value,
        }
    }
}

impl<'a, D: DocumentClass> From<&'a D> for Replacement<'a, D> {
    fn from(instance: &'a D) -> Self {
        Replacement::Instance(instance)
    }
}

impl<D> From<Value> for Replacement<'_, D> {
    fn from(value: Value) -> Self {
        Replacement::Raw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{Connection, ModelEventListener, ModelEvents, Schema, SchemaField};
    use crate::Registry;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct User {
        document: HydratedDocument,
    }

    impl DocumentClass for User {
        fn from_document(document: HydratedDocument) -> Self {
            User { document }
        }

        fn document(&self) -> &HydratedDocument {
            &self.document
        }

        fn document_mut(&mut self) -> &mut HydratedDocument {
            &mut self.document
        }

        fn into_document(self) -> HydratedDocument {
            self.document
        }
    }

    struct Post {
        document: HydratedDocument,
    }

    impl DocumentClass for Post {
        fn from_document(document: HydratedDocument) -> Self {
            Post { document }
        }

        fn document(&self) -> &HydratedDocument {
            &self.document
        }

        fn document_mut(&mut self) -> &mut HydratedDocument {
            &mut self.document
        }

        fn into_document(self) -> HydratedDocument {
            self.document
        }
    }

    fn registry() -> Registry {
        let registry = Registry::new(Connection::new());
        registry
            .model("User", Schema::new().field("name", SchemaField::string()), User::from_document)
            .unwrap();
        registry
            .model(
                "Post",
                Schema::new()
                    .field("title", SchemaField::string())
                    .field("author", SchemaField::reference("User"))
                    .field("readers", SchemaField::array(SchemaField::reference("User"))),
                Post::from_document,
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn forwards_to_the_document() {
        let registry = registry();
        let users = registry.get_typed_builder::<User>("User").unwrap();
        let mut user = users.instantiate(users.model().new_document(json!({"name": "Ann"})).unwrap());
        assert!(user.is_new());
        assert!(user.is_modified(Some(&["name"][..])));

        user.save(None).await.unwrap();
        assert!(!user.is_new());
        assert!(!user.is_modified(None));
        assert_eq!(user.to_json(), json!({"_id": user.get_id().to_string(), "name": "Ann"}));
    }

    #[tokio::test]
    async fn populate_resolves_once() {
        let registry = registry();
        let users = registry.get_typed_builder::<User>("User").unwrap();
        let posts = registry.get_typed_builder::<Post>("Post").unwrap();
        let ann = users.model().create(json!({"name": "Ann"})).await.unwrap();
        let post = posts.model().create(json!({"title": "t", "author": ann.id().to_string()})).await.unwrap();

        let resolutions = Arc::new(AtomicUsize::new(0));
        let seen = resolutions.clone();
        users
            .model()
            .subscribe(ModelEventListener::new(move |event| {
                if event.event_type() == ModelEvents::Populate {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }))
            .unwrap();

        let mut post = posts.instantiate(post);
        let first = post.populate(&users, "author", None).await.unwrap().unwrap();
        let second = post.populate(&users, "author", None).await.unwrap().unwrap();
        assert_eq!(first.get_id(), ann.id());
        assert_eq!(second.get_id(), ann.id());
        assert_eq!(resolutions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn populate_forces_the_path_on_given_options() {
        let registry = registry();
        let users = registry.get_typed_builder::<User>("User").unwrap();
        let posts = registry.get_typed_builder::<Post>("Post").unwrap();
        let ann = users.model().create(json!({"name": "Ann"})).await.unwrap();
        let bea = users.model().create(json!({"name": "Bea"})).await.unwrap();
        let post = posts
            .model()
            .create(json!({"title": "t", "readers": [ann.id().to_string(), bea.id().to_string()]}))
            .await
            .unwrap();

        let mut post = posts.instantiate(post);
        let readers = post
            .populate_many(&users, "readers", Some(PopulateOptions::new("ignored").select(json!({"_id": 1}))))
            .await
            .unwrap();
        assert_eq!(readers.len(), 2);
        assert_eq!(readers[1].to_json(), json!({"_id": bea.id().to_string()}));

        let author = post.populate(&users, "author", None).await.unwrap();
        assert!(author.is_none());
    }

    #[tokio::test]
    async fn replacement_from_instance_uses_raw_data() {
        let registry = registry();
        let users = registry.get_typed_builder::<User>("User").unwrap();
        let user = users.instantiate(users.model().new_document(json!({"_id": "u1", "name": "Ann"})).unwrap());
        let replacement: Replacement<'_, User> = Replacement::from(&user);
        assert_eq!(replacement.into_value(), json!({"_id": "u1", "name": "Ann"}));
        let raw: Replacement<'_, User> = json!({"name": "x"}).into();
        assert_eq!(raw.into_value(), json!({"name": "x"}));
    }
}
