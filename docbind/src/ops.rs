//! CRUD helpers that return document classes instead of raw documents.
//!
//! Every function takes the [DocClassBuilder] of the wrapper type first,
//! forwards the remaining arguments unchanged to the builder's model and wraps
//! each resulting document with the builder's constructor. Result summaries
//! (`DeleteResult`, `UpdateResult`), counts and ids are returned as they are.
//! Absent results come back as `None`. Errors from the mapper are passed
//! through untouched.

use crate::builder::DocClassBuilder;
use crate::class::{DocumentClass, Replacement};
use crate::common::DOC_ID;
use crate::errors::DocbindResult;
use crate::id::Id;
use crate::mapper::{DeleteResult, Document, QueryOptions, SaveOptions, UpdateResult};
use serde_json::Value;

/// Options of [create_one] and [create_many].
///
/// With `local` set, documents are only constructed in memory (unsaved,
/// `is_new() == true`); otherwise they are saved with the given save options.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    local: bool,
    save: Option<SaveOptions>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn save_options(mut self, options: SaveOptions) -> Self {
        self.save = Some(options);
        self
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn get_save_options(&self) -> Option<&SaveOptions> {
        self.save.as_ref()
    }
}

pub async fn find<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Value,
    projection: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<Vec<D>> {
    let documents = builder.model().find(filter, projection, options).await?;
    Ok(documents.into_iter().map(|document| builder.instantiate(document)).collect())
}

pub async fn find_one<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Value,
    projection: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let document = builder.model().find_one(filter, projection, options).await?;
    Ok(wrap(builder, document))
}

pub async fn find_by_id<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    id: impl Into<Id>,
    projection: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let id = id.into();
    let document = builder.model().find_by_id(id, projection, options).await?;
    Ok(wrap(builder, document))
}

pub async fn delete_one<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<DeleteResult> {
    builder.model().delete_one(filter, options).await
}

pub async fn delete_many<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<DeleteResult> {
    builder.model().delete_many(filter, options).await
}

pub async fn update_one<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    update: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<UpdateResult> {
    builder.model().update_one(filter, update, options).await
}

pub async fn update_many<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    update: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<UpdateResult> {
    builder.model().update_many(filter, update, options).await
}

pub async fn find_one_and_update<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    update: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let document = builder.model().find_one_and_update(filter, update, options).await?;
    Ok(wrap(builder, document))
}

pub async fn find_one_and_delete<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let document = builder.model().find_one_and_delete(filter, options).await?;
    Ok(wrap(builder, document))
}

pub async fn find_one_and_remove<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let document = builder.model().find_one_and_remove(filter, options).await?;
    Ok(wrap(builder, document))
}

/// Replaces the first match. A wrapper replacement is sent as the raw data of
/// the document it owns, exactly as if that document had been passed.
pub async fn find_one_and_replace<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Option<Value>,
    replacement: Option<Replacement<'_, D>>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let replacement = replacement.map(Replacement::into_value);
    let document = builder
        .model()
        .find_one_and_replace(filter, replacement, options)
        .await?;
    Ok(wrap(builder, document))
}

pub async fn find_by_id_and_update<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    id: impl Into<Id>,
    update: Option<Value>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let id = id.into();
    let document = builder.model().find_by_id_and_update(id, update, options).await?;
    Ok(wrap(builder, document))
}

pub async fn find_by_id_and_delete<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    id: impl Into<Id>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let id = id.into();
    let document = builder.model().find_by_id_and_delete(id, options).await?;
    Ok(wrap(builder, document))
}

pub async fn find_by_id_and_remove<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    id: impl Into<Id>,
    options: Option<QueryOptions>,
) -> DocbindResult<Option<D>> {
    let id = id.into();
    let document = builder.model().find_by_id_and_remove(id, options).await?;
    Ok(wrap(builder, document))
}

/// Creates one document, saved unless `local` is set.
pub async fn create_one<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    document: Value,
    options: Option<CreateOptions>,
) -> DocbindResult<D> {
    let options = options.unwrap_or_default();
    let mut document = builder.model().new_document(document)?;
    if !options.is_local() {
        document.save(options.get_save_options().cloned()).await?;
    }
    Ok(builder.instantiate(document))
}

/// Creates documents in order. When saving, stops at the first failure;
/// documents saved before it stay saved.
pub async fn create_many<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    documents: Vec<Value>,
    options: Option<CreateOptions>,
) -> DocbindResult<Vec<D>> {
    let options = options.unwrap_or_default();
    let mut created = Vec::with_capacity(documents.len());
    for data in documents {
        created.push(create_one(builder, data, Some(options.clone())).await?);
    }
    Ok(created)
}

pub async fn count_documents<D: DocumentClass>(
    builder: &DocClassBuilder<D>,
    filter: Value,
    options: Option<QueryOptions>,
) -> DocbindResult<u64> {
    builder.model().count_documents(filter, options).await
}

/// Id of the first matching document, if any.
pub async fn exists<D: DocumentClass>(builder: &DocClassBuilder<D>, filter: Value) -> DocbindResult<Option<Id>> {
    builder.model().exists(filter).await
}

pub async fn exists_by_id<D: DocumentClass>(builder: &DocClassBuilder<D>, id: impl Into<Id>) -> DocbindResult<Option<Id>> {
    let mut filter = Document::new();
    filter.insert(DOC_ID.to_string(), id.into().to_value());
    exists(builder, Value::Object(filter)).await
}

fn wrap<D: DocumentClass>(builder: &DocClassBuilder<D>, document: Option<crate::mapper::HydratedDocument>) -> Option<D> {
    document.map(|document| builder.instantiate(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::mapper::{Connection, HydratedDocument, Schema, SchemaField};
    use crate::Registry;
    use serde_json::json;

    struct Item(HydratedDocument);

    impl DocumentClass for Item {
        fn from_document(document: HydratedDocument) -> Self {
            Item(document)
        }
        fn document(&self) -> &HydratedDocument {
            &self.0
        }
        fn document_mut(&mut self) -> &mut HydratedDocument {
            &mut self.0
        }
        fn into_document(self) -> HydratedDocument {
            self.0
        }
    }

    fn items() -> DocClassBuilder<Item> {
        Registry::new(Connection::new())
            .register::<Item>(
                "Item",
                Schema::new()
                    .field("name", SchemaField::string().required())
                    .field("qty", SchemaField::number()),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn create_and_find_by_id() {
        let items = items();
        let created = create_one(&items, json!({"name": "A"}), None).await.unwrap();
        assert!(!created.is_new());

        let found = find_by_id(&items, created.get_id(), None, None).await.unwrap().unwrap();
        assert_eq!(found.get_id(), created.get_id());
        assert_eq!(found.to_json(), json!({"_id": created.get_id().to_string(), "name": "A"}));
    }

    #[tokio::test]
    async fn local_create_does_not_write() {
        let items = items();
        let local = create_one(&items, json!({"name": "A"}), Some(CreateOptions::new().local(true))).await.unwrap();
        assert!(local.is_new());
        assert_eq!(count_documents(&items, json!({}), None).await.unwrap(), 0);

        let many = create_many(&items, vec![json!({"name": "B"}), json!({})], Some(CreateOptions::new().local(true)))
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert!(many.iter().all(|item| item.is_new()));
    }

    #[tokio::test]
    async fn create_passes_save_options() {
        let items = items();
        let err = create_one(&items, json!({"qty": 1}), None).await.err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let options = CreateOptions::new().save_options(SaveOptions::new().validate_before_save(false));
        let created = create_one(&items, json!({"qty": 1}), Some(options)).await.unwrap();
        assert!(!created.is_new());
    }

    #[tokio::test]
    async fn absent_results_are_none() {
        let items = items();
        assert!(find_one(&items, json!({"name": "zzz"}), None, None).await.unwrap().is_none());
        assert!(find_by_id(&items, "missing", None, None).await.unwrap().is_none());
        assert!(find_one_and_delete(&items, None, None).await.unwrap().is_none());
        assert!(exists_by_id(&items, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replacement_with_instance_equals_raw() {
        async fn replace_with(use_instance: bool) -> Value {
            let items = items();
            create_one(&items, json!({"_id": "a", "name": "A", "qty": 1}), None).await.unwrap();
            let template = create_one(&items, json!({"_id": "a", "name": "T"}), Some(CreateOptions::new().local(true)))
                .await
                .unwrap();
            let replacement = if use_instance {
                Replacement::Instance(&template)
            } else {
                Replacement::Raw(Value::Object(template.document().raw().clone()))
            };
            let replaced = find_one_and_replace(&items, Some(json!({"_id": "a"})), Some(replacement), Some(QueryOptions::new().return_new(true)))
                .await
                .unwrap()
                .unwrap();
            replaced.to_json()
        }

        let by_instance = replace_with(true).await;
        assert_eq!(by_instance, json!({"_id": "a", "name": "T"}));
        assert_eq!(by_instance, replace_with(false).await);
    }

    #[tokio::test]
    async fn update_and_delete_results_are_not_wrapped() {
        let items = items();
        create_many(&items, vec![json!({"name": "A", "qty": 1}), json!({"name": "B", "qty": 2})], None)
            .await
            .unwrap();
        let updated = update_many(&items, None, Some(json!({"$inc": {"qty": 1}})), None).await.unwrap();
        assert_eq!(updated.modified_count, 2);
        let updated = update_one(&items, Some(json!({"name": "A"})), Some(json!({"qty": 2})), None).await.unwrap();
        assert_eq!((updated.matched_count, updated.modified_count), (1, 0));
        assert_eq!(delete_one(&items, Some(json!({"name": "A"})), None).await.unwrap().deleted_count, 1);
        assert_eq!(delete_many(&items, None, None).await.unwrap().deleted_count, 1);
    }
}
