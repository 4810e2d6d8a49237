use crate::common::{get_path, remove_path, set_path, DOC_ID};
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::id::{Id, ObjectId};
use crate::mapper::connection::ConnectionInner;
use crate::mapper::event::ModelEventBus;
use crate::mapper::filter::{compare_for_sort, Filter};
use crate::mapper::projection::Projection;
use crate::mapper::update::Update;
use crate::mapper::{
    ConnectionConfig, DeleteResult, Document, HydratedDocument, ModelEventListener, ModelEvents, QueryOptions,
    Schema, SortOrder, SubscriberRef, UpdateResult,
};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::sync::{Arc, Weak};

/// A named, schema-bound handle for querying and persisting documents.
///
/// Models are created with [Connection::model](crate::mapper::Connection::model)
/// and are cheap to clone. Documents are kept in insertion order; without a
/// sort option every query returns them in that order.
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use docbind::mapper::{Connection, Schema, SchemaField};
/// use serde_json::json;
///
/// let connection = Connection::new();
/// let user = connection.model("User", Schema::new().field("age", SchemaField::number())).unwrap();
/// user.create_many(vec![json!({"age": 20}), json!({"age": 40})]).await.unwrap();
///
/// let adults = user.find(json!({"age": {"$gte": 30}}), None, None).await.unwrap();
/// assert_eq!(adults.len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

struct ModelInner {
    name: String,
    schema: Schema,
    config: ConnectionConfig,
    connection: Weak<ConnectionInner>,
    documents: RwLock<IndexMap<String, Document>>,
    event_bus: ModelEventBus,
}

/// Outcome of a single-document write, used by the `find_*_and_*` family.
struct Modification {
    before: Option<Document>,
    after: Option<Document>,
}

impl Model {
    pub(crate) fn new(name: &str, schema: Schema, config: ConnectionConfig, connection: Weak<ConnectionInner>) -> Self {
        Model {
            inner: Arc::new(ModelInner {
                name: name.to_string(),
                schema,
                config,
                connection,
                documents: RwLock::new(IndexMap::new()),
                event_bus: ModelEventBus::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Whether both handles point to the same model.
    pub fn same_model(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn subscribe(&self, listener: ModelEventListener) -> DocbindResult<SubscriberRef> {
        self.inner.event_bus.register(listener)
    }

    pub fn unsubscribe(&self, subscriber: SubscriberRef) -> DocbindResult<()> {
        self.inner.event_bus.deregister(subscriber)
    }

    /// Documents matching `filter`. The projection argument wins over the
    /// projection in `options`.
    pub async fn find(
        &self,
        filter: Value,
        projection: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Vec<HydratedDocument>> {
        let options = options.unwrap_or_default();
        self.log_operation("find", &filter);
        self.find_documents(Some(&filter), projection.as_ref(), &options, None)
    }

    pub async fn find_one(
        &self,
        filter: Value,
        projection: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Option<HydratedDocument>> {
        let options = options.unwrap_or_default();
        self.log_operation("findOne", &filter);
        Ok(self
            .find_documents(Some(&filter), projection.as_ref(), &options, Some(1))?
            .pop())
    }

    pub async fn find_by_id(
        &self,
        id: Id,
        projection: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Option<HydratedDocument>> {
        self.find_one(id_filter(&id), projection, options).await
    }

    pub async fn count_documents(&self, filter: Value, options: Option<QueryOptions>) -> DocbindResult<u64> {
        let options = options.unwrap_or_default();
        self.log_operation("countDocuments", &filter);
        let filter = Filter::compile(Some(&filter))?;
        let documents = self.inner.documents.read();
        Ok(select(&documents, &filter, &options, None).len() as u64)
    }

    /// Id of the first document matching `filter`, if any.
    pub async fn exists(&self, filter: Value) -> DocbindResult<Option<Id>> {
        self.log_operation("exists", &filter);
        let filter = Filter::compile(Some(&filter))?;
        let documents = self.inner.documents.read();
        let first = select(&documents, &filter, &QueryOptions::default(), Some(1));
        Ok(first.first().map(|key| Id::from(key.as_str())))
    }

    pub async fn delete_one(&self, filter: Option<Value>, options: Option<QueryOptions>) -> DocbindResult<DeleteResult> {
        self.log_operation("deleteOne", &filter);
        let removed = self.delete_documents(filter.as_ref(), &options.unwrap_or_default(), Some(1))?;
        Ok(DeleteResult::new(removed.len() as u64))
    }

    pub async fn delete_many(&self, filter: Option<Value>, options: Option<QueryOptions>) -> DocbindResult<DeleteResult> {
        self.log_operation("deleteMany", &filter);
        let removed = self.delete_documents(filter.as_ref(), &options.unwrap_or_default(), None)?;
        Ok(DeleteResult::new(removed.len() as u64))
    }

    pub async fn update_one(
        &self,
        filter: Option<Value>,
        update: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<UpdateResult> {
        self.log_operation("updateOne", &filter);
        self.update_documents(filter.as_ref(), update.as_ref(), &options.unwrap_or_default(), Some(1))
    }

    pub async fn update_many(
        &self,
        filter: Option<Value>,
        update: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<UpdateResult> {
        self.log_operation("updateMany", &filter);
        self.update_documents(filter.as_ref(), update.as_ref(), &options.unwrap_or_default(), None)
    }

    /// Updates the first match and returns it as it was before the update,
    /// or after it when `return_new` is set.
    pub async fn find_one_and_update(
        &self,
        filter: Option<Value>,
        update: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Option<HydratedDocument>> {
        let options = options.unwrap_or_default();
        self.log_operation("findOneAndUpdate", &filter);
        let update = Update::compile(update.as_ref())?;
        let strict = self.inner.config.is_strict();
        let modification = self.modify_one(filter.as_ref(), &options, |document, inserting| {
            update.apply(document, &self.inner.schema, strict, inserting).map(|_| ())
        })?;
        self.returned_document(modification, &options)
    }

    /// Replaces the first match, keeping its `_id`.
    pub async fn find_one_and_replace(
        &self,
        filter: Option<Value>,
        replacement: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Option<HydratedDocument>> {
        let options = options.unwrap_or_default();
        self.log_operation("findOneAndReplace", &filter);
        let replacement = match replacement {
            None | Some(Value::Null) => Document::new(),
            Some(Value::Object(map)) => self.inner.schema.cast_document(&map, self.inner.config.is_strict())?,
            Some(other) => return Err(mapping_error(&format!("replacement must be an object, got {}", other))),
        };

        let modification = self.modify_one(filter.as_ref(), &options, |document, _| {
            if let (Some(current), Some(requested)) = (document.get(DOC_ID), replacement.get(DOC_ID)) {
                if current != requested {
                    log::error!("Replacement for {} changes _id", current);
                    return Err(DocbindError::new(
                        "The _id field cannot be changed by a replacement",
                        ErrorKind::ImmutableField,
                    ));
                }
            }
            let mut replaced = Document::new();
            if let Some(id) = document.get(DOC_ID).or_else(|| replacement.get(DOC_ID)) {
                replaced.insert(DOC_ID.to_string(), id.clone());
            }
            for (key, value) in &replacement {
                if key != DOC_ID {
                    replaced.insert(key.clone(), value.clone());
                }
            }
            self.inner.schema.apply_defaults(&mut replaced);
            *document = replaced;
            Ok(())
        })?;
        self.returned_document(modification, &options)
    }

    pub async fn find_one_and_delete(
        &self,
        filter: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Option<HydratedDocument>> {
        let options = options.unwrap_or_default();
        self.log_operation("findOneAndDelete", &filter);
        let removed = self.delete_documents(filter.as_ref(), &options, Some(1))?;
        self.project_one(removed.into_iter().next(), options.projection_value())
    }

    pub async fn find_one_and_remove(
        &self,
        filter: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Option<HydratedDocument>> {
        self.find_one_and_delete(filter, options).await
    }

    pub async fn find_by_id_and_update(
        &self,
        id: Id,
        update: Option<Value>,
        options: Option<QueryOptions>,
    ) -> DocbindResult<Option<HydratedDocument>> {
        self.find_one_and_update(Some(id_filter(&id)), update, options).await
    }

    pub async fn find_by_id_and_delete(&self, id: Id, options: Option<QueryOptions>) -> DocbindResult<Option<HydratedDocument>> {
        self.find_one_and_delete(Some(id_filter(&id)), options).await
    }

    pub async fn find_by_id_and_remove(&self, id: Id, options: Option<QueryOptions>) -> DocbindResult<Option<HydratedDocument>> {
        self.find_one_and_delete(Some(id_filter(&id)), options).await
    }

    /// Builds an unsaved document: fields are cast, defaults applied and an
    /// [ObjectId] assigned when `_id` is missing.
    pub fn new_document(&self, data: Value) -> DocbindResult<HydratedDocument> {
        let data = match data {
            Value::Object(map) => map,
            other => return Err(mapping_error(&format!("document data must be an object, got {}", other))),
        };

        let mut document = Document::new();
        let id = match data.get(DOC_ID) {
            Some(value) if !value.is_null() => Id::from_value(value)?,
            _ => Id::from(ObjectId::new()),
        };
        document.insert(DOC_ID.to_string(), id.to_value());
        for (key, value) in self.inner.schema.cast_document(&data, self.inner.config.is_strict())? {
            if key != DOC_ID {
                document.insert(key, value);
            }
        }
        self.inner.schema.apply_defaults(&mut document);
        Ok(HydratedDocument::unsaved(self.clone(), id, document))
    }

    /// Builds and saves a document.
    pub async fn create(&self, data: Value) -> DocbindResult<HydratedDocument> {
        self.log_operation("create", &data);
        let mut document = self.new_document(data)?;
        document.save(None).await?;
        Ok(document)
    }

    /// Builds and saves documents in order, stopping at the first failure.
    pub async fn create_many(&self, data: Vec<Value>) -> DocbindResult<Vec<HydratedDocument>> {
        let mut created = Vec::with_capacity(data.len());
        for item in data {
            created.push(self.create(item).await?);
        }
        Ok(created)
    }

    pub(crate) fn insert_document(&self, document: Document) -> DocbindResult<()> {
        let key = document_key(&document)?;
        {
            let mut documents = self.inner.documents.write();
            if documents.contains_key(&key) {
                return Err(self.duplicate_key_error(&key));
            }
            documents.insert(key, document.clone());
        }
        self.publish(ModelEvents::Insert, vec![document]);
        Ok(())
    }

    /// Copies `paths` of `data` onto the stored document with id `id`.
    pub(crate) fn save_paths(&self, id: &Id, data: &Document, paths: &IndexSet<String>) -> DocbindResult<()> {
        let updated = {
            let mut documents = self.inner.documents.write();
            let stored = match documents.get_mut(&id.to_string()) {
                Some(stored) => stored,
                None => {
                    log::error!("No {} document found with id {}", self.name(), id);
                    return Err(DocbindError::new(
                        &format!("No document found for query \"{{ _id: '{}' }}\" on model \"{}\"", id, self.name()),
                        ErrorKind::DocumentNotFound,
                    ));
                }
            };
            for path in paths {
                match get_path(data, path) {
                    Some(value) => set_path(stored, path, value.clone())?,
                    None => {
                        remove_path(stored, path);
                    }
                }
            }
            stored.clone()
        };
        self.publish(ModelEvents::Update, vec![updated]);
        Ok(())
    }

    /// Looks up each id, in order; missing or filtered-out documents are `None`.
    pub(crate) fn resolve_references(
        &self,
        path: &str,
        ids: &[Value],
        match_filter: Option<&Value>,
        select: Option<&Value>,
    ) -> DocbindResult<Vec<Option<HydratedDocument>>> {
        let filter = Filter::compile(match_filter)?;
        let projection = Projection::compile(select)?;
        let resolved = {
            let documents = self.inner.documents.read();
            ids.iter()
                .map(|id| {
                    let found = Id::from_value(id)
                        .ok()
                        .and_then(|id| documents.get(&id.to_string()))
                        .filter(|document| filter.matches(document));
                    found.map(|document| self.hydrate(document, projection.as_ref())).transpose()
                })
                .collect::<DocbindResult<Vec<_>>>()?
        };
        log::debug!("Populated {} reference(s) at {} from {}", ids.len(), path, self.name());

        if let Err(e) = self.inner.event_bus.publish(
            || Some(json!({"path": path, "ids": ids})),
            ModelEvents::Populate,
            self.name(),
        ) {
            log::warn!("Failed to publish populate event for {} on {}: {}", path, self.name(), e);
        }
        Ok(resolved)
    }

    pub(crate) fn connected_model(&self, name: &str) -> DocbindResult<Model> {
        match self.inner.connection.upgrade() {
            Some(connection) => connection.get_model(name),
            None => {
                log::error!("Connection of model {} is closed", self.name());
                Err(DocbindError::new(
                    &format!("Cannot resolve model {}: the connection was dropped", name),
                    ErrorKind::PopulateError,
                ))
            }
        }
    }

    pub(crate) fn close(&self) -> DocbindResult<()> {
        self.inner.documents.write().clear();
        self.inner.event_bus.close()
    }

    fn find_documents(
        &self,
        filter: Option<&Value>,
        projection: Option<&Value>,
        options: &QueryOptions,
        limit: Option<usize>,
    ) -> DocbindResult<Vec<HydratedDocument>> {
        let filter = Filter::compile(filter)?;
        let projection = Projection::compile(projection.or(options.projection_value()))?;
        let documents = self.inner.documents.read();
        let keys = select(&documents, &filter, options, limit);
        keys.iter()
            .filter_map(|key| documents.get(key))
            .map(|document| self.hydrate(document, projection.as_ref()))
            .collect()
    }

    fn delete_documents(&self, filter: Option<&Value>, options: &QueryOptions, limit: Option<usize>) -> DocbindResult<Vec<Document>> {
        let filter = Filter::compile(filter)?;
        let removed: Vec<Document> = {
            let mut documents = self.inner.documents.write();
            let keys = select(&documents, &filter, options, limit);
            keys.iter().filter_map(|key| documents.shift_remove(key)).collect()
        };
        self.publish(ModelEvents::Remove, removed.clone());
        Ok(removed)
    }

    fn update_documents(
        &self,
        filter: Option<&Value>,
        update: Option<&Value>,
        options: &QueryOptions,
        limit: Option<usize>,
    ) -> DocbindResult<UpdateResult> {
        let compiled_filter = Filter::compile(filter)?;
        let update = Update::compile(update)?;
        let strict = self.inner.config.is_strict();

        let (result, changed, inserted) = {
            let mut documents = self.inner.documents.write();
            let keys = select(&documents, &compiled_filter, options, limit);

            if keys.is_empty() && options.is_upsert() {
                let document = self.upsert_document(&documents, &compiled_filter, |document| {
                    update.apply(document, &self.inner.schema, strict, true).map(|_| ())
                })?;
                let key = document_key(&document)?;
                documents.insert(key.clone(), document.clone());
                (UpdateResult::upserted(Id::from(key)), Vec::new(), Some(document))
            } else {
                // apply to copies first so a failing update leaves every document untouched
                let mut staged = Vec::with_capacity(keys.len());
                for key in &keys {
                    if let Some(stored) = documents.get(key) {
                        let mut document = stored.clone();
                        if update.apply(&mut document, &self.inner.schema, strict, false)? {
                            staged.push((key.clone(), document));
                        }
                    }
                }
                let modified = staged.len() as u64;
                let mut changed = Vec::with_capacity(staged.len());
                for (key, document) in staged {
                    documents.insert(key, document.clone());
                    changed.push(document);
                }
                (UpdateResult::matched(keys.len() as u64, modified), changed, None)
            }
        };

        self.publish(ModelEvents::Update, changed);
        if let Some(document) = inserted {
            self.publish(ModelEvents::Insert, vec![document]);
        }
        Ok(result)
    }

    /// Applies `change` to the first match, or to an upserted document when
    /// nothing matches and `upsert` is set. The flag tells `change` whether it
    /// works on a new document.
    fn modify_one<F>(&self, filter: Option<&Value>, options: &QueryOptions, change: F) -> DocbindResult<Modification>
    where
        F: Fn(&mut Document, bool) -> DocbindResult<()>,
    {
        let filter = Filter::compile(filter)?;
        let (modification, event) = {
            let mut documents = self.inner.documents.write();
            match select(&documents, &filter, options, Some(1)).into_iter().next() {
                Some(key) => {
                    let before = match documents.get(&key) {
                        Some(document) => document.clone(),
                        None => return Ok(Modification { before: None, after: None }),
                    };
                    let mut after = before.clone();
                    change(&mut after, false)?;
                    documents.insert(key, after.clone());
                    let event = (before != after).then(|| (ModelEvents::Update, after.clone()));
                    (Modification { before: Some(before), after: Some(after) }, event)
                }
                None if options.is_upsert() => {
                    let document = self.upsert_document(&documents, &filter, |document| change(document, true))?;
                    documents.insert(document_key(&document)?, document.clone());
                    (Modification { before: None, after: Some(document.clone()) }, Some((ModelEvents::Insert, document)))
                }
                None => (Modification { before: None, after: None }, None),
            }
        };

        if let Some((event_type, document)) = event {
            self.publish(event_type, vec![document]);
        }
        Ok(modification)
    }

    /// Builds the document inserted by an upsert from the filter's equalities.
    fn upsert_document<F>(&self, documents: &IndexMap<String, Document>, filter: &Filter, change: F) -> DocbindResult<Document>
    where
        F: FnOnce(&mut Document) -> DocbindResult<()>,
    {
        let strict = self.inner.config.is_strict();
        let mut document = Document::new();
        for (path, value) in filter.equality_seed() {
            if let Some(cast) = self.inner.schema.cast_path(&path, value, strict)? {
                set_path(&mut document, &path, cast)?;
            }
        }
        change(&mut document)?;

        if !document.contains_key(DOC_ID) {
            let mut with_id = Document::new();
            with_id.insert(DOC_ID.to_string(), Id::from(ObjectId::new()).to_value());
            with_id.extend(document);
            document = with_id;
        }
        self.inner.schema.apply_defaults(&mut document);

        let key = document_key(&document)?;
        if documents.contains_key(&key) {
            return Err(self.duplicate_key_error(&key));
        }
        Ok(document)
    }

    fn returned_document(&self, modification: Modification, options: &QueryOptions) -> DocbindResult<Option<HydratedDocument>> {
        let document = if options.is_return_new() {
            modification.after
        } else {
            modification.before
        };
        self.project_one(document, options.projection_value())
    }

    fn project_one(&self, document: Option<Document>, projection: Option<&Value>) -> DocbindResult<Option<HydratedDocument>> {
        let projection = Projection::compile(projection)?;
        document
            .map(|document| self.hydrate(&document, projection.as_ref()))
            .transpose()
    }

    fn hydrate(&self, document: &Document, projection: Option<&Projection>) -> DocbindResult<HydratedDocument> {
        let id = match document.get(DOC_ID) {
            Some(value) => Id::from_value(value)?,
            None => return Err(DocbindError::new("Stored document has no _id", ErrorKind::InternalError)),
        };
        let data = match projection {
            Some(projection) => projection.apply(document)?,
            None => document.clone(),
        };
        Ok(HydratedDocument::hydrate(self.clone(), id, data))
    }

    /// Publishes one event per document. The write has already happened, so
    /// a failing listener is logged and never fails the operation.
    fn publish(&self, event_type: ModelEvents, documents: Vec<Document>) {
        for document in documents {
            let key = document.get(DOC_ID).cloned().unwrap_or(Value::Null);
            if let Err(e) = self
                .inner
                .event_bus
                .publish(|| Some(Value::Object(document)), event_type.clone(), self.name())
            {
                log::warn!("Failed to publish {:?} event for {} on {}: {}", event_type, key, self.name(), e);
            }
        }
    }

    fn duplicate_key_error(&self, key: &str) -> DocbindError {
        log::error!("Duplicate _id {} in model {}", key, self.name());
        DocbindError::new(
            &format!("E11000 duplicate key error collection: {} dup key: {{ _id: \"{}\" }}", self.name(), key),
            ErrorKind::DuplicateKey,
        )
    }

    fn log_operation<T: std::fmt::Debug>(&self, operation: &str, argument: &T) {
        if self.inner.config.is_debug() {
            log::info!("{}.{}({:?})", self.name(), operation, argument);
        } else {
            log::debug!("{}.{}({:?})", self.name(), operation, argument);
        }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.inner.name)
            .field("schema", &self.inner.schema)
            .finish()
    }
}

/// Keys of the matching documents with sort, skip and limit applied.
fn select(
    documents: &IndexMap<String, Document>,
    filter: &Filter,
    options: &QueryOptions,
    limit: Option<usize>,
) -> Vec<String> {
    let mut matching: Vec<(&String, &Document)> = documents.iter().filter(|(_, d)| filter.matches(d)).collect();

    let sort = options.sort_fields();
    if !sort.is_empty() {
        matching.sort_by(|(_, a), (_, b)| {
            for (field, order) in sort {
                let ordering = compare_for_sort(get_path(a, field), get_path(b, field));
                let ordering = match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    let skip = options.skip_count().unwrap_or(0) as usize;
    let limit = match (options.limit_count(), limit) {
        (Some(a), Some(b)) => (a as usize).min(b),
        (Some(a), None) => a as usize,
        (None, Some(b)) => b,
        (None, None) => usize::MAX,
    };
    matching
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|(key, _)| key.clone())
        .collect()
}

fn id_filter(id: &Id) -> Value {
    let mut filter = Document::new();
    filter.insert(DOC_ID.to_string(), id.to_value());
    Value::Object(filter)
}

fn document_key(document: &Document) -> DocbindResult<String> {
    match document.get(DOC_ID) {
        Some(value) => Ok(Id::from_value(value)?.to_string()),
        None => Err(DocbindError::new("Document has no _id", ErrorKind::InternalError)),
    }
}

fn mapping_error(message: &str) -> DocbindError {
    log::error!("{}", message);
    DocbindError::new(message, ErrorKind::ObjectMappingError)
}
