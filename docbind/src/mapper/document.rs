use crate::common::{get_path, paths_overlap, remove_path, set_path, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::id::Id;
use crate::mapper::{Document, Model, PopulateOptions, SaveOptions};
use indexmap::{IndexMap, IndexSet};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::{Debug, Formatter};

/// A document bound to its [Model].
///
/// Hydrated documents are produced by model queries, by
/// [Model::new_document] and by [Model::create]. They track which paths were
/// changed since they were loaded, whether they were ever persisted, and which
/// reference paths have been populated.
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use docbind::mapper::{Connection, Schema, SchemaField};
/// use serde_json::json;
///
/// let connection = Connection::new();
/// let user = connection.model("User", Schema::new().field("name", SchemaField::string())).unwrap();
///
/// let mut doc = user.new_document(json!({"name": "Ann"})).unwrap();
/// assert!(doc.is_new());
/// doc.save(None).await.unwrap();
/// assert!(!doc.is_new());
/// assert!(!doc.is_modified(None));
/// # });
/// ```
#[derive(Clone)]
pub struct HydratedDocument {
    model: Model,
    id: Id,
    data: Document,
    is_new: bool,
    modified: IndexSet<String>,
    populated: IndexMap<String, PopulatedPath>,
}

#[derive(Clone)]
struct PopulatedPath {
    original: Value,
    value: PopulatedValue,
}

#[derive(Clone)]
enum PopulatedValue {
    One(Option<Box<HydratedDocument>>),
    Many(Vec<HydratedDocument>),
}

impl HydratedDocument {
    /// Wraps a document read from the store.
    pub(crate) fn hydrate(model: Model, id: Id, data: Document) -> Self {
        HydratedDocument {
            model,
            id,
            data,
            is_new: false,
            modified: IndexSet::new(),
            populated: IndexMap::new(),
        }
    }

    /// Wraps a freshly constructed, never saved document. Every given path counts as modified.
    pub(crate) fn unsaved(model: Model, id: Id, data: Document) -> Self {
        let modified = data.keys().filter(|key| key.as_str() != DOC_ID).cloned().collect();
        HydratedDocument {
            model,
            id,
            data,
            is_new: true,
            modified,
            populated: IndexMap::new(),
        }
    }

    pub fn id(&self) -> Id {
        self.id.clone()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Raw value at a dotted path. Populated paths still hold their ids here.
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.data, path)
    }

    /// The stored data, without population applied.
    pub fn raw(&self) -> &Document {
        &self.data
    }

    /// Value at a dotted path deserialized into `T`; `None` when absent or null.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> DocbindResult<Option<T>> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Writes a value through the schema's casting rules.
    ///
    /// The path is marked modified and any population below or above it is dropped.
    pub fn set(&mut self, path: &str, value: Value) -> DocbindResult<()> {
        let cast = match self
            .model
            .schema()
            .cast_path(path, value, self.model.config().is_strict())?
        {
            Some(cast) => cast,
            None => return Ok(()),
        };

        if path == DOC_ID {
            let id = Id::from_value(&cast)?;
            if id == self.id {
                return Ok(());
            }
            if !self.is_new {
                log::error!("Attempt to change _id of a persisted {} document", self.model.name());
                return Err(DocbindError::new(
                    "Cannot modify the immutable field '_id' of a saved document",
                    ErrorKind::ImmutableField,
                ));
            }
            self.id = id;
        }

        set_path(&mut self.data, path, cast)?;
        self.modified.insert(path.to_string());
        self.populated.retain(|populated, _| !paths_overlap(populated, path));
        Ok(())
    }

    /// Removes a path from the document, marking it modified.
    pub fn unset(&mut self, path: &str) -> DocbindResult<()> {
        if path == DOC_ID {
            return Err(DocbindError::new(
                "Cannot unset the immutable field '_id'",
                ErrorKind::ImmutableField,
            ));
        }
        if remove_path(&mut self.data, path).is_some() {
            self.modified.insert(path.to_string());
            self.populated.retain(|populated, _| !paths_overlap(populated, path));
        }
        Ok(())
    }

    /// Whether anything changed since load, or, when `paths` is given,
    /// whether any of those paths (or paths above/below them) changed.
    pub fn is_modified(&self, paths: Option<&[&str]>) -> bool {
        match paths {
            None => !self.modified.is_empty(),
            Some(paths) => self
                .modified
                .iter()
                .any(|modified| paths.iter().any(|path| paths_overlap(modified, path))),
        }
    }

    /// Paths changed since load, in the order they were first written.
    pub fn modified_paths(&self) -> Vec<String> {
        self.modified.iter().cloned().collect()
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// The original reference value(s) of `path` if it is populated.
    pub fn populated(&self, path: &str) -> Option<&Value> {
        self.populated.get(path).map(|entry| &entry.original)
    }

    /// The document a single reference resolved to. `None` when not populated,
    /// when the path is an array reference, or when the referenced document is missing.
    pub fn populated_document(&self, path: &str) -> Option<&HydratedDocument> {
        match &self.populated.get(path)?.value {
            PopulatedValue::One(document) => document.as_deref(),
            PopulatedValue::Many(_) => None,
        }
    }

    /// The documents an array of references resolved to, missing ones skipped.
    pub fn populated_documents(&self, path: &str) -> Option<&[HydratedDocument]> {
        match &self.populated.get(path)?.value {
            PopulatedValue::Many(documents) => Some(documents.as_slice()),
            PopulatedValue::One(_) => None,
        }
    }

    pub fn depopulate(&mut self, path: &str) {
        self.populated.shift_remove(path);
    }

    /// Resolves the reference(s) stored at the options' path.
    ///
    /// Always performs a lookup, even if the path is already populated; callers
    /// wanting lazy behaviour check [HydratedDocument::populated] first.
    pub async fn populate(&mut self, options: PopulateOptions) -> DocbindResult<()> {
        self.populate_path(&options)
    }

    fn populate_path(&mut self, options: &PopulateOptions) -> DocbindResult<()> {
        let path = options.path();
        let target = self.reference_model(options)?;
        let original = self.get(path).cloned().unwrap_or(Value::Null);

        let (ids, many) = match &original {
            Value::Array(ids) => (ids.clone(), true),
            Value::Null => (Vec::new(), false),
            id => (vec![id.clone()], false),
        };
        let mut resolved = target.resolve_references(path, &ids, options.match_value(), options.select_value())?;

        let value = if many {
            PopulatedValue::Many(resolved.into_iter().flatten().collect())
        } else {
            PopulatedValue::One(resolved.pop().flatten().map(Box::new))
        };
        self.populated.insert(path.to_string(), PopulatedPath { original, value });
        Ok(())
    }

    fn reference_model(&self, options: &PopulateOptions) -> DocbindResult<Model> {
        let model_name = match options.model_name() {
            Some(name) => name.to_string(),
            None => {
                let root = options.path().split(FIELD_SEPARATOR).next().unwrap_or_default();
                match self.model.schema().reference_of(options.path()).or_else(|| self.model.schema().reference_of(root)) {
                    Some(name) => name.to_string(),
                    None => {
                        log::error!("No reference declared for {}.{}", self.model.name(), options.path());
                        return Err(DocbindError::new(
                            &format!(
                                "Cannot populate path `{}` of {}: no model given and the schema declares no reference",
                                options.path(),
                                self.model.name()
                            ),
                            ErrorKind::PopulateError,
                        ));
                    }
                }
            }
        };
        self.model.connected_model(&model_name)
    }

    /// Plain copy of the data with populated paths replaced by their documents.
    pub fn to_object(&self) -> Document {
        let mut object = self.data.clone();
        for (path, entry) in &self.populated {
            let rendered = match &entry.value {
                PopulatedValue::One(Some(document)) => document.to_json(),
                PopulatedValue::One(None) if entry.original.is_null() => continue,
                PopulatedValue::One(None) => Value::Null,
                PopulatedValue::Many(documents) => {
                    Value::Array(documents.iter().map(HydratedDocument::to_json).collect())
                }
            };
            if let Err(e) = set_path(&mut object, path, rendered) {
                log::warn!("Cannot render populated path {}: {}", path, e);
            }
        }
        object
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_object())
    }

    /// Deserializes the rendered document into `T`.
    pub fn to_struct<T: DeserializeOwned>(&self) -> DocbindResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// Persists the document.
    ///
    /// A new document is inserted (`DuplicateKey` if its id is taken). A loaded
    /// one writes only its modified paths (`DocumentNotFound` if it was deleted
    /// meanwhile); with nothing modified this is a no-op.
    pub async fn save(&mut self, options: Option<SaveOptions>) -> DocbindResult<()> {
        self.save_document(options.unwrap_or_default())
    }

    fn save_document(&mut self, options: SaveOptions) -> DocbindResult<()> {
        if options.is_validate_before_save() {
            self.model.schema().validate(self.model.name(), &self.data)?;
        }

        if self.is_new {
            self.model.insert_document(self.data.clone())?;
            self.is_new = false;
        } else if !self.modified.is_empty() {
            self.model.save_paths(&self.id, &self.data, &self.modified)?;
        }
        self.modified.clear();
        Ok(())
    }
}

impl Debug for HydratedDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HydratedDocument")
            .field("model", &self.model.name())
            .field("id", &self.id)
            .field("data", &self.data)
            .field("is_new", &self.is_new)
            .finish()
    }
}
