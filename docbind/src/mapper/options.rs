use serde_json::Value;

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Options shared by the query and command operations of a [Model](crate::mapper::Model).
///
/// Not every operation honours every option: `return_new` and `projection`
/// only matter for the `find_*_and_*` family, `upsert` only for updates and
/// replacements.
///
/// ```rust
/// use docbind::mapper::{QueryOptions, SortOrder};
///
/// let options = QueryOptions::new()
///     .sort_by("age", SortOrder::Descending)
///     .skip(10)
///     .limit(20);
/// assert_eq!(options.limit_count(), Some(20));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    sort: Vec<(String, SortOrder)>,
    skip: Option<u64>,
    limit: Option<u64>,
    return_new: bool,
    upsert: bool,
    projection: Option<Value>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sort key. Earlier keys take precedence.
    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.push((field.to_string(), order));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return the document as it is after the update instead of before it.
    pub fn return_new(mut self, return_new: bool) -> Self {
        self.return_new = return_new;
        self
    }

    /// Insert a document built from the filter and update when nothing matches.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Projection applied to the document returned by a `find_*_and_*` operation.
    pub fn projection(mut self, projection: Value) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort_fields(&self) -> &[(String, SortOrder)] {
        &self.sort
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }

    pub fn is_return_new(&self) -> bool {
        self.return_new
    }

    pub fn is_upsert(&self) -> bool {
        self.upsert
    }

    pub fn projection_value(&self) -> Option<&Value> {
        self.projection.as_ref()
    }
}

/// Creates `QueryOptions` sorted by a single field.
pub fn order_by(field: &str, order: SortOrder) -> QueryOptions {
    QueryOptions::new().sort_by(field, order)
}

/// Creates `QueryOptions` that skip the first `skip` matches.
pub fn skip_by(skip: u64) -> QueryOptions {
    QueryOptions::new().skip(skip)
}

/// Creates `QueryOptions` that return at most `limit` matches.
pub fn limit_to(limit: u64) -> QueryOptions {
    QueryOptions::new().limit(limit)
}

/// Options for persisting a hydrated document.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    validate_before_save: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            validate_before_save: true,
        }
    }
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip required-field validation when `false`.
    pub fn validate_before_save(mut self, validate: bool) -> Self {
        self.validate_before_save = validate;
        self
    }

    pub fn is_validate_before_save(&self) -> bool {
        self.validate_before_save
    }
}

/// Describes how a reference path is resolved by `populate`.
///
/// The referenced model comes from [PopulateOptions::model] when set, otherwise
/// from the schema's `reference` declaration for the path.
#[derive(Debug, Clone)]
pub struct PopulateOptions {
    path: String,
    select: Option<Value>,
    model: Option<String>,
    match_filter: Option<Value>,
}

impl PopulateOptions {
    pub fn new(path: &str) -> Self {
        PopulateOptions {
            path: path.to_string(),
            select: None,
            model: None,
            match_filter: None,
        }
    }

    /// Projection applied to the populated documents.
    pub fn select(mut self, projection: Value) -> Self {
        self.select = Some(projection);
        self
    }

    /// Name of the model to resolve the references against.
    pub fn model(mut self, model_name: &str) -> Self {
        self.model = Some(model_name.to_string());
        self
    }

    /// Extra filter the referenced documents must match; non-matching ones populate as absent.
    pub fn match_filter(mut self, filter: Value) -> Self {
        self.match_filter = Some(filter);
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn select_value(&self) -> Option<&Value> {
        self.select.as_ref()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn match_value(&self) -> Option<&Value> {
        self.match_filter.as_ref()
    }
}
