use crate::common::{DOC_ID, FIELD_SEPARATOR};
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::id::{Id, ObjectId};
use crate::mapper::Document;
use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::fmt::{Display, Formatter};

/// Type declared for a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    ObjectId,
    /// Any JSON value, stored as given.
    Mixed,
    /// Identifier of a document in the named model.
    Reference(String),
    Array(Box<FieldType>),
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Number => write!(f, "Number"),
            FieldType::Boolean => write!(f, "Boolean"),
            FieldType::ObjectId => write!(f, "ObjectId"),
            FieldType::Mixed => write!(f, "Mixed"),
            FieldType::Reference(model) => write!(f, "Reference<{}>", model),
            FieldType::Array(inner) => write!(f, "[{}]", inner),
        }
    }
}

/// Declaration of one top-level schema field.
#[derive(Debug, Clone)]
pub struct SchemaField {
    field_type: FieldType,
    required: bool,
    default: Option<Value>,
}

impl SchemaField {
    pub fn of(field_type: FieldType) -> Self {
        SchemaField {
            field_type,
            required: false,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn object_id() -> Self {
        Self::of(FieldType::ObjectId)
    }

    pub fn mixed() -> Self {
        Self::of(FieldType::Mixed)
    }

    pub fn reference(model_name: &str) -> Self {
        Self::of(FieldType::Reference(model_name.to_string()))
    }

    pub fn array(element: SchemaField) -> Self {
        Self::of(FieldType::Array(Box::new(element.field_type)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value stored when a new document is constructed without this field.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn get_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Shape of the documents of one model.
///
/// Only top-level fields are declared. Embedded paths under a declared field
/// are stored as given; undeclared top-level fields are dropped when the
/// connection is strict.
///
/// ```rust
/// use docbind::mapper::{Schema, SchemaField};
///
/// let schema = Schema::new()
///     .field("title", SchemaField::string().required())
///     .field("author", SchemaField::reference("User"))
///     .field("tags", SchemaField::array(SchemaField::string()));
///
/// assert_eq!(schema.reference_of("author"), Some("User"));
/// assert!(schema.get("title").unwrap().is_required());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, SchemaField>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, field: SchemaField) -> Self {
        self.fields.insert(name.to_string(), field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(|k| k.as_str()).collect()
    }

    /// Model referenced by `path`, for reference fields and arrays of references.
    pub fn reference_of(&self, path: &str) -> Option<&str> {
        match self.fields.get(path)?.field_type() {
            FieldType::Reference(model) => Some(model.as_str()),
            FieldType::Array(inner) => match inner.as_ref() {
                FieldType::Reference(model) => Some(model.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Casts every entry of `data`, dropping undeclared fields when `strict`.
    pub(crate) fn cast_document(&self, data: &Document, strict: bool) -> DocbindResult<Document> {
        let mut document = Document::new();
        for (key, value) in data {
            if let Some(cast) = self.cast_path(key, value.clone(), strict)? {
                document.insert(key.clone(), cast);
            }
        }
        Ok(document)
    }

    /// Casts a value written at `path`. `None` means the path is dropped.
    pub(crate) fn cast_path(&self, path: &str, value: Value, strict: bool) -> DocbindResult<Option<Value>> {
        if path == DOC_ID {
            return Ok(Some(Id::from_value(&value)?.to_value()));
        }
        if let Some(field) = self.fields.get(path) {
            return cast_value(path, field.field_type(), value).map(Some);
        }

        let root = path.split(FIELD_SEPARATOR).next().unwrap_or(path);
        if self.fields.contains_key(root) || !strict {
            Ok(Some(value))
        } else {
            log::debug!("Dropping path '{}' not declared in schema", path);
            Ok(None)
        }
    }

    pub(crate) fn apply_defaults(&self, document: &mut Document) {
        for (name, field) in &self.fields {
            if let Some(default) = field.get_default() {
                if !document.contains_key(name) {
                    document.insert(name.clone(), default.clone());
                }
            }
        }
    }

    /// Checks required fields, reporting the first missing one as the cause.
    pub(crate) fn validate(&self, model_name: &str, document: &Document) -> DocbindResult<()> {
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|(name, field)| {
                field.is_required() && document.get(name.as_str()).map_or(true, Value::is_null)
            })
            .map(|(name, _)| name.as_str())
            .collect();

        if let Some(first) = missing.first() {
            let cause = DocbindError::new(
                &format!("Path `{}` is required", first),
                ErrorKind::MissingRequiredField,
            );
            return Err(DocbindError::new_with_cause(
                &format!("{} validation failed: missing {}", model_name, missing.join(", ")),
                ErrorKind::ValidationError,
                cause,
            ));
        }
        Ok(())
    }
}

fn cast_value(path: &str, field_type: &FieldType, value: Value) -> DocbindResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let cast = match (field_type, value) {
        (FieldType::Mixed, value) => Some(value),
        (FieldType::String, Value::String(s)) => Some(Value::String(s)),
        (FieldType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (FieldType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (FieldType::Number, Value::Number(n)) => Some(Value::Number(n)),
        (FieldType::Number, Value::Bool(b)) => Some(Value::from(u8::from(b))),
        (FieldType::Number, Value::String(s)) => parse_number(s.trim()).map(Value::Number),
        (FieldType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (FieldType::Boolean, Value::String(s)) => match s.as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldType::ObjectId, Value::String(s)) => {
            ObjectId::from_hex(&s).ok().map(|oid| Value::String(oid.to_hex()))
        }
        (FieldType::Reference(_), Value::Object(map)) => match map.get(DOC_ID) {
            Some(id) => Id::from_value(id).ok().map(|id| id.to_value()),
            None => None,
        },
        (FieldType::Reference(_), value) => Id::from_value(&value).ok().map(|id| id.to_value()),
        (FieldType::Array(inner), Value::Array(items)) => {
            let mut cast_items = Vec::with_capacity(items.len());
            for item in items {
                cast_items.push(cast_value(path, inner, item)?);
            }
            Some(Value::Array(cast_items))
        }
        (FieldType::Array(inner), single) => Some(Value::Array(vec![cast_value(path, inner, single)?])),
        _ => None,
    };

    cast.ok_or_else(|| {
        log::error!("Cast to {} failed at path '{}'", field_type, path);
        DocbindError::new(
            &format!("Cast to {} failed at path \"{}\"", field_type, path),
            ErrorKind::CastError,
        )
    })
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::new()
            .field("name", SchemaField::string().required())
            .field("age", SchemaField::number())
            .field("active", SchemaField::boolean().default_value(json!(true)))
            .field("friends", SchemaField::array(SchemaField::reference("User")))
            .field("meta", SchemaField::mixed())
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn casts_declared_fields() {
        let schema = user_schema();
        let cast = schema
            .cast_document(&doc(json!({"name": 7, "age": "42", "active": "false"})), true)
            .unwrap();
        assert_eq!(Value::Object(cast), json!({"name": "7", "age": 42, "active": false}));
    }

    #[test]
    fn strict_drops_undeclared_fields() {
        let schema = user_schema();
        let data = doc(json!({"name": "a", "unknown": 1}));
        assert!(!schema.cast_document(&data, true).unwrap().contains_key("unknown"));
        assert!(schema.cast_document(&data, false).unwrap().contains_key("unknown"));
    }

    #[test]
    fn embedded_paths_under_declared_fields_are_kept() {
        let schema = user_schema();
        assert_eq!(schema.cast_path("meta.x", json!(1), true).unwrap(), Some(json!(1)));
        assert_eq!(schema.cast_path("other.x", json!(1), true).unwrap(), None);
    }

    #[test]
    fn cast_failure_is_reported() {
        let schema = user_schema();
        let err = schema.cast_document(&doc(json!({"age": "old"})), true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CastError);
        assert!(err.message().contains("age"));
    }

    #[test]
    fn arrays_cast_elementwise_and_wrap_scalars() {
        let schema = user_schema();
        let oid = ObjectId::new();
        assert_eq!(
            schema.cast_path("friends", json!(oid.to_hex()), true).unwrap(),
            Some(json!([oid.to_hex()]))
        );
        assert_eq!(
            schema.cast_path("friends", json!([{"_id": "a"}, "b"]), true).unwrap(),
            Some(json!(["a", "b"]))
        );
    }

    #[test]
    fn object_id_fields_require_valid_ids() {
        let schema = Schema::new().field("owner", SchemaField::object_id());
        assert!(schema.cast_path("owner", json!("nope"), true).is_err());
        let oid = ObjectId::new();
        assert_eq!(schema.cast_path("owner", json!(oid.to_hex()), true).unwrap(), Some(json!(oid.to_hex())));
    }

    #[test]
    fn null_is_always_accepted() {
        let schema = user_schema();
        assert_eq!(schema.cast_path("age", Value::Null, true).unwrap(), Some(Value::Null));
    }

    #[test]
    fn defaults_fill_missing_fields_only() {
        let schema = user_schema();
        let mut d = doc(json!({"name": "a"}));
        schema.apply_defaults(&mut d);
        assert_eq!(d.get("active"), Some(&json!(true)));

        let mut d = doc(json!({"name": "a", "active": false}));
        schema.apply_defaults(&mut d);
        assert_eq!(d.get("active"), Some(&json!(false)));
    }

    #[test]
    fn validate_reports_missing_required_fields() {
        let schema = user_schema();
        let err = schema.validate("User", &doc(json!({"name": null}))).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert_eq!(err.cause().map(|c| c.kind()), Some(&ErrorKind::MissingRequiredField));
        assert!(schema.validate("User", &doc(json!({"name": "x"}))).is_ok());
    }

    #[test]
    fn reference_lookup() {
        let schema = user_schema();
        assert_eq!(schema.reference_of("friends"), Some("User"));
        assert_eq!(schema.reference_of("name"), None);
        assert_eq!(schema.reference_of("missing"), None);
    }
}
