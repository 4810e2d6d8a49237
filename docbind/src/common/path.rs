use crate::common::FIELD_SEPARATOR;
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::mapper::Document;
use serde_json::Value;

/// Returns the value at an embedded field path such as `address.city`.
///
/// Numeric segments index into arrays (`tags.0`). A missing segment anywhere
/// along the path yields `None`.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split(FIELD_SEPARATOR);
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets the value at an embedded field path, creating intermediate objects.
pub fn set_path(document: &mut Document, path: &str, value: Value) -> DocbindResult<()> {
    let segments = split_path(path)?;
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| empty_path_error(path))?;

    let mut current = document;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        if entry.is_null() {
            *entry = Value::Object(Document::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => {
                log::error!("Cannot create field '{}' inside non-object value at '{}'", path, segment);
                return Err(DocbindError::new(
                    &format!("Cannot create field '{}' inside a non-object value", path),
                    ErrorKind::InvalidUpdate,
                ));
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Removes the value at an embedded field path and returns it.
pub fn remove_path(document: &mut Document, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
    let (last, parents) = segments.split_last()?;

    let mut current = document;
    for segment in parents {
        current = match current.get_mut(*segment)? {
            Value::Object(map) => map,
            _ => return None,
        };
    }
    current.shift_remove(*last)
}

/// Returns `true` when `path` equals `other` or one is an embedded parent of the other.
pub fn paths_overlap(path: &str, other: &str) -> bool {
    if path == other {
        return true;
    }
    let is_parent = |parent: &str, child: &str| {
        child.len() > parent.len()
            && child.starts_with(parent)
            && child[parent.len()..].starts_with(FIELD_SEPARATOR)
    };
    is_parent(path, other) || is_parent(other, path)
}

fn split_path(path: &str) -> DocbindResult<Vec<&str>> {
    let segments: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(empty_path_error(path));
    }
    Ok(segments)
}

fn empty_path_error(path: &str) -> DocbindError {
    log::error!("Field path '{}' contains an empty segment", path);
    DocbindError::new(
        &format!("Field path '{}' contains an empty segment", path),
        ErrorKind::InvalidUpdate,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn get_path_reads_nested_and_array_values() {
        let d = doc(json!({"a": {"b": 1}, "tags": ["x", "y"]}));
        assert_eq!(get_path(&d, "a.b"), Some(&json!(1)));
        assert_eq!(get_path(&d, "tags.1"), Some(&json!("y")));
        assert_eq!(get_path(&d, "a.c"), None);
        assert_eq!(get_path(&d, "tags.9"), None);
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut d = Document::new();
        set_path(&mut d, "address.city", json!("Oslo")).unwrap();
        assert_eq!(Value::Object(d), json!({"address": {"city": "Oslo"}}));
    }

    #[test]
    fn set_path_rejects_scalar_parent() {
        let mut d = doc(json!({"a": 5}));
        let err = set_path(&mut d, "a.b", json!(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidUpdate);
    }

    #[test]
    fn set_path_rejects_empty_segment() {
        let mut d = Document::new();
        assert!(set_path(&mut d, "a..b", json!(1)).is_err());
        assert!(set_path(&mut d, "", json!(1)).is_err());
    }

    #[test]
    fn remove_path_removes_nested_value() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(remove_path(&mut d, "a.b"), Some(json!(1)));
        assert_eq!(Value::Object(d), json!({"a": {"c": 2}}));
    }

    #[test]
    fn overlapping_paths() {
        assert!(paths_overlap("a", "a"));
        assert!(paths_overlap("a", "a.b"));
        assert!(paths_overlap("a.b", "a"));
        assert!(!paths_overlap("a", "ab"));
        assert!(!paths_overlap("a.b", "a.c"));
    }
}
