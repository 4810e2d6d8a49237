use crate::common::{get_path, remove_path, set_path, DOC_ID};
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::mapper::filter::values_equal;
use crate::mapper::{Document, Schema};
use serde_json::{Number, Value};

#[derive(Debug, Clone)]
enum UpdateOp {
    Set(String, Value),
    Unset(String),
    Inc(String, Number),
    Push(String, Vec<Value>),
    Pull(String, Value),
    SetOnInsert(String, Value),
}

/// A compiled update document.
///
/// Top-level keys without a `$` prefix are treated as `$set`, so
/// `{"name": "x"}` and `{"$set": {"name": "x"}}` are the same update.
#[derive(Debug, Clone, Default)]
pub(crate) struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub(crate) fn compile(update: Option<&Value>) -> DocbindResult<Update> {
        let document = match update {
            None | Some(Value::Null) => return Ok(Update::default()),
            Some(Value::Object(map)) => map,
            Some(other) => return Err(update_error(&format!("update must be an object, got {}", other))),
        };

        let mut ops = Vec::new();
        for (key, value) in document {
            if !key.starts_with('$') {
                ops.push(UpdateOp::Set(key.clone(), value.clone()));
                continue;
            }

            let fields = value
                .as_object()
                .ok_or_else(|| update_error(&format!("{} expects an object", key)))?;
            for (path, operand) in fields {
                let op = match key.as_str() {
                    "$set" => UpdateOp::Set(path.clone(), operand.clone()),
                    "$unset" => UpdateOp::Unset(path.clone()),
                    "$setOnInsert" => UpdateOp::SetOnInsert(path.clone(), operand.clone()),
                    "$inc" => match operand {
                        Value::Number(n) => UpdateOp::Inc(path.clone(), n.clone()),
                        _ => return Err(update_error(&format!("$inc on '{}' expects a number", path))),
                    },
                    "$push" => UpdateOp::Push(path.clone(), push_values(operand)),
                    "$pull" => UpdateOp::Pull(path.clone(), operand.clone()),
                    other => return Err(update_error(&format!("unknown update operator {}", other))),
                };
                ops.push(op);
            }
        }
        Ok(Update { ops })
    }

    /// Applies the update in place and reports whether the document changed.
    ///
    /// `$setOnInsert` only applies when `inserting`. Values are cast through the
    /// schema the same way as on document construction.
    pub(crate) fn apply(
        &self,
        document: &mut Document,
        schema: &Schema,
        strict: bool,
        inserting: bool,
    ) -> DocbindResult<bool> {
        let before = document.clone();

        for op in &self.ops {
            match op {
                UpdateOp::Set(path, value) => write(document, schema, strict, path, value.clone())?,
                UpdateOp::SetOnInsert(path, value) if inserting => {
                    write(document, schema, strict, path, value.clone())?
                }
                UpdateOp::SetOnInsert(..) => {}
                UpdateOp::Unset(path) => {
                    if path == DOC_ID {
                        return Err(immutable_id_error());
                    }
                    remove_path(document, path);
                }
                UpdateOp::Inc(path, amount) => {
                    let incremented = match get_path(document, path) {
                        None | Some(Value::Null) => Value::Number(amount.clone()),
                        Some(Value::Number(current)) => Value::Number(add_numbers(current, amount)?),
                        Some(_) => {
                            return Err(update_error(&format!("cannot apply $inc to non-numeric field '{}'", path)))
                        }
                    };
                    write(document, schema, strict, path, incremented)?;
                }
                UpdateOp::Push(path, values) => {
                    let mut items = match get_path(document, path) {
                        None | Some(Value::Null) => Vec::new(),
                        Some(Value::Array(items)) => items.clone(),
                        Some(_) => return Err(update_error(&format!("cannot $push to non-array field '{}'", path))),
                    };
                    items.extend(values.iter().cloned());
                    write(document, schema, strict, path, Value::Array(items))?;
                }
                UpdateOp::Pull(path, value) => {
                    if let Some(Value::Array(items)) = get_path(document, path) {
                        let kept: Vec<Value> = items
                            .iter()
                            .filter(|item| !values_equal(item, value))
                            .cloned()
                            .collect();
                        write(document, schema, strict, path, Value::Array(kept))?;
                    }
                }
            }
        }

        if let Some(original) = before.get(DOC_ID) {
            if document.get(DOC_ID).map_or(true, |now| !values_equal(original, now)) {
                return Err(immutable_id_error());
            }
        }

        Ok(!values_equal(&Value::Object(before), &Value::Object(document.clone())))
    }
}

fn write(document: &mut Document, schema: &Schema, strict: bool, path: &str, value: Value) -> DocbindResult<()> {
    match schema.cast_path(path, value, strict)? {
        Some(cast) => set_path(document, path, cast),
        None => Ok(()),
    }
}

fn push_values(operand: &Value) -> Vec<Value> {
    match operand.get("$each") {
        Some(Value::Array(each)) => each.clone(),
        _ => vec![operand.clone()],
    }
}

fn add_numbers(a: &Number, b: &Number) -> DocbindResult<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum).ok_or_else(|| update_error("$inc produced a non-finite number"))
}

fn immutable_id_error() -> DocbindError {
    log::error!("Attempt to modify immutable field _id");
    DocbindError::new(
        "Performing an update on the path '_id' would modify the immutable field '_id'",
        ErrorKind::ImmutableField,
    )
}

fn update_error(message: &str) -> DocbindError {
    log::error!("Invalid update: {}", message);
    DocbindError::new(&format!("Invalid update: {}", message), ErrorKind::InvalidUpdate)
}
